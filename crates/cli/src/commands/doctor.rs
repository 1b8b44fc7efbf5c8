//! Doctor command - validate configuration and show status

use anyhow::Result;
use bizdir_adapters::store::SqliteDirectoryStore;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    listing: CheckResult,
    storage: CheckResult,
    database: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        listing: CheckResult::error("Not checked"),
        storage: CheckResult::error("Not checked"),
        database: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.listing = check_listing(config);
        report.storage = check_storage(config);
        report.database = check_database(config).await;
    }

    let checks = [
        &report.config,
        &report.listing,
        &report.storage,
        &report.database,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_listing(config: &AppConfig) -> CheckResult {
    match config.directory_config() {
        Ok(directory) => {
            let listing = &directory.listing;
            let sortable = bizdir_domain::query::ORGANIZATION_SORT_FIELDS
                .contains(&listing.order_by.as_str())
                && bizdir_domain::query::PERSON_SORT_FIELDS.contains(&listing.order_by.as_str());
            let message = format!(
                "take {}, order by {} {}",
                if listing.take == 0 {
                    "all".to_string()
                } else {
                    listing.take.to_string()
                },
                listing.order_by,
                listing.order_dir
            );
            if sortable {
                CheckResult::ok(message)
            } else {
                CheckResult::warn(format!(
                    "{} ('{}' is not sortable for both companies and people; list commands need --order-by)",
                    message, listing.order_by
                ))
            }
        }
        Err(e) => CheckResult::error(format!("{:#}", e)),
    }
}

fn check_storage(config: &AppConfig) -> CheckResult {
    let storage = &config.storage;
    let message = format!(
        "{} attempts per transaction, {}ms initial backoff, {} connections",
        storage.transaction_attempts, storage.retry_backoff_ms, storage.max_connections
    );

    if storage.transaction_attempts == 0 || storage.max_connections == 0 {
        CheckResult::warn(format!("{} (zero values are raised to 1)", message))
    } else {
        CheckResult::ok(message)
    }
}

async fn check_database(config: &AppConfig) -> CheckResult {
    let path = &config.general.database_path;

    let store = match SqliteDirectoryStore::new(path, 1).await {
        Ok(store) => store,
        Err(e) => {
            return CheckResult::error(format!(
                "Failed to open database {}: {}",
                path.display(),
                e
            ));
        }
    };

    match store.stats().await {
        Ok(stats) => CheckResult::ok(format!(
            "{} ({} companies, {} people)",
            path.display(),
            stats.organizations,
            stats.people
        ))
        .with_details(serde_json::json!({
            "path": path,
            "organizations": stats.organizations,
            "people": stats.people,
            "affiliations": stats.affiliations,
        })),
        Err(e) => CheckResult::error(format!("Database query failed: {}", e)),
    }
}

fn print_report(report: &DoctorReport) {
    println!("bizdir Doctor Report");
    println!("====================");
    println!();

    print_check("Config", &report.config);
    print_check("Listing", &report.listing);
    print_check("Storage", &report.storage);
    print_check("Database", &report.database);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready! Try: bizdir companies list");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
