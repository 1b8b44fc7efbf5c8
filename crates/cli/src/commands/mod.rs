//! Subcommand implementations

pub mod companies;
pub mod config;
pub mod doctor;
pub mod people;
pub mod tax_id;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bizdir_adapters::store::SqliteDirectoryStore;
use bizdir_domain::{ListParams, OrganizationService, PersonService, SystemClock};
use serde::Serialize;

use crate::args::ListArgs;
use crate::config::AppConfig;

/// Services wired to the configured SQLite database
pub struct Directory {
    pub organizations: OrganizationService,
    pub people: PersonService,
}

impl Directory {
    pub async fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = AppConfig::load(config_path)?;
        let directory_config = config.directory_config()?;

        let store = SqliteDirectoryStore::new(
            &config.general.database_path,
            config.storage.max_connections,
        )
        .await
        .with_context(|| {
            format!(
                "Failed to open database: {}",
                config.general.database_path.display()
            )
        })?;
        let store = Arc::new(store);
        let clock = Arc::new(SystemClock);

        Ok(Self {
            organizations: OrganizationService::new(
                store.clone(),
                clock.clone(),
                directory_config.clone(),
            ),
            people: PersonService::new(store, clock, directory_config),
        })
    }
}

impl From<&ListArgs> for ListParams {
    fn from(args: &ListArgs) -> Self {
        ListParams {
            take: args.take,
            order_by: args.order_by.clone(),
            order_dir: args.order_dir.clone(),
            page: args.page,
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn join_ids(ids: impl IntoIterator<Item = i64>) -> String {
    let ids: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.join(", ")
    }
}
