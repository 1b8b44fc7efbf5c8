//! bizdir CLI entry point

use std::process::ExitCode;

use anyhow::Result;
use bizdir_domain::DirectoryError;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;
mod commands;
mod config;

use args::{Cli, Commands};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = init_logging(cli.log_level.as_deref(), cli.config.as_deref()) {
        eprintln!("error: failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    // Execute command
    let result = match cli.command {
        Commands::Companies(args) => commands::companies::execute(args, cli.config).await,
        Commands::People(args) => commands::people::execute(args, cli.config).await,
        Commands::TaxId(args) => commands::tax_id::execute(args),
        Commands::Config(args) => commands::config::execute(args, cli.config).await,
        Commands::Doctor(args) => commands::doctor::execute(args, cli.config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

/// `--log-level` wins, then `RUST_LOG`, then `general.log_level` from config
fn init_logging(cli_level: Option<&str>, config_path: Option<&std::path::Path>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().or_else(|_| {
            let level = AppConfig::load(config_path)
                .map(|c| c.general.log_level)
                .unwrap_or_else(|_| "info".to_string());
            EnvFilter::try_new(level)
        })?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Print the failure and pick an exit code from its class
fn report_error(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<DirectoryError>() {
        Some(e) => {
            eprintln!("error[{}]: {}", e.status(), e);
            match e {
                DirectoryError::Validation { .. } => ExitCode::from(2),
                DirectoryError::NotFound { .. } => ExitCode::from(3),
                DirectoryError::TransientStorage => ExitCode::FAILURE,
            }
        }
        None => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
