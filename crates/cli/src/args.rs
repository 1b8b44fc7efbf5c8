//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// bizdir: business directory of companies, people and their affiliations
#[derive(Parser, Debug)]
#[command(name = "bizdir")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage companies
    Companies(CompaniesArgs),

    /// Manage people and their company affiliations
    People(PeopleArgs),

    /// Generate or check tax identifiers
    TaxId(TaxIdArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

/// Paging and sorting flags shared by the list commands
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Page size; 0 returns every row
    #[arg(long)]
    pub take: Option<u32>,

    /// Column to sort by
    #[arg(long)]
    pub order_by: Option<String>,

    /// Sort direction (asc or desc)
    #[arg(long)]
    pub order_dir: Option<String>,

    /// Page number, starting at 1
    #[arg(long)]
    pub page: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CompaniesArgs {
    #[command(subcommand)]
    pub command: CompaniesCommands,
}

#[derive(Subcommand, Debug)]
pub enum CompaniesCommands {
    /// List companies
    List {
        #[command(flatten)]
        list: ListArgs,
    },

    /// Show a company by id or slug
    Show {
        /// Numeric id or slug
        key: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a new company
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        tax_id: String,

        #[arg(long)]
        address: String,

        #[arg(long)]
        city: String,

        #[arg(long)]
        zip: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change company fields; omitted fields keep their value
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        tax_id: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        zip: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a company and its affiliations
    Delete { id: i64 },

    /// List people affiliated with a company
    Members {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add people to a company, keeping existing members
    Attach {
        id: i64,

        /// Comma-separated person ids
        #[arg(long, value_delimiter = ',', required = true)]
        people: Vec<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Make a company's members exactly the given people
    Sync {
        id: i64,

        /// Comma-separated person ids
        #[arg(long, value_delimiter = ',', required = true)]
        people: Vec<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove people from a company
    Detach {
        id: i64,

        /// Comma-separated person ids
        #[arg(long, value_delimiter = ',', required = true)]
        people: Vec<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct PeopleArgs {
    #[command(subcommand)]
    pub command: PeopleCommands,
}

#[derive(Subcommand, Debug)]
pub enum PeopleCommands {
    /// List people
    List {
        #[command(flatten)]
        list: ListArgs,

        /// Only people affiliated with any of these company ids
        #[arg(long, value_delimiter = ',')]
        companies: Option<Vec<i64>>,
    },

    /// Show a person
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a new person
    Create {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone: Option<String>,

        /// Comma-separated company ids to affiliate with
        #[arg(long, value_delimiter = ',')]
        companies: Vec<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change person fields; a non-empty --companies replaces affiliations
    Update {
        id: i64,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Pass an empty value to clear
        #[arg(long)]
        phone: Option<String>,

        /// Comma-separated company ids
        #[arg(long, value_delimiter = ',')]
        companies: Option<Vec<i64>>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a person and their affiliations
    Delete { id: i64 },

    /// List the companies a person belongs to
    Companies {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Affiliate a person with companies
    Attach {
        id: i64,

        /// Comma-separated company ids
        #[arg(long, value_delimiter = ',', required = true)]
        companies: Vec<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a person from companies
    Detach {
        id: i64,

        /// Comma-separated company ids
        #[arg(long, value_delimiter = ',', required = true)]
        companies: Vec<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct TaxIdArgs {
    #[command(subcommand)]
    pub command: TaxIdCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaxIdCommands {
    /// Generate valid tax identifiers
    Generate {
        /// How many identifiers to print
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Check a tax identifier's checksum
    Validate { value: String },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./bizdir.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration after file and environment layering
    Show,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
