//! Library module for the eventclean binary.
//!
//! Holds argument parsing and the translation from arguments to core
//! configuration so both can be tested without a store. The binary entry
//! point is in main.rs.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use eventclean_core::{
    ConnectionConfig, Credentials, NullPolicy, PipelineConfig, ValidityWindow,
    error::EventCleanError,
};

/// CLI argument structure
#[derive(Parser)]
#[command(name = "eventclean")]
#[command(about = "Stage, validate, normalize and load user event-performance data")]
#[command(version)]
#[command(long_about = "
eventclean - raw CSV to constraint-valid canonical tables

A run moves through four stages, each consuming the complete output of
the previous one:
  STAGED      raw files copied verbatim into text-only staging tables
  VALIDATED   read-only report of nulls, duplicates and malformed values
  NORMALIZED  every row accepted as-is, repaired, or rejected with a reason
  CANONICAL   accepted rows replace users and event_performance atomically

A failed run leaves previously committed canonical tables untouched.

CONNECTION:
  --database-url (or DATABASE_URL) wins over the individual fields.
  Otherwise a PostgreSQL URL is built from --host/--port/--db-name/--user
  and --password, which fall back to IP_ADDRESS, PORT, DB_NAME, USER_NAME
  and PASS. A .env file in the current directory is honoured.

EXAMPLES:
  eventclean --working-dir /srv/analysis run
  eventclean --database-url sqlite://events.db inspect --report report.json
  eventclean --host 10.0.0.5 --db-name events --user analyst --ask-password test
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every stage and replace the canonical tables
    Run(RunArgs),
    /// Load and validate only; canonical tables are not touched
    Inspect(InspectArgs),
    /// Test the store connection
    Test,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Skip the canonical event backup export
    #[arg(long)]
    pub no_export: bool,

    /// Keep the staging tables after commit for inspection
    #[arg(long)]
    pub keep_staging: bool,

    /// Reject rows with null required fields instead of failing the run
    #[arg(long)]
    pub reject_null_rows: bool,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Write the validation report as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Keep the staging tables for ad hoc queries
    #[arg(long)]
    pub keep_staging: bool,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress all output except errors"
    )]
    pub quiet: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Store connection options.
///
/// Field names and environment fallbacks follow the deployment's `.env`
/// conventions. No `Debug` impl since it holds the password.
#[derive(Args)]
pub struct StoreArgs {
    /// Store connection URL
    #[arg(
        long,
        env = "DATABASE_URL",
        hide_env_values = true,
        help = "Store connection string, postgres:// or sqlite: (credentials are sanitized in logs)"
    )]
    pub database_url: Option<String>,

    /// Database host
    #[arg(long, env = "IP_ADDRESS", default_value = "localhost")]
    pub host: String,

    /// Database port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Database user
    #[arg(long, env = "USER_NAME")]
    pub user: Option<String>,

    /// Database password
    #[arg(long, env = "PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Prompt for the database password
    #[arg(long, conflicts_with = "password")]
    pub ask_password: bool,
}

/// Input layout and validity window.
#[derive(Debug, Args)]
pub struct DatasetArgs {
    /// Directory holding data/users.csv and data/event_performance.csv
    #[arg(long, env = "WORKING_DIR", default_value = ".", value_name = "DIR")]
    pub working_dir: PathBuf,

    /// Earliest valid event date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub founding_date: Option<NaiveDate>,

    /// Latest valid event date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub cutoff_date: Option<NaiveDate>,
}

/// Validate store URL format without exposing credentials
///
/// # Security
///
/// This function validates URL format without logging or displaying the URL
#[must_use]
pub fn validate_database_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }

    // sqlite::memory: is not a valid URL but is a valid store
    if url.starts_with("sqlite:") {
        return url.len() > "sqlite:".len();
    }

    url::Url::parse(url).is_ok_and(|parsed_url| {
        match parsed_url.scheme().to_lowercase().as_str() {
            "postgres" | "postgresql" => parsed_url.host_str().is_some_and(|h| !h.is_empty()),
            _ => false,
        }
    })
}

/// Resolves the store URL from the CLI arguments.
///
/// An explicit URL wins. Otherwise a PostgreSQL URL is composed from the
/// individual fields; `password` is used when the caller already read one
/// interactively.
///
/// # Errors
///
/// Returns a configuration error for a malformed URL or a missing database
/// name. The message never contains the password.
pub fn resolve_database_url(
    store: &StoreArgs,
    password: Option<String>,
) -> eventclean_core::Result<String> {
    if let Some(url) = store.database_url.as_deref().filter(|u| !u.trim().is_empty()) {
        if !validate_database_url(url) {
            return Err(EventCleanError::configuration(
                "Invalid store URL: expected postgres://host/db, postgresql://host/db or sqlite:path",
            ));
        }
        return Ok(url.trim().to_string());
    }

    let db_name = store.db_name.clone().ok_or_else(|| {
        EventCleanError::configuration(
            "Store connection information required. Set DATABASE_URL, or DB_NAME with IP_ADDRESS, PORT, USER_NAME and PASS.",
        )
    })?;

    let mut config = ConnectionConfig::new(store.host.clone()).with_database(db_name);
    if let Some(port) = store.port {
        config = config.with_port(port);
    }
    if let Some(user) = &store.user {
        config = config.with_username(user.clone());
    }

    let credentials = Credentials::new(
        store.user.clone().unwrap_or_default(),
        password.or_else(|| store.password.clone()),
    );
    config.postgres_url(&credentials)
}

/// Builds the validity window, filling unspecified bounds from the defaults.
///
/// # Errors
///
/// Returns a configuration error when the founding date follows the cutoff.
pub fn resolve_window(dataset: &DatasetArgs) -> eventclean_core::Result<ValidityWindow> {
    let defaults = ValidityWindow::default();
    ValidityWindow::new(
        dataset.founding_date.unwrap_or(defaults.founding_date),
        dataset.cutoff_date.unwrap_or(defaults.cutoff_date),
    )
}

/// Builds the pipeline configuration for a subcommand.
///
/// # Errors
///
/// Returns a configuration error if the window or the resulting config does
/// not validate.
pub fn resolve_pipeline_config(cli: &Cli) -> eventclean_core::Result<PipelineConfig> {
    let window = resolve_window(&cli.dataset)?;
    let mut config = PipelineConfig::new(cli.dataset.working_dir.clone()).with_window(window);

    match &cli.command {
        Command::Run(args) => {
            config = config
                .with_export_backup(!args.no_export)
                .with_keep_staging(args.keep_staging);
            if args.reject_null_rows {
                config = config.with_null_policy(NullPolicy::RejectRow);
            }
        }
        Command::Inspect(args) => {
            config = config.with_keep_staging(args.keep_staging);
        }
        Command::Test => {}
    }

    config.validate()?;
    Ok(config)
}
