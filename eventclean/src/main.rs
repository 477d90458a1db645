//! User event-performance cleaning tool.
//!
//! This binary stages the raw user and event files, validates them, applies
//! the normalization rules and replaces the canonical tables in one
//! transaction.
//!
//! # Security Guarantees
//! - No credentials stored or logged
//! - Store URLs are redacted before they reach any log line
//! - A failed run never leaves canonical tables half-written

use anyhow::Result;
use clap::Parser;
use eventclean::{Cli, commands::execute};
use eventclean_core::logging::{LogFormat, init_logging_with_format};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let format = if cli.global.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_logging_with_format(cli.global.verbose, cli.global.quiet, format)?;

    execute(&cli).await
}
