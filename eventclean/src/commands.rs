//! Subcommand execution.

use anyhow::{Context, Result};
use eventclean_core::{
    CleaningPipeline, ConnectionConfig, PipelineConfig, PipelineStage, RecordStore, create_store,
    error::{EventCleanError, redact_database_url},
};
use tracing::{error, info};

use crate::output::{print_report, print_summary, write_json_report};
use crate::{Cli, Command, resolve_database_url, resolve_pipeline_config};

/// Reads the password interactively when requested.
fn prompt_password(cli: &Cli) -> Result<Option<String>> {
    if !cli.store.ask_password {
        return Ok(None);
    }
    let password = rpassword::prompt_password("Database password: ")
        .context("Failed to read password")?;
    Ok(Some(password))
}

/// Opens the store named by the CLI arguments.
async fn open_store(cli: &Cli) -> Result<Box<dyn RecordStore>> {
    let password = prompt_password(cli)?;
    let url = resolve_database_url(&cli.store, password)?;
    info!("Connecting to {}", redact_database_url(&url));

    let store = create_store(&url, ConnectionConfig::default())
        .await
        .map_err(|e| {
            error!("Failed to open store: {}", e);
            e
        })?;
    Ok(store)
}

/// Executes the parsed command line.
///
/// # Errors
///
/// Returns the failing stage's error with context; pipeline failures keep
/// the stage name in the message chain.
pub async fn execute(cli: &Cli) -> Result<()> {
    // Catch bad arguments before touching the store
    let config = resolve_pipeline_config(cli).context("Invalid configuration")?;
    let store = open_store(cli).await?;

    // The pool is closed on every path once the store is open
    let result = dispatch(cli, config, store.as_ref()).await;
    store.close().await;
    result
}

async fn dispatch(cli: &Cli, config: PipelineConfig, store: &dyn RecordStore) -> Result<()> {
    match &cli.command {
        Command::Run(args) => {
            let mut pipeline = CleaningPipeline::new(config)?;
            let summary = pipeline
                .run(store)
                .await
                .map_err(|e| stage_context(e, pipeline.stage()))?;
            if !cli.global.quiet {
                print_summary(&summary);
            }
            if let Some(path) = &args.report {
                write_json_report(&summary, path).await?;
            }
            Ok(())
        }
        Command::Inspect(args) => {
            let mut pipeline = CleaningPipeline::new(config)?;
            let report = pipeline
                .inspect(store)
                .await
                .map_err(|e| stage_context(e, pipeline.stage()))?;
            if !cli.global.quiet {
                print_report(&report);
            }
            if let Some(path) = &args.report {
                write_json_report(&report, path).await?;
            }
            Ok(())
        }
        Command::Test => test_connection(store).await,
    }
}

/// Tests store connection without running any stage.
async fn test_connection(store: &dyn RecordStore) -> Result<()> {
    info!("Testing store connection...");

    store.test_connection().await.map_err(|e| {
        error!("Connection test failed: {}", e);
        e
    })?;

    info!("Connection test successful");
    println!("Connection to {} store successful", store.backend());
    Ok(())
}

fn stage_context(error: EventCleanError, reached: PipelineStage) -> anyhow::Error {
    let failed = error
        .failed_stage()
        .map_or_else(|| "unknown".to_string(), |stage| stage.to_string());
    if error.is_fatal() {
        error!("Store-level failure: {}", error);
    }
    anyhow::Error::new(error).context(format!(
        "Run failed at stage {} (last completed stage: {})",
        failed, reached
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_context_names_failed_stage() {
        let error = EventCleanError::NullsFound { count: 2 }.at_stage(PipelineStage::Validated);
        let message = format!("{:#}", stage_context(error, PipelineStage::Staged));
        assert!(message.contains("Run failed at stage VALIDATED"));
        assert!(message.contains("last completed stage: STAGED"));
        assert!(message.contains("2 staging row(s)"));
    }
}
