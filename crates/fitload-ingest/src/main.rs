//! Fitload - FIT activity ingestion tool

use anyhow::Result;
use clap::Parser;
use fitload_common::logging::{init_logging, LogConfig, LogLevel};
use fitload_ingest::config::load_settings;
use fitload_ingest::pool;
use fitload_ingest::sink::{MongoSink, MongoSinkFactory};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fitload")]
#[command(author, version, about = "Load decoded FIT activity frames into a document store")]
struct Cli {
    /// Configuration profile to select from the settings file
    #[arg(short = 'c', long = "config-set", required = true)]
    config_set: String,

    /// Path to the keyed settings file
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag and the debug setting
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables override individual fields of the CLI config
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("fitload".to_string())
        .build()
        .apply_env_overrides()?;

    init_logging(&log_config)?;

    let settings = load_settings(&cli.settings, &cli.config_set)?;
    info!(
        profile = %cli.config_set,
        directory = %settings.directory,
        mode = ?settings.db_insert,
        "Loaded settings"
    );

    // Verify the sink up front; clear the target collection if requested
    let sink = MongoSink::connect(
        &settings.mongo_connection_string,
        &settings.collection_name,
    )
    .await?;
    if settings.reload_db {
        sink.clear().await?;
    }
    drop(sink);

    let factory = Arc::new(MongoSinkFactory::new(
        settings.mongo_connection_string.as_str(),
        settings.collection_name.as_str(),
    ));

    let start = Instant::now();
    let outcomes = pool::run_batch(&settings, factory).await?;
    let duration = start.elapsed();

    let records: u32 = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|s| s.records)
        .sum();
    info!(
        files = outcomes.len(),
        records,
        duration_secs = duration.as_secs_f64(),
        "Run complete"
    );

    Ok(())
}
