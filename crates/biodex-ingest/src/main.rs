//! Biodex Ingest - provider search preview tool
//!
//! Runs a single provider search and prints the normalized records as JSON
//! without touching the job queue or the dataset store.

use anyhow::{Context, Result};
use biodex_common::logging::{init_logging, LogConfig, LogLevel};
use biodex_ingest::{DatasetProvider, OsdrClient, ProviderConfig, SearchFilters};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "biodex-ingest")]
#[command(author, version, about = "Biodex dataset provider tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the provider and print normalized records
    Search {
        /// Free-text search term
        #[arg(short, long)]
        term: Option<String>,

        /// Maximum number of records
        #[arg(short, long, default_value_t = biodex_ingest::provider::DEFAULT_LIMIT)]
        limit: u32,

        #[arg(long)]
        organism: Option<String>,

        #[arg(long)]
        assay_type: Option<String>,

        #[arg(long)]
        project_type: Option<String>,

        /// Provider search endpoint
        #[arg(long, env = "PROVIDER_BASE_URL")]
        base_url: Option<String>,

        /// Fail on provider errors instead of printing an empty list
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("biodex-ingest")
        .build()
        .merge_env()?;
    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Search {
            term,
            limit,
            organism,
            assay_type,
            project_type,
            base_url,
            strict,
        } => {
            let mut config = ProviderConfig::from_env();
            if let Some(url) = base_url {
                config.base_url = url;
            }
            let client = OsdrClient::new(config)?;

            let filters = SearchFilters {
                search_term: term,
                limit,
                organism,
                assay_type,
                project_type,
                ..Default::default()
            };

            info!(search_term = %filters.effective_term(), limit, "Searching provider");

            let records = if strict {
                client.try_fetch(&filters).await?
            } else {
                client.fetch(&filters).await
            };

            let out = serde_json::to_string_pretty(&records).context("Failed to encode records")?;
            println!("{out}");
        }
    }

    Ok(())
}
