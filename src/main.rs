use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Use the library instead of redeclaring modules
use m3u_curator::{
    config::Config,
    ingestor::{HttpFetcher, SourceProcessor},
};

#[derive(Parser)]
#[command(name = "m3u-curator")]
#[command(version)]
#[command(about = "Builds filtered M3U playlist variants and a matching XMLTV guide per source")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (JSON or TOML)
    #[arg(short, long, default_value = "./config.json")]
    config: String,

    /// Only process the named source (repeatable)
    #[arg(short, long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_filter = format!("m3u_curator={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting m3u-curator v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    let fetcher = HttpFetcher::new(&config.http).context("failed to build HTTP client")?;

    let processor = SourceProcessor::new(config, Arc::new(fetcher));
    let summary = processor.run_selected(&cli.sources).await;

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        for (source, reason) in &summary.failed_sources {
            error!("{}: {}", source, reason);
        }
        for report in summary.reports.iter().filter(|r| !r.is_success()) {
            error!(
                "{}: {} model failure(s){}",
                report.source,
                report.model_failures.len(),
                if report.epg_failure.is_some() {
                    ", guide not updated"
                } else {
                    ""
                }
            );
        }
        Ok(ExitCode::FAILURE)
    }
}
