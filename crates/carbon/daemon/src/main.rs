//! carbond - Regional carbon pattern daemon
//!
//! The daemon:
//! - Learns per-region carbon-intensity patterns from local data files
//! - Refreshes cached patterns in the background
//! - Logs a relative-intensity summary per region on a fixed interval

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carbon_daemon::{Daemon, DaemonConfig, DaemonError, DaemonResult};

/// Carbon pattern daemon CLI
#[derive(Parser)]
#[command(name = "carbond")]
#[command(about = "Regional carbon-intensity pattern daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CARBON_CONFIG")]
    config: Option<String>,

    /// Directory of `<region>.json` data files
    #[arg(short, long, env = "CARBON_DATA_DIR")]
    data_dir: Option<String>,

    /// Comma-separated regions to warm and report on
    #[arg(short, long, value_delimiter = ',')]
    regions: Vec<String>,

    /// Log level
    #[arg(long, env = "CARBON_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "CARBON_LOG_JSON")]
    json: bool,

    /// Print one JSON report for every region and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(data_dir) = cli.data_dir {
        config.source.data_dir = data_dir.into();
    }
    if !cli.regions.is_empty() {
        config.regions = cli.regions;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    if config.regions.is_empty() {
        return Err(DaemonError::Config("no regions configured".to_string()));
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.source.data_dir.display(),
        regions = ?config.regions,
        "Starting carbond"
    );

    let daemon = Daemon::new(config);

    if cli.once {
        return daemon.run_once().await;
    }

    daemon.run().await
}
