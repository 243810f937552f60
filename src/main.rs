//! snow-agent - conversational ServiceNow configuration agent
//!
#![doc = "snow-agent - conversational ServiceNow configuration agent"]
#![doc = "Main entry point for the snow-agent application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use snow_agent::agent::metrics::init_metrics_exporter;
use snow_agent::cli::{Cli, Commands};
use snow_agent::commands;
use snow_agent::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json_logs);
    init_metrics_exporter();

    // Load configuration
    let config = Config::load(cli.config_path(), &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command.clone().unwrap_or(Commands::Chat) {
        Commands::Chat => {
            commands::chat::run_chat(config).await?;
            Ok(())
        }
        Commands::Run { task } => {
            let task = task.join(" ");
            tracing::debug!("Using task: {}", task);
            commands::run::run_task(config, task).await?;
            Ok(())
        }
        Commands::Ping => {
            commands::ping::run_ping(config).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output for
/// this crate.
fn init_tracing(verbose: bool, json_logs: bool) {
    let default_filter = if verbose {
        "snow_agent=debug"
    } else {
        "snow_agent=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
