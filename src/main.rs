//! submitqueue - priority merge queue service

mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use submit_queue::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "submitqueue")]
#[command(about = "Priority merge queue: test pull requests and merge them only if nothing moved")]
#[command(version)]
struct Cli {
    /// Project configuration file (TOML, or JSON by extension)
    #[arg(short, long, global = true, default_value = "projects.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and list projects
    Check,

    /// Run one worker per project and serve the submission API
    Run {
        /// Listen address, overriding `[server] listen`
        #[arg(long)]
        listen: Option<String>,

        /// Only run workers; do not start the API
        #[arg(long)]
        no_server: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "submit_queue=info,submitqueue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Check => cli::run_check(&config),
        Commands::Run { listen, no_server } => {
            cli::run_service(config, cli::RunOptions { listen, no_server })
                .await
                .context("submit queue stopped with an error")?;
        }
    }

    Ok(())
}
