//! Taskpilot server binary.

use std::path::PathBuf;

use clap::Parser;
use taskpilot::AppConfig;
use tracing::info;

/// Task management API with reminders and a chat assistant.
#[derive(Parser)]
#[command(name = "taskpilot", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "TASKPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let _log_guard = taskpilot::app::init_tracing(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "starting taskpilot");

    taskpilot::app::run(config).await
}
