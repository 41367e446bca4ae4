mod config;
mod definitions;
mod orchestrator;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use crate::config::Config;
use crate::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "vigie-service", about = "Synthetic monitoring daemon")]
struct Args {
    /// Path to the config file (defaults to the XDG location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the suite-definitions directory from the config
    #[arg(long)]
    tests_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let mut config = Config::from_config(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(dir) = args.tests_dir {
        config.tests.directory = dir;
    }
    info!("{config}");

    let mut orchestrator = Orchestrator::start(config).await?;

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sighup = signal(SignalKind::hangup())?;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = sighup.recv() => {
                    info!("SIGHUP received, reloading test definitions");
                    if let Err(e) = orchestrator.reload().await {
                        error!(error = %e, "reload failed, keeping previous suites");
                    }
                }
            }
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    orchestrator.stop();
    Ok(())
}
