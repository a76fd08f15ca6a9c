use crate::config::load_config;
use crate::sink::{DeliveryError, EventHubSender};
use crate::spool::{SpoolError, SpoolRunner};
use std::path::PathBuf;
use thiserror::Error;
use tokio::signal;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("sink error: {0}")]
    Sink(#[from] DeliveryError),

    #[error("spool error: {0}")]
    Spool(#[from] SpoolError),
}

pub async fn run(
    config_path: Option<PathBuf>,
    once: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/flowrelay/config.yml");
            eprintln!("  /etc/flowrelay/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'flowrelay config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_forwarder(&config_path, once).await.map_err(|e| e.into())
}

async fn run_forwarder(config_path: &PathBuf, once: bool) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let sender = EventHubSender::new(&config.sink)?;
    info!(
        endpoint = sender.endpoint(),
        max_events = config.batch.max_events,
        "Sink configured"
    );

    let runner = SpoolRunner::new(config.spool.clone(), config.batch.max_events, sender);

    if once {
        return Ok(runner.run(true).await?);
    }

    info!(spool = %config.spool.path.display(), "Watching spool, press Ctrl+C to shutdown");
    tokio::select! {
        result = runner.run(false) => {
            result?;
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
