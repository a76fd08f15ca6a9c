use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flowrelay")]
#[command(about = "Flow-log to event-stream forwarder", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        /// Process the spool once and exit instead of watching
        #[arg(long)]
        once: bool,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowrelay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = flowrelay::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run { once }) => {
            flowrelay::cli::run::run(config_path, once).await?;
        }
        None => {
            flowrelay::cli::run::run(config_path, false).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                flowrelay::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                flowrelay::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
