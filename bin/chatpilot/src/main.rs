mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "chatpilot")]
#[command(about = "Remote-control a browser-hosted chat through its debugging protocol", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize chatpilot configuration
    Onboard {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and debug endpoint status
    Status,

    /// List open debugging targets
    Tabs,

    /// Send a message and wait for the reply to stabilize
    Send {
        /// Message text
        message: String,

        /// Return immediately after submitting, without waiting
        #[arg(long)]
        no_wait: bool,

        /// Seconds to wait for the reply (overrides config)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Print the current conversation snapshot
    Messages,

    /// Start a debug-mode browser if none is running
    Launch {
        /// URL to open in the launched browser
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Onboard { force } => {
            commands::onboard::run(force).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Tabs => {
            commands::tabs_cmd::run().await?;
        }
        Commands::Send {
            message,
            no_wait,
            timeout,
        } => {
            commands::send::run(message, no_wait, timeout).await?;
        }
        Commands::Messages => {
            commands::messages::run().await?;
        }
        Commands::Launch { url } => {
            commands::launch_cmd::run(url).await?;
        }
    }

    Ok(())
}
