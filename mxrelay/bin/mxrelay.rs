//! Relays one message straight to its recipients' mail exchangers.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mxrelay::{CONFIG_ENV, DEFAULT_CONFIG_FILE, OutputFormat};
use mxrelay_delivery::Relay;

#[derive(Parser, Debug)]
#[command(name = "mxrelay")]
#[command(about = "Deliver mail directly to recipient MX hosts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the RON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Relay a message once and print the per-recipient outcome
    Send {
        /// Message file (JSON, or RON with a .ron extension)
        #[arg(short, long)]
        message: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Print diagnostic snapshots regardless of MXRELAY_DEBUG
        #[arg(long)]
        debug: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mxrelay_common::logging::init();

    let cli = Cli::parse();

    let config_path = mxrelay::find_config_file(
        cli.config,
        std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        Path::new(DEFAULT_CONFIG_FILE),
    )?;
    let config = mxrelay::load_config(config_path.as_deref())?;

    match cli.command {
        Commands::Send {
            message,
            format,
            debug,
        } => {
            let message = mxrelay::load_message(&message)?;

            let mut relay = Relay::with_defaults(&config)?;
            if debug {
                relay = relay.debug_snapshots(true);
            }

            let summary = relay.relay(message, config.domains.clone()).await?;
            mxrelay::print(&mut std::io::stdout().lock(), &summary, format)?;
        }
    }

    Ok(())
}
