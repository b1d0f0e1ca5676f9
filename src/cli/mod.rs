use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod serve;

use crate::core::AppConfig;
use crate::core::logging::{init_tracing, server_filter};

#[derive(Subcommand)]
enum Command {
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, env = "PORT", default_value = "5000")]
        port: String,
    },
    /// Start an interactive chat session in the terminal
    Chat {
        /// Resume or name the session, a random id is used otherwise
        #[arg(long)]
        session: Option<String>,

        /// Wait for the whole reply instead of streaming it
        #[arg(long, action, default_value = "false")]
        no_stream: bool,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

fn load_config() -> AppConfig {
    match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Serve { host, port }) => {
            init_tracing(&server_filter());
            serve::run(host, port, load_config()).await?;
        }
        Some(Command::Chat { session, no_stream }) => {
            init_tracing("warn");
            chat::run(session, !no_stream, load_config()).await?;
        }
        None => {}
    }

    Ok(())
}
