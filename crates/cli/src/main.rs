//! Colocation CLI
//!
//! A command-line tool for validating and resolving colocation config
//! documents offline, and for querying a running colocation agent.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{agent, offline};
use std::path::PathBuf;

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Colocation CLI
#[derive(Parser)]
#[command(name = "colo")]
#[command(author, version, about = "CLI for node colocation strategies", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via COLO_API_URL env var)
    #[arg(long, env = "COLO_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a colocation config document
    Validate {
        /// Path to the JSON document
        file: PathBuf,
    },

    /// Resolve the strategy for a label set against a config document
    Resolve {
        /// Path to the JSON document
        file: PathBuf,

        /// Node label, repeatable (key=value)
        #[arg(long = "label", short = 'l')]
        labels: Vec<String>,
    },

    /// Query a running agent
    #[command(subcommand)]
    Get(GetCommands),

    /// Show agent health, readiness and config generation
    Status,
}

#[derive(Subcommand)]
pub enum GetCommands {
    /// Get the resolved strategy for a node
    Strategy {
        /// Node name
        node: String,
    },

    /// List nodes registered with the agent
    Nodes {
        /// Label selector (k=v,k!=v,k,!k)
        #[arg(long, short)]
        selector: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::Config::load()?;

    let format = match cli.format {
        Some(format) => format,
        None => settings.format()?,
    };

    match cli.command {
        Commands::Validate { file } => {
            if !offline::validate(&file, format)? {
                std::process::exit(1);
            }
        }
        Commands::Resolve { file, labels } => {
            offline::resolve(&file, &labels, format)?;
        }
        Commands::Get(get_cmd) => {
            let client = api_client(cli.api_url, &settings)?;
            match get_cmd {
                GetCommands::Strategy { node } => {
                    agent::get_strategy(&client, &node, format).await?;
                }
                GetCommands::Nodes { selector } => {
                    agent::get_nodes(&client, selector.as_deref(), format).await?;
                }
            }
        }
        Commands::Status => {
            let client = api_client(cli.api_url, &settings)?;
            agent::show_status(&client, format).await?;
        }
    }

    Ok(())
}

/// Flag or env var, then the config file, then the local default
fn api_client(flag: Option<String>, settings: &config::Config) -> Result<client::ApiClient> {
    let url = flag
        .or_else(|| settings.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    client::ApiClient::new(&url)
}
