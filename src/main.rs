mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jira_cache::config::CacheConfig;

#[derive(Parser)]
#[command(
    name = "jira-cache",
    version,
    about = "Caching and retrieval MCP server for Jira"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (transport from config: stdio or sse)
    Serve {
        /// Override the configured transport
        #[arg(long)]
        transport: Option<String>,
    },
    /// Show cache statistics
    Stats,
    /// Remove aged-out issues and searches
    Purge,
    /// Re-embed every cached issue with the configured model
    Reindex,
    /// Check cache integrity and configuration
    Doctor,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.jira-cache/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CacheConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "stdio" => server::serve_stdio(config).await?,
                "sse" | "http" => server::serve_sse(config).await?,
                other => anyhow::bail!("unknown transport '{other}'. Expected: stdio, sse"),
            }
        }
        Command::Stats => cli::stats::stats(&config)?,
        Command::Purge => cli::purge::purge(&config)?,
        Command::Reindex => cli::reindex::reindex(&config).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
