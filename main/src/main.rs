mod commands;
mod context;

use clap::{Parser, Subcommand};
use common::utils::config::get_config;
use context::AppContext;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "garner",
    about = "Build and synchronize a knowledge base into a vector store"
)]
struct Cli {
    /// Path to the configuration file (defaults to ./config.*)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile datasets against the record ledger and vector store
    Index {
        /// Restrict to one dataset
        #[arg(long)]
        id: Option<String>,
        /// Re-write chunks that are already indexed, counting them as updated
        #[arg(long)]
        force: bool,
    },
    /// Write dataset chunks to their cache folders
    Cache {
        #[arg(long)]
        id: Option<String>,
    },
    /// Retire everything ledgered for datasets
    Clear {
        #[arg(long)]
        id: Option<String>,
    },
    /// Delete chunks matching metadata filters, across namespaces
    Delete {
        /// Metadata equality filter, `key:value`; repeatable
        #[arg(long = "filter", value_parser = parse_filter, required = true)]
        filters: Vec<(String, String)>,
        #[arg(long)]
        id: Option<String>,
    },
    /// List datasets and their capabilities
    Ls,
    /// Similarity search over the vector store
    Search {
        query: String,
        /// Metadata equality filter, `key:value`; repeatable
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        /// Number of results
        #[arg(short, default_value_t = 4)]
        k: usize,
    },
    /// Print the first chunk's metadata per dataset
    Metadata {
        #[arg(long)]
        id: Option<String>,
    },
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("invalid filter '{raw}', expected key:value")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = get_config(cli.config.as_deref())?;
    let ctx = AppContext::initialize(config).await?;

    match cli.command {
        Command::Index { id, force } => commands::index(&ctx, id.as_deref(), force).await?,
        Command::Cache { id } => commands::cache(&ctx, id.as_deref()).await?,
        Command::Clear { id } => commands::clear(&ctx, id.as_deref()).await?,
        Command::Delete { filters, id } => {
            commands::delete(&ctx, &filters, id.as_deref()).await?
        }
        Command::Ls => commands::ls(&ctx),
        Command::Search { query, filters, k } => {
            commands::search(&ctx, &query, &filters, k).await?
        }
        Command::Metadata { id } => commands::metadata(&ctx, id.as_deref()).await?,
    }

    Ok(())
}
