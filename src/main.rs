use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vesper_memory::context_size::KvParams;
use vesper_memory::{cli, config, server};

#[derive(Parser)]
#[command(
    name = "vesper-memory",
    version,
    about = "Persistent conversational memory for a local LLM"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build memory if needed, then serve the lookup API
    Serve,
    /// Unzip the export and build the memory table
    Build,
    /// Search memory from the terminal
    Search {
        query: String,
        /// Number of results (clamped to 1..=20)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Show what the memory database holds
    Stats,
    /// Drop the memory table so the next build starts over
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Answer a query with retrieved memory as context
    Ask {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Suggest a context size for a GGUF model given the available VRAM
    Context {
        /// Model file (first part for split models)
        model: PathBuf,
        /// Total VRAM across GPUs, in MiB
        #[arg(long)]
        vram_mib: u64,
        /// Transformer block count
        #[arg(long)]
        layers: u64,
        /// Embedding length
        #[arg(long)]
        embd: u64,
        /// Attention head count
        #[arg(long)]
        heads: u64,
        /// KV head count (defaults to --heads)
        #[arg(long)]
        kv_heads: Option<u64>,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.vesper/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::VesperConfig::load()?;

    // stdout is reserved for command output
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve(config).await?,
        Command::Build => cli::build::build(&config).await?,
        Command::Search { query, k } => cli::search::search(&config, &query, k).await?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Reset { yes } => cli::reset::reset(&config, yes)?,
        Command::Ask { query, k } => cli::ask::ask(&config, &query, k).await?,
        Command::Context {
            model,
            vram_mib,
            layers,
            embd,
            heads,
            kv_heads,
        } => cli::context::context(
            &model,
            vram_mib,
            KvParams {
                layers,
                embedding_length: embd,
                heads,
                kv_heads: kv_heads.unwrap_or(heads),
            },
        )?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
