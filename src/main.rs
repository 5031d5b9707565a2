use clap::{Parser, Subcommand};
use news_verdict::Result;
use news_verdict::commands::{BuildOptions, RagOptions, build_db, run_rag, show_status};
use news_verdict::config::{Config, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "news-verdict")]
#[command(about = "Retrieval-augmented fact checking of news articles against a labeled corpus")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and model settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Clean the corpus, embed it and build the vector database
    BuildDb {
        /// CSV file of true articles
        #[arg(long, default_value = "data/raw/True.csv")]
        true_csv: PathBuf,
        /// CSV file of fake articles
        #[arg(long, default_value = "data/raw/Fake.csv")]
        fake_csv: PathBuf,
        /// Write the cleaned corpus into this directory
        #[arg(long)]
        processed_dir: Option<PathBuf>,
        /// Cache embedded chunks in this JSON lines file, reusing it when present
        #[arg(long)]
        embedded_out: Option<PathBuf>,
        #[command(flatten)]
        target: TargetArgs,
        /// Embedding model name
        #[arg(long)]
        embedding_model: Option<String>,
        /// Chunk size in words
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Words shared by consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,
        /// Skip chunks that fail to embed instead of aborting
        #[arg(long)]
        skip_failed: bool,
    },
    /// Analyze an article and print a verdict
    Rag {
        #[command(flatten)]
        target: TargetArgs,
        /// Embedding model name, must match the one used by build-db
        #[arg(long)]
        embedding_model: Option<String>,
        /// Generation model name
        #[arg(long)]
        generation_model: Option<String>,
        /// Number of reference chunks to retrieve
        #[arg(long, short = 'k')]
        n_results: Option<usize>,
        /// Article text; read from stdin when omitted
        #[arg(long)]
        text: Option<String>,
    },
    /// Show Ollama health and vector database status
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Location of the vector collection
#[derive(clap::Args)]
struct TargetArgs {
    /// Vector database directory
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// Collection name
    #[arg(long)]
    collection: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            let base_dir = Config::default_base_dir()?;
            if show {
                show_config(&Config::load(&base_dir)?);
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::BuildDb {
            true_csv,
            fake_csv,
            processed_dir,
            embedded_out,
            target,
            embedding_model,
            chunk_size,
            overlap,
            skip_failed,
        } => {
            let config = Config::load_default()?;
            build_db(
                &config,
                BuildOptions {
                    true_csv,
                    fake_csv,
                    processed_dir,
                    embedded_out,
                    db_path: target.db_path,
                    collection: target.collection,
                    embedding_model,
                    chunk_size,
                    overlap,
                    skip_failed,
                },
            )
            .await?;
        }
        Commands::Rag {
            target,
            embedding_model,
            generation_model,
            n_results,
            text,
        } => {
            let config = Config::load_default()?;
            run_rag(
                &config,
                RagOptions {
                    db_path: target.db_path,
                    collection: target.collection,
                    embedding_model,
                    generation_model,
                    n_results,
                    text,
                },
            )
            .await?;
        }
        Commands::Status { target } => {
            let config = Config::load_default()?;
            show_status(&config, target.db_path, target.collection).await?;
        }
    }

    Ok(())
}
