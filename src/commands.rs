use anyhow::{Context, Result};
use console::style;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::corpus::{
    CleaningPipeline, CsvLoader, Document, Label, load_labeled_corpus, write_documents_csv,
};
use crate::database::VectorStore;
use crate::embeddings::embedder::{Embedder, EmbeddingService, FailurePolicy};
use crate::embeddings::ollama::OllamaClient;
use crate::indexer::{BuildStats, CorpusIndexer};
use crate::retrieval::{Analysis, Analyzer, Verdict};

/// Longest reference excerpt shown after an analysis
const EXCERPT_CHARS: usize = 160;

/// Inputs and overrides for building the vector database
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub true_csv: PathBuf,
    pub fake_csv: PathBuf,
    /// Directory for the cleaned corpus files
    pub processed_dir: Option<PathBuf>,
    /// JSON lines cache of embedded chunks
    pub embedded_out: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub collection: Option<String>,
    pub embedding_model: Option<String>,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub skip_failed: bool,
}

/// Overrides for analyzing one article
#[derive(Debug, Clone, Default)]
pub struct RagOptions {
    pub db_path: Option<PathBuf>,
    pub collection: Option<String>,
    pub embedding_model: Option<String>,
    pub generation_model: Option<String>,
    pub n_results: Option<usize>,
    /// Article text; read from stdin when absent
    pub text: Option<String>,
}

/// Clean the corpus, embed it and load it into the vector database
#[inline]
pub async fn build_db(config: &Config, options: BuildOptions) -> Result<BuildStats> {
    let mut config = config.clone();
    if let Some(db_path) = options.db_path {
        config.storage.db_path = std::path::absolute(db_path)?;
    }
    if let Some(collection) = options.collection {
        config.storage.collection = collection;
    }
    if let Some(model) = options.embedding_model {
        config.embedding.model = model;
    }
    if let Some(chunk_size) = options.chunk_size {
        config.chunking.chunk_size = chunk_size;
    }
    if let Some(overlap) = options.overlap {
        config.chunking.overlap = overlap;
    }
    if options.skip_failed {
        config.embedding.failure_policy = FailurePolicy::SkipAndLog;
    }
    config.validate().context("Invalid build settings")?;

    eprintln!("{}", style("Loading and cleaning corpus...").yellow());
    let documents = load_labeled_corpus(
        &CsvLoader,
        &CleaningPipeline::standard(),
        &options.true_csv,
        &options.fake_csv,
    )
    .context("Failed to load corpus")?;
    eprintln!("  {} articles after cleaning", style(documents.len()).cyan());

    if let Some(dir) = &options.processed_dir {
        write_processed(dir, &documents)?;
        eprintln!("  Cleaned corpus written to {}", style(dir.display()).dim());
    }

    let client = OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    let embedder = Embedder::from_config(Arc::new(client), &config.embedding).with_progress(true);

    let db_path = config.vector_database_path();
    let store = VectorStore::open(
        &db_path,
        &config.storage.collection,
        config.embedding.dimension as usize,
    )
    .await
    .context("Failed to open vector store")?
    .with_distance(config.retrieval.distance)
    .with_insert_batch_size(config.storage.insert_batch_size)
    .with_progress(true);

    let mut indexer = CorpusIndexer::new(embedder, Arc::new(store), config.chunking);
    if let Some(cache) = options.embedded_out {
        indexer = indexer.with_cache(cache);
    }

    eprintln!(
        "{}",
        style(format!(
            "Embedding with {} and indexing into '{}'...",
            config.embedding.model, config.storage.collection
        ))
        .yellow()
    );
    let stats = indexer
        .build(&documents)
        .await
        .context("Failed to build vector database")?;

    eprintln!("{}", style("✓ Vector database ready").green());
    eprintln!("  Documents: {}", stats.documents);
    eprintln!("  Chunks created: {}", stats.chunks_created);
    eprintln!("  Chunks embedded: {}", stats.chunks_embedded);
    if stats.chunks_skipped > 0 {
        eprintln!(
            "  Chunks skipped: {}",
            style(stats.chunks_skipped).yellow()
        );
    }
    if stats.loaded_from_cache {
        eprintln!("  Embeddings loaded from cache");
    }
    eprintln!("  Records inserted: {}", stats.records_inserted);
    eprintln!("  Location: {}", style(db_path.display()).dim());

    Ok(stats)
}

/// Analyze one article against the vector database and print the verdict
#[inline]
pub async fn run_rag(config: &Config, options: RagOptions) -> Result<Analysis> {
    let mut config = config.clone();
    if let Some(db_path) = options.db_path {
        config.storage.db_path = std::path::absolute(db_path)?;
    }
    if let Some(collection) = options.collection {
        config.storage.collection = collection;
    }
    if let Some(model) = options.embedding_model {
        config.embedding.model = model;
    }
    if let Some(model) = options.generation_model {
        config.generation.model = model;
    }
    if let Some(n_results) = options.n_results {
        config.retrieval.n_results = n_results;
    }
    config.validate().context("Invalid analysis settings")?;

    let article = match options.text {
        Some(text) => text,
        None => {
            eprintln!(
                "{}",
                style("Paste the article, then an empty line (or EOF):").bold()
            );
            read_article(std::io::stdin().lock()).context("Failed to read article")?
        }
    };
    if article.trim().is_empty() {
        anyhow::bail!("No article text provided");
    }

    let store = VectorStore::open_existing(&config.vector_database_path(), &config.storage.collection)
        .await
        .context("Vector database not available, run build-db first")?
        .with_distance(config.retrieval.distance);

    let client = Arc::new(
        OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?,
    );
    let service: Arc<dyn EmbeddingService> = Arc::clone(&client) as Arc<dyn EmbeddingService>;
    let embedder = Embedder::from_config(service, &config.embedding);
    let analyzer = Analyzer::new(embedder, Arc::new(store), client, config.generation.model.clone());

    let analysis = analyzer
        .analyze_article(&article, config.retrieval.n_results)
        .await
        .context("Analysis failed")?;

    print_analysis(&analysis);
    Ok(analysis)
}

/// Show Ollama health and the size of the collection
#[inline]
pub async fn show_status(
    config: &Config,
    db_path: Option<PathBuf>,
    collection: Option<String>,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(db_path) = db_path {
        config.storage.db_path = std::path::absolute(db_path)?;
    }
    if let Some(collection) = collection {
        config.storage.collection = collection;
    }

    println!("📊 News Verdict Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let models = [
                config.embedding.model.clone(),
                config.generation.model.clone(),
            ];
            let health = tokio::task::spawn_blocking(move || {
                let names: Vec<&str> = models.iter().map(String::as_str).collect();
                client.health_check(&names)
            })
            .await
            .context("Health check task failed")?;

            match health {
                Ok(()) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                }
                Err(e) => {
                    println!("   ⚠️  Ollama: Unavailable or missing models - {:#}", e);
                }
            }
            println!("   📋 Embedding model: {}", config.embedding.model);
            println!("   📋 Generation model: {}", config.generation.model);
        }
        Err(e) => {
            println!("   ❌ Ollama: Invalid configuration - {}", e);
        }
    }

    println!();
    println!("🔍 Vector Database Status:");
    let db_path = config.vector_database_path();
    println!("   📁 Location: {}", db_path.display());
    match VectorStore::open_existing(&db_path, &config.storage.collection).await {
        Ok(store) => match store.count().await {
            Ok(count) => {
                println!(
                    "   ✅ Collection '{}': {} chunks ({} dimensions)",
                    store.collection_name(),
                    count,
                    store.dimension()
                );
            }
            Err(e) => println!("   ⚠️  Collection '{}': {}", store.collection_name(), e),
        },
        Err(e) => {
            warn!("Collection unavailable: {}", e);
            println!("   ❌ {}", e);
            println!("   Run 'news-verdict build-db' to create it.");
        }
    }

    Ok(())
}

/// Read lines until the first empty line or end of input
#[inline]
pub fn read_article<R: BufRead>(reader: R) -> std::io::Result<String> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// Write the cleaned true, fake and merged corpora into `dir`
fn write_processed(dir: &Path, documents: &[Document]) -> Result<()> {
    let (true_docs, fake_docs): (Vec<Document>, Vec<Document>) = documents
        .iter()
        .cloned()
        .partition(|document| document.label == Label::True);

    for (name, part) in [
        ("cleaned_true.csv", true_docs.as_slice()),
        ("cleaned_fake.csv", fake_docs.as_slice()),
        ("cleaned_all.csv", documents),
    ] {
        let path = dir.join(name);
        write_documents_csv(&path, part)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    info!("Wrote processed corpus to {}", dir.display());
    Ok(())
}

fn print_analysis(analysis: &Analysis) {
    println!();
    println!("{}", style("Reference articles").bold().cyan());
    if analysis.results.is_empty() {
        println!("  (none found)");
    }
    for (rank, result) in analysis.results.iter().enumerate() {
        let label = match result.metadata.label {
            Label::True => style("TRUE").green(),
            Label::Fake => style("FAKE").red(),
        };
        println!(
            "  {}. [{}] {} distance={:.4}",
            rank + 1,
            result.metadata.date,
            label,
            result.distance
        );
        println!("     {}", style(excerpt(&result.text)).dim());
    }

    println!();
    let verdict = match analysis.verdict.verdict {
        Verdict::True => style(analysis.verdict.verdict.to_string()).green().bold(),
        Verdict::Fake => style(analysis.verdict.verdict.to_string()).red().bold(),
        Verdict::Inconclusive | Verdict::Unknown => {
            style(analysis.verdict.verdict.to_string()).yellow().bold()
        }
    };
    println!("{} {}", style("Verdict:").bold(), verdict);
    println!("{} {}", style("Reason:").bold(), analysis.verdict.reason);
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}
