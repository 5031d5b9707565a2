// Retrieval module
// Embeds an article, finds similar reference chunks and asks a model for a verdict

pub mod verdict;


use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::database::{SearchResult, VectorIndex};
use crate::embeddings::embedder::Embedder;
use crate::{Result, VerdictError};

pub use verdict::{Verdict, VerdictReport, parse_verdict};

/// Produces a text completion for a prompt. Implementations block the calling thread.
pub trait GenerationService: Send + Sync {
    fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Steps of one article analysis, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    QueryEmbedded,
    Retrieved,
    ContextBuilt,
    PromptBuilt,
    ResponseGenerated,
    Parsed,
}

impl fmt::Display for AnalysisStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::QueryEmbedded => "query embedded",
            Self::Retrieved => "references retrieved",
            Self::ContextBuilt => "context built",
            Self::PromptBuilt => "prompt built",
            Self::ResponseGenerated => "response generated",
            Self::Parsed => "verdict parsed",
        };
        f.write_str(name)
    }
}

/// Outcome of analyzing one article
#[derive(Debug, Clone)]
pub struct Analysis {
    pub verdict: VerdictReport,
    /// Unparsed model output
    pub raw_response: String,
    /// Reference chunks used as context, most similar first
    pub results: Vec<SearchResult>,
}

/// Retrieval-augmented fact checker.
///
/// The vector index and the generation service are injected, so the same
/// analyzer runs against LanceDB and Ollama or against in-memory fakes.
pub struct Analyzer {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn GenerationService>,
    generation_model: String,
}

impl fmt::Debug for Analyzer {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("embedder", &self.embedder)
            .field("generation_model", &self.generation_model)
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    #[inline]
    pub fn new(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn GenerationService>,
        generation_model: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            generation_model: generation_model.into(),
        }
    }

    #[inline]
    pub fn generation_model(&self) -> &str {
        &self.generation_model
    }

    /// Embed the whole article as a single unit
    #[inline]
    pub async fn vectorize_query(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(VerdictError::Input("Article text is empty".to_string()));
        }

        self.embedder
            .embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| VerdictError::Service("Embedding service returned nothing".to_string()))
    }

    /// The `k` most similar reference chunks
    #[inline]
    pub async fn retrieve(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let results = self.index.query(vector, k).await?;

        debug!("Retrieved {} similar chunks", results.len());
        for result in &results {
            debug!(" - {} distance={:.4}", result.id, result.distance);
        }
        Ok(results)
    }

    /// Run the prompt through the generation model
    #[inline]
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let generator = Arc::clone(&self.generator);
        let model = self.generation_model.clone();
        let prompt = prompt.to_string();

        info!("Generating response with {}", model);
        tokio::task::spawn_blocking(move || generator.generate(&model, &prompt))
            .await
            .map_err(|e| VerdictError::Service(format!("Generation task failed: {}", e)))?
    }

    /// Full pipeline: embed, retrieve, build context and prompt, generate, parse
    #[inline]
    pub async fn analyze_article(&self, text: &str, k: usize) -> Result<Analysis> {
        let vector = self.vectorize_query(text).await?;
        log_stage(AnalysisStage::QueryEmbedded);

        let results = self.retrieve(&vector, k).await?;
        log_stage(AnalysisStage::Retrieved);

        let context = build_context(&results);
        log_stage(AnalysisStage::ContextBuilt);

        let prompt = build_prompt(text, &context);
        log_stage(AnalysisStage::PromptBuilt);

        let raw_response = self.generate(&prompt).await?;
        log_stage(AnalysisStage::ResponseGenerated);

        let verdict = parse_verdict(&raw_response);
        log_stage(AnalysisStage::Parsed);

        info!("Verdict: {}", verdict.verdict);
        Ok(Analysis {
            verdict,
            raw_response,
            results,
        })
    }
}

fn log_stage(stage: AnalysisStage) {
    info!("Analysis stage: {}", stage);
}

/// One `[date] (label): text` entry per result, separated by blank lines
#[inline]
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| {
            format!(
                "[{}] ({}): {}",
                result.metadata.date, result.metadata.label, result.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fact-checking prompt declaring the expected response format
#[inline]
pub fn build_prompt(article: &str, context: &str) -> String {
    format!(
        "You are a fact-checking assistant.
You are given an article written by a user and several similar news articles.

Your task:
1. Use the provided context to analyze the user's article.
2. Determine if the article is TRUE (label = 1) or FAKE (label = 0).
   If the context is not related enough to decide, answer INCONCLUSIVE.
3. Explain briefly why you think so (based only on the retrieved context).

### CONTEXT

{context}

### ARTICLE TO ANALYZE

{article}

### RESPONSE FORMAT

Verdict: TRUE, FAKE or INCONCLUSIVE
Reason: <your explanation>"
    )
}
