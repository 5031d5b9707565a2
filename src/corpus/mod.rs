// Corpus module
// Loads the labeled news CSV files and turns them into clean documents

pub mod cleaning;


use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::{Result, VerdictError};

pub use cleaning::CleaningPipeline;

/// Ground-truth label of a corpus article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Label {
    Fake,
    True,
}

impl Label {
    #[inline]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Fake => 0,
            Self::True => 1,
        }
    }
}

impl From<Label> for i32 {
    #[inline]
    fn from(label: Label) -> Self {
        label.as_i32()
    }
}

impl TryFrom<i32> for Label {
    type Error = String;

    #[inline]
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Fake),
            1 => Ok(Self::True),
            other => Err(format!("invalid label value: {} (expected 0 or 1)", other)),
        }
    }
}

impl fmt::Display for Label {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// One row of a raw corpus file, before cleaning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArticle {
    pub title: Option<String>,
    pub text: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
}

/// A cleaned, labeled article of the merged corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Position in the merged corpus
    pub index: u64,
    pub text: String,
    pub subject: String,
    pub date: String,
    pub label: Label,
}

/// Anything that can load tabular article records from a path
pub trait CorpusLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawArticle>>;
}

/// Loads articles from a CSV file with a header row.
///
/// `text` and `date` columns are required; `title` and `subject` are
/// optional. Column names are matched case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvLoader;

impl CorpusLoader for CsvLoader {
    #[inline]
    fn load(&self, path: &Path) -> Result<Vec<RawArticle>> {
        debug!("Loading corpus file {}", path.display());

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| {
                VerdictError::Corpus(format!("Failed to open {}: {}", path.display(), e))
            })?;

        let headers = reader
            .headers()
            .map_err(|e| {
                VerdictError::Corpus(format!(
                    "Failed to read header of {}: {}",
                    path.display(),
                    e
                ))
            })?
            .clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let text_idx = column("text").ok_or_else(|| ConfigError::MissingColumn("text".into()))?;
        let date_idx = column("date").ok_or_else(|| ConfigError::MissingColumn("date".into()))?;
        let title_idx = column("title");
        let subject_idx = column("subject");

        let field = |record: &csv::StringRecord, idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string)
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| {
                VerdictError::Corpus(format!("Malformed row in {}: {}", path.display(), e))
            })?;
            rows.push(RawArticle {
                title: field(&record, title_idx),
                text: field(&record, Some(text_idx)),
                subject: field(&record, subject_idx),
                date: field(&record, Some(date_idx)),
            });
        }

        info!("Loaded {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }
}

/// Attach a label to cleaned rows. Rows still missing text or date are skipped.
#[inline]
pub fn label_articles(rows: Vec<RawArticle>, label: Label) -> Vec<Document> {
    rows.into_iter()
        .filter_map(|row| {
            Some(Document {
                index: 0,
                text: row.text?,
                subject: row.subject.unwrap_or_default(),
                date: row.date?,
                label,
            })
        })
        .collect()
}

/// Concatenate labeled parts and assign corpus indices from zero
#[inline]
pub fn merge(parts: Vec<Vec<Document>>) -> Vec<Document> {
    parts
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(i, document)| Document {
            index: i as u64,
            ..document
        })
        .collect()
}

/// Load, clean and label the true and fake corpus files, then merge them
#[inline]
pub fn load_labeled_corpus(
    loader: &dyn CorpusLoader,
    pipeline: &CleaningPipeline,
    true_path: &Path,
    fake_path: &Path,
) -> Result<Vec<Document>> {
    let true_rows = pipeline.run(loader.load(true_path)?);
    let fake_rows = pipeline.run(loader.load(fake_path)?);

    let documents = merge(vec![
        label_articles(true_rows, Label::True),
        label_articles(fake_rows, Label::Fake),
    ]);

    info!("Merged corpus holds {} articles", documents.len());
    Ok(documents)
}

/// Save documents as CSV (`index,text,subject,date,label`)
#[inline]
pub fn write_documents_csv(path: &Path, documents: &[Document]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        VerdictError::Corpus(format!("Failed to create {}: {}", path.display(), e))
    })?;

    for document in documents {
        writer.serialize(document).map_err(|e| {
            VerdictError::Corpus(format!("Failed to write {}: {}", path.display(), e))
        })?;
    }
    writer.flush()?;

    debug!("Wrote {} documents to {}", documents.len(), path.display());
    Ok(())
}
