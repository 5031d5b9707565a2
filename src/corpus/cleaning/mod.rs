
use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use fancy_regex::Regex;
use tracing::debug;

use super::RawArticle;

/// A pure transformation from one table of rows to a new one
pub type CleaningStep = fn(Vec<RawArticle>) -> Vec<RawArticle>;

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("valid regex"));

static HTML_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Date layouts found in the news corpora, tried in order
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d-%b-%y",
    "%Y/%m/%d",
    "%m/%d/%Y",
];

/// Ordered list of named cleaning steps
pub struct CleaningPipeline {
    steps: Vec<(&'static str, CleaningStep)>,
}

impl CleaningPipeline {
    /// A pipeline without steps; `run` returns its input
    #[inline]
    pub const fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Drop empty rows and duplicates, normalize whitespace, lowercase,
    /// normalize dates, then strip URLs, markup and punctuation.
    #[inline]
    pub fn standard() -> Self {
        Self::empty()
            .with_step("drop_empty_and_duplicates", drop_empty_and_duplicates)
            .with_step("collapse_whitespace", collapse_whitespace)
            .with_step("lowercase", lowercase)
            .with_step("normalize_dates", normalize_dates)
            .with_step("clean_text_columns", clean_text_columns)
    }

    #[inline]
    #[must_use]
    pub fn with_step(mut self, name: &'static str, step: CleaningStep) -> Self {
        self.steps.push((name, step));
        self
    }

    #[inline]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|(name, _)| *name).collect()
    }

    #[inline]
    pub fn run(&self, rows: Vec<RawArticle>) -> Vec<RawArticle> {
        self.steps.iter().fold(rows, |rows, (name, step)| {
            let before = rows.len();
            let rows = step(rows);
            debug!("Cleaning step {}: {} -> {} rows", name, before, rows.len());
            rows
        })
    }
}

impl Default for CleaningPipeline {
    #[inline]
    fn default() -> Self {
        Self::standard()
    }
}

/// Remove rows without text or date, then rows whose text was already seen
#[inline]
pub fn drop_empty_and_duplicates(rows: Vec<RawArticle>) -> Vec<RawArticle> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| row.text.is_some() && row.date.is_some())
        .filter(|row| row.text.as_ref().is_some_and(|text| seen.insert(text.clone())))
        .collect()
}

/// Trim every column and collapse inner whitespace runs to one space
#[inline]
pub fn collapse_whitespace(rows: Vec<RawArticle>) -> Vec<RawArticle> {
    rows.into_iter()
        .map(|row| RawArticle {
            title: row.title.as_deref().map(squash_spaces),
            text: row.text.as_deref().map(squash_spaces),
            subject: row.subject.as_deref().map(squash_spaces),
            date: row.date.as_deref().map(squash_spaces),
        })
        .collect()
}

/// Lowercase title, text and subject
#[inline]
pub fn lowercase(rows: Vec<RawArticle>) -> Vec<RawArticle> {
    rows.into_iter()
        .map(|row| RawArticle {
            title: row.title.map(|s| s.to_lowercase()),
            text: row.text.map(|s| s.to_lowercase()),
            subject: row.subject.map(|s| s.to_lowercase()),
            date: row.date,
        })
        .collect()
}

/// Rewrite dates as `YYYY-MM-DD`; rows with unparseable dates are dropped
#[inline]
pub fn normalize_dates(rows: Vec<RawArticle>) -> Vec<RawArticle> {
    rows.into_iter()
        .filter_map(|row| {
            let date = parse_date(row.date.as_deref()?)?;
            Some(RawArticle {
                date: Some(date.format("%Y-%m-%d").to_string()),
                ..row
            })
        })
        .collect()
}

/// Strip URLs, HTML tags and non-alphanumeric characters from text columns
#[inline]
pub fn clean_text_columns(rows: Vec<RawArticle>) -> Vec<RawArticle> {
    rows.into_iter()
        .map(|row| RawArticle {
            title: row.title.as_deref().map(clean_text),
            text: row.text.as_deref().map(clean_text),
            subject: row.subject.as_deref().map(clean_text),
            date: row.date,
        })
        .collect()
}

/// Parse a date in any of the supported layouts
#[inline]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = squash_spaces(value);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&value, format).ok())
}

/// Remove URLs, markup and punctuation, keeping letters, digits and single spaces
#[inline]
pub fn clean_text(text: &str) -> String {
    let without_urls = URL_REGEX.replace_all(text, " ");
    let without_tags = HTML_TAG_REGEX.replace_all(&without_urls, " ");
    let alphanumeric: String = without_tags
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    squash_spaces(&alphanumeric)
}

fn squash_spaces(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
