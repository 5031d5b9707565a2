
use std::fmt;
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

static VERDICT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Verdict:\s*\**\s*(TRUE|FAKE|INCONCLUSIVE)\b").expect("valid regex")
});

static REASON_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)Reason:\s*\**\s*(.*)").expect("valid regex"));

/// Classification extracted from a model response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    True,
    Fake,
    Inconclusive,
    /// The response carried no recognizable verdict
    Unknown,
}

impl fmt::Display for Verdict {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::True => "TRUE",
            Self::Fake => "FAKE",
            Self::Inconclusive => "INCONCLUSIVE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictReport {
    pub verdict: Verdict,
    pub reason: String,
}

/// Extract the verdict and reason from free-form model output. Never fails.
#[inline]
pub fn parse_verdict(response: &str) -> VerdictReport {
    let verdict = VERDICT_REGEX
        .captures(response)
        .ok()
        .flatten()
        .and_then(|caps| caps.get(1))
        .map_or(Verdict::Unknown, |m| {
            match m.as_str().to_ascii_uppercase().as_str() {
                "TRUE" => Verdict::True,
                "FAKE" => Verdict::Fake,
                _ => Verdict::Inconclusive,
            }
        });

    let reason = REASON_REGEX
        .captures(response)
        .ok()
        .flatten()
        .and_then(|caps| caps.get(1))
        .map_or(response, |m| m.as_str())
        .trim()
        .trim_matches('*')
        .trim()
        .to_string();

    VerdictReport { verdict, reason }
}
