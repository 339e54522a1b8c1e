use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

/// Numeric identifier of a figshare article, e.g. `22202866`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleId(u64);

impl ArticleId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ArticleId {
    type Err = MirrorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(MirrorError::InvalidArticleId(value.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(Self)
            .map_err(|_| MirrorError::InvalidArticleId(value.to_string()))
    }
}

/// One file record from the article's metadata listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub download_url: String,
}

/// Ephemeral unit of work for the downloader.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub source_url: String,
    pub destination: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub file_name: String,
    pub outcome: PipelineOutcome,
}

/// Result of one per-file pipeline. `Failed` is the failure sentinel: the
/// pipeline boundary absorbs every error into it so the batch keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineOutcome {
    Uploaded(usize),
    Failed,
}

impl PipelineOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineOutcome::Failed)
    }
}
