use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MirrorError {
    #[error("invalid figshare article id: {0}")]
    InvalidArticleId(String),

    #[error("AZURE_STORAGE_ACCOUNT_URL is not set")]
    MissingAccountUrl,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog endpoint returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("download client error: {0}")]
    DownloadHttp(String),

    #[error("download of {url} failed after {attempts} attempts")]
    DownloadExhausted { url: String, attempts: usize },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("blob storage error: {0}")]
    Storage(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
