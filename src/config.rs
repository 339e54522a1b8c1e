use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::ArticleId;
use crate::download::RetryPolicy;
use crate::error::MirrorError;

/// Policy constants mirrored by the defaults below. All of them can be
/// overridden from `figmirror.json`; the storage account URL comes from the
/// environment only.
pub const DEFAULT_ARTICLE_ID: u64 = 22202866;
pub const DEFAULT_CONTAINER: &str = "polyp-datasets";
pub const DEFAULT_BASE_PREFIX: &str = "real-colon-dataset";
pub const DEFAULT_TRANSFER_WORKERS: usize = 4;
pub const DEFAULT_EXTRACT_WORKERS: usize = 3;
pub const DEFAULT_MAX_DOWNLOAD_ATTEMPTS: usize = 1000;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 180;
pub const DEFAULT_LOG_FILE: &str = "figmirror.log";

pub const ACCOUNT_URL_ENV: &str = "AZURE_STORAGE_ACCOUNT_URL";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub article_id: Option<u64>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub base_prefix: Option<String>,
    #[serde(default)]
    pub transfer_workers: Option<usize>,
    #[serde(default)]
    pub extract_workers: Option<usize>,
    #[serde(default)]
    pub max_download_attempts: Option<usize>,
    #[serde(default)]
    pub retry_delay_secs: Option<u64>,
    #[serde(default)]
    pub skip_existing_extraction: Option<bool>,
    #[serde(default)]
    pub ca_bundle: Option<Utf8PathBuf>,
    #[serde(default)]
    pub log_file: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub article: ArticleId,
    /// Absent until resolved from the environment; only the commands that
    /// touch remote storage require it.
    pub account_url: Option<String>,
    pub container: String,
    pub base_prefix: String,
    pub transfer_workers: usize,
    pub extract_workers: usize,
    pub retry: RetryPolicy,
    pub skip_existing_extraction: bool,
    pub ca_bundle: Option<Utf8PathBuf>,
    pub log_file: Utf8PathBuf,
}

impl MirrorConfig {
    pub fn account_url(&self) -> Result<&str, MirrorError> {
        self.account_url
            .as_deref()
            .ok_or(MirrorError::MissingAccountUrl)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the effective configuration. An explicitly passed path must
    /// exist; the default `figmirror.json` is optional.
    pub fn resolve(path: Option<&str>) -> Result<MirrorConfig, MirrorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("figmirror.json"),
        };

        let file = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| MirrorError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| MirrorError::ConfigParse(err.to_string()))?
        } else if path.is_some() {
            return Err(MirrorError::ConfigRead(config_path));
        } else {
            ConfigFile::default()
        };

        Ok(Self::resolve_file(file, std::env::var(ACCOUNT_URL_ENV).ok()))
    }

    pub fn resolve_file(file: ConfigFile, account_url: Option<String>) -> MirrorConfig {
        MirrorConfig {
            article: ArticleId::new(file.article_id.unwrap_or(DEFAULT_ARTICLE_ID)),
            account_url: account_url.filter(|url| !url.trim().is_empty()),
            container: file
                .container
                .unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            base_prefix: file
                .base_prefix
                .unwrap_or_else(|| DEFAULT_BASE_PREFIX.to_string()),
            transfer_workers: file.transfer_workers.unwrap_or(DEFAULT_TRANSFER_WORKERS),
            extract_workers: file.extract_workers.unwrap_or(DEFAULT_EXTRACT_WORKERS),
            retry: RetryPolicy {
                max_attempts: file
                    .max_download_attempts
                    .unwrap_or(DEFAULT_MAX_DOWNLOAD_ATTEMPTS),
                retry_delay: Duration::from_secs(
                    file.retry_delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS),
                ),
            },
            skip_existing_extraction: file.skip_existing_extraction.unwrap_or(true),
            ca_bundle: file.ca_bundle,
            log_file: file
                .log_file
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}
