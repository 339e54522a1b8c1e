use std::fs;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::{ArticleId, CatalogEntry};
use crate::error::MirrorError;

const FIGSHARE_API_BASE: &str = "https://api.figshare.com/v2";

/// Read access to the dataset's metadata listing. Catalog failures are fatal
/// for a run; there is no retry at this seam.
pub trait CatalogClient: Send + Sync {
    fn fetch_catalog(&self, article: &ArticleId) -> Result<Vec<CatalogEntry>, MirrorError>;
}

#[derive(Clone)]
pub struct FigshareHttpClient {
    client: Client,
    base_url: String,
}

impl FigshareHttpClient {
    pub fn new(ca_bundle: Option<&Utf8Path>) -> Result<Self, MirrorError> {
        Self::with_base_url(FIGSHARE_API_BASE.to_string(), ca_bundle)
    }

    pub fn with_base_url(
        base_url: String,
        ca_bundle: Option<&Utf8Path>,
    ) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("figmirror/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MirrorError::CatalogHttp(err.to_string()))?,
        );

        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(60));
        if let Some(bundle) = ca_bundle {
            let pem = fs::read(bundle.as_std_path())
                .map_err(|err| MirrorError::Filesystem(format!("read CA bundle {bundle}: {err}")))?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|err| MirrorError::CatalogHttp(err.to_string()))?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|err| MirrorError::CatalogHttp(err.to_string()))?;

        Ok(Self { client, base_url })
    }
}

impl CatalogClient for FigshareHttpClient {
    fn fetch_catalog(&self, article: &ArticleId) -> Result<Vec<CatalogEntry>, MirrorError> {
        let url = format!("{}/articles/{}", self.base_url, article);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| MirrorError::CatalogHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "figshare request failed".to_string());
            return Err(MirrorError::CatalogStatus { status, message });
        }
        let listing: ArticleResponse = response
            .json()
            .map_err(|err| MirrorError::CatalogHttp(err.to_string()))?;
        Ok(listing.files)
    }
}

#[derive(Debug, Deserialize)]
struct ArticleResponse {
    #[serde(default)]
    files: Vec<CatalogEntry>,
}
