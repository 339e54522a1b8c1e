use std::fs::File;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{info, warn};

use crate::domain::DownloadTask;
use crate::error::MirrorError;

/// Fixed-delay retry policy for single-file downloads. Every failure is
/// retried, transient or not; the only differentiation is the log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::DEFAULT_MAX_DOWNLOAD_ATTEMPTS,
            retry_delay: Duration::from_secs(crate::config::DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

/// Streams one remote file to disk. Holds no shared state: each worker
/// constructs its own downloader.
pub struct HttpDownloader {
    client: Client,
    policy: RetryPolicy,
}

impl HttpDownloader {
    pub fn new(policy: RetryPolicy, ca_bundle: Option<&Utf8Path>) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("figmirror/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MirrorError::DownloadHttp(err.to_string()))?,
        );

        // No overall request timeout: archive bodies can stream for a long
        // time and the retry loop owns failure handling.
        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30));
        if let Some(bundle) = ca_bundle {
            let pem = std::fs::read(bundle.as_std_path())
                .map_err(|err| MirrorError::Filesystem(format!("read CA bundle {bundle}: {err}")))?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|err| MirrorError::DownloadHttp(err.to_string()))?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|err| MirrorError::DownloadHttp(err.to_string()))?;

        Ok(Self { client, policy })
    }

    /// Download `task.source_url` to `task.destination`, retrying up to the
    /// policy ceiling with a fixed delay between attempts. Returns the
    /// destination path on success and `DownloadExhausted` once every
    /// attempt has failed.
    pub fn fetch(&self, task: &DownloadTask) -> Result<Utf8PathBuf, MirrorError> {
        let mut attempt = 0usize;
        loop {
            match self.try_once(task) {
                Ok(received) => {
                    info!(
                        url = task.source_url.as_str(),
                        bytes = received,
                        "download complete"
                    );
                    return Ok(task.destination.clone());
                }
                Err(err) => {
                    attempt += 1;
                    match &err {
                        AttemptError::Interrupted(message) => warn!(
                            url = task.source_url.as_str(),
                            attempt,
                            "connection error occurred: {message}; retrying in {}s",
                            self.policy.retry_delay.as_secs()
                        ),
                        AttemptError::Other(message) => warn!(
                            url = task.source_url.as_str(),
                            attempt,
                            "an unexpected error occurred: {message}; retrying in {}s",
                            self.policy.retry_delay.as_secs()
                        ),
                    }
                    if attempt >= self.policy.max_attempts {
                        warn!(
                            url = task.source_url.as_str(),
                            attempts = attempt,
                            "giving up on download"
                        );
                        return Err(MirrorError::DownloadExhausted {
                            url: task.source_url.clone(),
                            attempts: attempt,
                        });
                    }
                    thread::sleep(self.policy.retry_delay);
                }
            }
        }
    }

    fn try_once(&self, task: &DownloadTask) -> Result<u64, AttemptError> {
        let mut response = self
            .client
            .get(&task.source_url)
            .send()
            .map_err(classify_reqwest)?;
        if !response.status().is_success() {
            return Err(AttemptError::Other(format!(
                "server returned status {}",
                response.status().as_u16()
            )));
        }

        // The declared length is logged for operators but never enforced; a
        // truncated body that ends cleanly still counts as success.
        let declared = response.content_length();
        let started = Instant::now();
        let mut file = File::create(task.destination.as_std_path())
            .map_err(|err| AttemptError::Other(format!("create {}: {err}", task.destination)))?;
        let received = io::copy(&mut response, &mut file).map_err(classify_io)?;
        info!(
            url = task.source_url.as_str(),
            declared = declared.unwrap_or(0),
            received,
            elapsed_secs = started.elapsed().as_secs(),
            "download attempt finished"
        );
        Ok(received)
    }
}

enum AttemptError {
    /// The transfer started and was cut short mid-stream.
    Interrupted(String),
    Other(String),
}

fn classify_reqwest(err: reqwest::Error) -> AttemptError {
    if err.is_body() || err.is_timeout() {
        AttemptError::Interrupted(err.to_string())
    } else {
        AttemptError::Other(err.to_string())
    }
}

fn classify_io(err: io::Error) -> AttemptError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => AttemptError::Interrupted(err.to_string()),
        _ => AttemptError::Other(err.to_string()),
    }
}
