use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use tracing::{error, info};

use crate::archive::{self, ExtractOptions};
use crate::blob::StoreFactory;
use crate::domain::{CatalogEntry, DownloadTask, PipelineOutcome, PipelineReport};
use crate::download::{HttpDownloader, RetryPolicy};
use crate::error::MirrorError;
use crate::upload;

/// Everything a worker needs to run one pipeline; connection handles are NOT
/// part of it: each invocation builds its own through the factory.
#[derive(Clone)]
pub struct PipelineSettings {
    pub base_prefix: String,
    pub retry: RetryPolicy,
    pub ca_bundle: Option<Utf8PathBuf>,
    pub extract: ExtractOptions,
}

/// Run download -> extract -> upload for one catalog entry inside a scratch
/// directory that is removed on every exit path.
///
/// This is the sole failure-absorption boundary: whatever goes wrong below
/// it is logged and folded into `PipelineOutcome::Failed` so the rest of the
/// batch keeps going. Objects already uploaded before a failure stay in
/// place.
pub fn mirror_file(
    entry: &CatalogEntry,
    factory: &dyn StoreFactory,
    settings: &PipelineSettings,
) -> PipelineReport {
    let outcome = match transfer(entry, factory, settings) {
        Ok(uploaded) => PipelineOutcome::Uploaded(uploaded),
        Err(err) => {
            error!(
                file = entry.name.as_str(),
                error = %err,
                "transfer pipeline failed; partial uploads are left in place"
            );
            PipelineOutcome::Failed
        }
    };
    PipelineReport {
        file_name: entry.name.clone(),
        outcome,
    }
}

fn transfer(
    entry: &CatalogEntry,
    factory: &dyn StoreFactory,
    settings: &PipelineSettings,
) -> Result<usize, MirrorError> {
    let store = factory.connect()?;
    let downloader = HttpDownloader::new(settings.retry, settings.ca_bundle.as_deref())?;

    let scratch = tempfile::Builder::new()
        .prefix("figmirror")
        .tempdir()
        .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
    let destination = Utf8PathBuf::from_path_buf(scratch.path().join(&entry.name))
        .map_err(|_| MirrorError::Filesystem("non-utf8 scratch path".to_string()))?;

    let total_start = Instant::now();

    let download_start = Instant::now();
    let archive_path = downloader.fetch(&DownloadTask {
        source_url: entry.download_url.clone(),
        destination,
    })?;
    info!(
        file = entry.name.as_str(),
        "downloading took {}",
        fmt_duration(download_start.elapsed())
    );

    let extract_start = Instant::now();
    archive::extract_archive(archive_path.as_std_path(), scratch.path(), settings.extract)?;
    info!(
        file = entry.name.as_str(),
        "extracting took {}",
        fmt_duration(extract_start.elapsed())
    );

    let upload_start = Instant::now();
    let uploaded = upload::upload_tree(store.as_ref(), scratch.path(), &settings.base_prefix)?;
    info!(
        file = entry.name.as_str(),
        blobs = uploaded,
        "uploading took {}",
        fmt_duration(upload_start.elapsed())
    );

    info!(
        file = entry.name.as_str(),
        "total transfer took {}",
        fmt_duration(total_start.elapsed())
    );
    Ok(uploaded)
}

fn fmt_duration(elapsed: Duration) -> String {
    let minutes = elapsed.as_secs() / 60;
    let seconds = elapsed.as_secs_f64() - (minutes * 60) as f64;
    format!("{minutes}m {seconds:.2}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(fmt_duration(Duration::from_secs(0)), "0m 0.00s");
        assert_eq!(fmt_duration(Duration::from_millis(65_500)), "1m 5.50s");
        assert_eq!(fmt_duration(Duration::from_secs(3600)), "60m 0.00s");
    }
}
