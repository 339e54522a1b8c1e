use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::MirrorError;
use crate::pool;

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// When the directory an archive would extract to already exists, skip
    /// decompression but still delete the archive. This mirrors the
    /// historical behavior of the transfer scripts; set to `false` to
    /// re-extract unconditionally.
    pub skip_existing: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { skip_existing: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    Extracted,
    SkippedExisting,
}

/// Archive name with everything from the first dot onward removed:
/// `002-001.tar.gz` -> `002-001`. The same rule namespaces blobs.
pub fn archive_stem(file_name: &str) -> &str {
    match file_name.find('.') {
        Some(index) => &file_name[..index],
        None => file_name,
    }
}

fn is_supported(file_name: &str) -> bool {
    file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") || file_name.ends_with(".zip")
}

/// Decompress `archive_path` into `target_dir`, then delete the archive.
///
/// If the target directory derived from the archive name already exists and
/// `options.skip_existing` is set, extraction is skipped while the archive is
/// still deleted. On extraction failure the archive is left in place for
/// inspection. There is no rollback of a partially populated target.
pub fn extract_archive(
    archive_path: &Path,
    target_dir: &Path,
    options: ExtractOptions,
) -> Result<ExtractOutcome, MirrorError> {
    let file_name = archive_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            MirrorError::Archive(format!("invalid archive path {}", archive_path.display()))
        })?;
    if !is_supported(file_name) {
        return Err(MirrorError::UnsupportedArchive(file_name.to_string()));
    }

    let extracted_dir = target_dir.join(archive_stem(file_name));
    let outcome = if options.skip_existing && extracted_dir.exists() {
        debug!(
            archive = file_name,
            dir = %extracted_dir.display(),
            "extraction target already exists; skipping"
        );
        ExtractOutcome::SkippedExisting
    } else {
        info!(archive = file_name, "extracting");
        if file_name.ends_with(".zip") {
            extract_zip(archive_path, target_dir)?;
        } else {
            extract_tar_gz(archive_path, target_dir)?;
        }
        ExtractOutcome::Extracted
    };

    debug!(archive = file_name, "deleting archive");
    fs::remove_file(archive_path).map_err(|err| {
        MirrorError::Filesystem(format!("remove {}: {err}", archive_path.display()))
    })?;
    Ok(outcome)
}

fn extract_tar_gz(archive_path: &Path, target_dir: &Path) -> Result<(), MirrorError> {
    let file = fs::File::open(archive_path).map_err(|err| {
        MirrorError::Archive(format!("open archive {}: {err}", archive_path.display()))
    })?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive
        .unpack(target_dir)
        .map_err(|err| MirrorError::Archive(err.to_string()))
}

fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), MirrorError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| MirrorError::Archive(format!("open archive {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| MirrorError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| MirrorError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(MirrorError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| MirrorError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct ExtractReport {
    pub file_name: String,
    pub result: Result<ExtractOutcome, MirrorError>,
}

/// Extract every supported archive directly under `dir` using a bounded
/// worker pool. Reports are returned in directory-listing order; individual
/// failures do not stop the batch.
pub fn extract_all(
    dir: &Path,
    workers: usize,
    options: ExtractOptions,
) -> Result<Vec<ExtractReport>, MirrorError> {
    let mut archives: Vec<PathBuf> = Vec::new();
    let entries =
        fs::read_dir(dir).map_err(|err| MirrorError::Filesystem(format!("read {}: {err}", dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        let path = entry.path();
        let supported = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_supported);
        if path.is_file() && supported {
            archives.push(path);
        }
    }
    archives.sort();

    let target_dir = dir.to_path_buf();
    let reports = pool::map_bounded(workers, archives, |path| {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        ExtractReport {
            file_name,
            result: extract_archive(&path, &target_dir, options),
        }
    });
    Ok(reports)
}
