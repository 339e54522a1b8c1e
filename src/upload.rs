use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use tracing::debug;

use crate::blob::BlobStore;
use crate::error::MirrorError;

/// Upload every regular file under `local_root` to `{prefix}/{relative_path}`
/// and return the number of objects written. Files are visited in sorted
/// order; the first failure aborts the walk and already-written objects stay
/// in place.
pub fn upload_tree(
    store: &dyn BlobStore,
    local_root: &Path,
    prefix: &str,
) -> Result<usize, MirrorError> {
    let mut files = Vec::new();
    collect_files(local_root, &mut files)?;
    files.sort();

    let mut uploaded = 0usize;
    for path in files {
        let relative = path
            .strip_prefix(local_root)
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        let relative = Utf8Path::from_path(relative).ok_or_else(|| {
            MirrorError::Filesystem(format!("non-utf8 file path {}", relative.display()))
        })?;
        let key = format!("{prefix}/{relative}");
        debug!(key = key.as_str(), "uploading blob");
        store.put_file(&key, &path)?;
        uploaded += 1;
    }
    Ok(uploaded)
}

fn collect_files(root: &Path, files: &mut Vec<PathBuf>) -> Result<(), MirrorError> {
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir)
            .map_err(|err| MirrorError::Filesystem(format!("read {}: {err}", dir.display())))?;
        for entry in entries {
            let entry = entry.map_err(|err| MirrorError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    Ok(())
}
