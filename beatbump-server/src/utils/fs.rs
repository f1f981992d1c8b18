//! Filesystem helpers shared across modules.
//!
//! These helpers provide consistent error context (operation + path) and
//! reduce duplicated `create_dir_all` / disk-space-probe boilerplate.

use std::path::Path;

use crate::error::{Error, Result};

/// Convert an IO error into an application error with operation + path context.
pub fn io_error(op: &'static str, path: &Path, source: std::io::Error) -> Error {
    Error::Io(std::io::Error::new(
        source.kind(),
        format!("{op} at {}: {source}", path.display()),
    ))
}

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| io_error("creating directory", path, e))
}

/// Ensure a directory exists, creating it (recursively) if needed. Synchronous
/// variant for call sites outside the async runtime (logging setup runs before
/// other services are wired up).
pub fn ensure_dir_all_sync(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| io_error("creating directory", path, e))
}

/// Available bytes on the filesystem backing `path`.
///
/// Mirrors the original service's `GetFreeDiskSpace` (a `statfs` call on the
/// target directory); an inaccessible path is treated as zero free space so
/// the caller fails closed rather than silently skipping the check.
pub fn free_space_bytes(path: &Path) -> Result<u64> {
    fs4::available_space(path).map_err(|e| io_error("checking free disk space", path, e))
}

/// Best-effort removal of a file; missing files are not an error.
pub async fn remove_file_best_effort(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
    }
}

/// Best-effort recursive removal of a directory; missing directories are not an error.
pub async fn remove_dir_all_best_effort(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_dir_all_creates_nested_path() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        ensure_dir_all(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn free_space_bytes_reports_nonzero_for_tempdir() {
        let tmp = tempfile::tempdir().unwrap();
        let free = free_space_bytes(tmp.path()).unwrap();
        assert!(free > 0);
    }
}
