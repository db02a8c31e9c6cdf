//! Filesystem helpers for job-scoped artifact directories.
//!
//! Every job owns one directory under the download root; nothing else ever
//! writes there, and eviction removes the whole tree in one call.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::MediaResult;

/// Create (if needed) and return the directory for one job's artifacts.
pub async fn ensure_job_dir(
    download_root: &Path,
    owner: &str,
    job_id: &str,
) -> MediaResult<PathBuf> {
    let dir = download_root.join(owner).join(job_id);
    fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// Remove a job directory and everything in it.
///
/// Best effort: eviction must not fail because a file vanished first.
pub async fn remove_dir_best_effort(dir: &Path) {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                dir = %dir.display(),
                "Failed to remove job directory: {}", e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_job_dir_nests_owner_and_job() {
        let root = TempDir::new().unwrap();
        let dir = ensure_job_dir(root.path(), "client1", "job1").await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(dir, root.path().join("client1").join("job1"));

        // Idempotent
        let again = ensure_job_dir(root.path(), "client1", "job1").await.unwrap();
        assert_eq!(dir, again);
    }

    #[tokio::test]
    async fn test_remove_dir_best_effort() {
        let root = TempDir::new().unwrap();
        let dir = ensure_job_dir(root.path(), "client1", "job1").await.unwrap();
        fs::write(dir.join("a.mp4"), b"x").await.unwrap();

        remove_dir_best_effort(&dir).await;
        assert!(!dir.exists());

        // Removing a directory that is already gone is a no-op
        remove_dir_best_effort(&dir).await;
    }
}
