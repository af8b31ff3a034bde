use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{CatalogError, Result};

/// Advisory cross-process lock held around a document persist.
///
/// Only cooperating processes that also take the lock are serialized; it
/// does not merge concurrent read-modify-write cycles.
#[derive(Debug, Clone)]
pub struct PersistLock {
    path: PathBuf,
}

pub struct PersistGuard {
    file: File,
}

impl PersistLock {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join("skills.lock"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn acquire(&self) -> Result<PersistGuard> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<PersistGuard> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            file.lock_exclusive().map_err(|e| {
                CatalogError::Lock(format!("{}: {}", path.display(), e))
            })?;
            Ok(PersistGuard { file })
        })
        .await
        .map_err(|e| CatalogError::Lock(e.to_string()))?
    }
}

impl Drop for PersistGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, "Failed to release persist lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lock_is_reacquirable_after_drop() {
        let tmp = TempDir::new().unwrap();
        let lock = PersistLock::new(tmp.path());

        let guard = lock.acquire().await.unwrap();
        assert!(lock.path().exists());
        drop(guard);

        let _again = lock.acquire().await.unwrap();
    }
}
