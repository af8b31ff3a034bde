use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tracing::{debug, warn};

/// Temp files younger than this may belong to a writer that is still running.
pub const STALE_TMP_AGE: Duration = Duration::from_secs(10 * 60);

/// Replaces `path` with `content` so readers see either the old or the new
/// document, never a partial one. Each call uses its own temp file, so
/// concurrent writers never clobber each other's in-flight data.
pub async fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let target = path.to_path_buf();
    let content = content.to_owned();

    tokio::task::spawn_blocking(move || write_atomic_blocking(&target, &content))
        .await
        .map_err(std::io::Error::other)??;

    debug!(path = %path.display(), "Atomic write completed");
    Ok(())
}

fn write_atomic_blocking(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let prefix = format!(
        ".{}.",
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    if let Err(e) = tmp.as_file().sync_all() {
        warn!(error = %e, "Failed to sync temp file to disk");
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn is_tmp(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tmp")
}

/// Removes `*.tmp` leftovers in `dir` older than `max_age`. Returns the
/// removed paths.
pub async fn recover_interrupted_writes(dir: &Path, max_age: Duration) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return removed;
    };
    let now = SystemTime::now();

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !is_tmp(&path) {
            continue;
        }
        let age = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_none_or(|age| age < max_age) {
            debug!(path = %path.display(), "Leaving recent temp file alone");
            continue;
        }
        debug!(path = %path.display(), "Removing interrupted write");
        if fs::remove_file(&path).await.is_ok() {
            removed.push(path);
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn age_file(path: &Path, by: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[tokio::test]
    async fn replaces_content_without_leftovers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("skills.json");

        write_atomic(&path, "{\"a\":1}").await.unwrap();
        write_atomic(&path, "{\"b\":2}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"b\":2}");
        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writes_do_not_share_temp_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("skills.json");

        let writes = (0..8).map(|i| {
            let path = path.clone();
            tokio::spawn(async move { write_atomic(&path, &format!("{{\"n\":{i}}}")).await })
        });
        for write in writes {
            write.await.unwrap().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&content).is_ok());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn removes_only_stale_temp_files() {
        let tmp = TempDir::new().unwrap();
        let stale = tmp.path().join(".skills.json.old.tmp");
        let in_flight = tmp.path().join(".skills.json.new.tmp");
        std::fs::write(&stale, "{").unwrap();
        std::fs::write(&in_flight, "{").unwrap();
        std::fs::write(tmp.path().join("skills.json"), "{}").unwrap();
        age_file(&stale, Duration::from_secs(3600));

        let removed = recover_interrupted_writes(tmp.path(), STALE_TMP_AGE).await;

        assert_eq!(removed, vec![stale.clone()]);
        assert!(!stale.exists());
        assert!(in_flight.exists());
        assert!(tmp.path().join("skills.json").exists());
    }
}
