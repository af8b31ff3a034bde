use std::path::Path;

use tokio::fs;
use tracing::debug;

use crate::error::Result;
use crate::store::ArtifactKind;

/// Loads the base capability set: every code file in `dir`, ordered by file
/// name. A missing directory yields an empty set.
pub async fn load_primitives(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %dir.display(), "No primitives directory");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|ext| ext == ArtifactKind::Code.extension())
        {
            paths.push(path);
        }
    }
    paths.sort();

    let mut primitives = Vec::with_capacity(paths.len());
    for path in &paths {
        primitives.push(fs::read_to_string(path).await?);
    }
    debug!(count = primitives.len(), path = %dir.display(), "Loaded primitives");
    Ok(primitives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn loads_code_files_in_name_order() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("mineBlock.js"), "mine").unwrap();
        std::fs::write(tmp.path().join("craftItem.js"), "craft").unwrap();
        std::fs::write(tmp.path().join("README.md"), "ignored").unwrap();

        let primitives = load_primitives(tmp.path()).await.unwrap();
        assert_eq!(primitives, vec!["craft", "mine"]);
    }

    #[tokio::test]
    async fn missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let primitives = load_primitives(&tmp.path().join("nope")).await.unwrap();
        assert!(primitives.is_empty());
    }
}
