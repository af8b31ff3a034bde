use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{cosine_similarity, fingerprint};
use crate::store::write_atomic;
use crate::traits::{Embedder, IndexHit, IndexMetadata, VectorIndex};

const INDEX_FILE: &str = "index.json";
pub const DEFAULT_COLLECTION: &str = "shared_skill_vectordb";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: String,
    text: String,
    metadata: IndexMetadata,
    embedding: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDocument {
    collection: String,
    embedder: String,
    entries: Vec<StoredEntry>,
}

/// Brute-force cosine index persisted as a single JSON file.
pub struct LocalVectorIndex {
    path: PathBuf,
    collection: String,
    embedder: Arc<dyn Embedder>,
    entries: Mutex<Vec<StoredEntry>>,
}

impl LocalVectorIndex {
    pub async fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create index directory {}", dir.display()))?;
        let path = dir.join(INDEX_FILE);

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<IndexDocument>(&content) {
                Ok(doc) => {
                    if doc.embedder != embedder.name() {
                        warn!(
                            stored = %doc.embedder,
                            current = embedder.name(),
                            "Index was built with a different embedder, discarding it"
                        );
                        Vec::new()
                    } else {
                        doc.entries
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable index, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        Ok(Self {
            path,
            collection: DEFAULT_COLLECTION.to_string(),
            embedder,
            entries: Mutex::new(entries),
        })
    }

    async fn save(&self, entries: &[StoredEntry]) -> Result<()> {
        let doc = IndexDocument {
            collection: self.collection.clone(),
            embedder: self.embedder.name().to_string(),
            entries: entries.to_vec(),
        };
        write_atomic(&self.path, &serde_json::to_string(&doc)?)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    fn name(&self) -> &str {
        "local"
    }

    async fn add(&self, id: &str, text: &str, metadata: IndexMetadata) -> Result<()> {
        let embedding = self
            .embedder
            .embed(text)
            .await
            .with_context(|| format!("Failed to embed description of '{id}'"))?;

        let mut entries = self.entries.lock().await;
        entries.retain(|e| e.id != id);
        entries.push(StoredEntry {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
            embedding,
        });
        self.save(&entries).await?;
        debug!(id, count = entries.len(), "Indexed skill");
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| !ids.contains(&e.id));
        if entries.len() != before {
            self.save(&entries).await?;
        }
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        if k == 0 || self.entries.lock().await.is_empty() {
            return Ok(Vec::new());
        }

        let query = self
            .embedder
            .embed(text)
            .await
            .context("Failed to embed retrieval query")?;

        let entries = self.entries.lock().await;
        let mut hits: Vec<IndexHit> = entries
            .iter()
            .filter_map(|entry| match cosine_similarity(&query, &entry.embedding) {
                Some(score) => Some(IndexHit {
                    id: entry.id.clone(),
                    score,
                    metadata: entry.metadata.clone(),
                }),
                None if entry.embedding.len() != query.len() => {
                    warn!(id = %entry.id, "Embedding dimension mismatch, skipping entry");
                    None
                }
                None => Some(IndexHit {
                    id: entry.id.clone(),
                    score: 0.0,
                    metadata: entry.metadata.clone(),
                }),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.lock().await.len())
    }

    async fn ids(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().await.iter().map(|e| e.id.clone()).collect())
    }

    async fn fingerprint(&self) -> Result<String> {
        let entries = self.entries.lock().await;
        Ok(fingerprint(
            entries.iter().map(|e| (e.id.as_str(), e.text.as_str())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, KeywordEmbedder};
    use tempfile::TempDir;

    fn meta(name: &str) -> IndexMetadata {
        IndexMetadata {
            name: name.to_string(),
            created_by: "a".to_string(),
        }
    }

    async fn open(dir: &Path) -> LocalVectorIndex {
        LocalVectorIndex::open(dir, Arc::new(KeywordEmbedder::default()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn add_replaces_existing_id() {
        let tmp = TempDir::new().unwrap();
        let index = open(tmp.path()).await;

        index.add("chopTree", "chop wood", meta("chopTree")).await.unwrap();
        index.add("chopTree", "chop more wood", meta("chopTree")).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_ranks_best_first() {
        let tmp = TempDir::new().unwrap();
        let index = open(tmp.path()).await;

        index.add("mineIron", "mine iron ore", meta("mineIron")).await.unwrap();
        index.add("chopTree", "chop wood logs", meta("chopTree")).await.unwrap();
        index.add("smelt", "smelt iron in furnace", meta("smelt")).await.unwrap();

        let hits = index.query("wood", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "chopTree");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn ties_break_by_id() {
        let tmp = TempDir::new().unwrap();
        let index = open(tmp.path()).await;

        index.add("b", "same text", meta("b")).await.unwrap();
        index.add("a", "same text", meta("a")).await.unwrap();

        let hits = index.query("same text", 2).await.unwrap();
        assert_eq!(
            hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[tokio::test]
    async fn delete_ignores_absent_ids() {
        let tmp = TempDir::new().unwrap();
        let index = open(tmp.path()).await;
        index.add("a", "text", meta("a")).await.unwrap();

        index
            .delete(&["missing".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        index.delete(&["a".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let index = open(tmp.path()).await;
            index.add("a", "alpha", meta("a")).await.unwrap();
            index.add("b", "beta", meta("b")).await.unwrap();
        }
        let index = open(tmp.path()).await;
        assert_eq!(index.count().await.unwrap(), 2);
        assert_eq!(
            index.fingerprint().await.unwrap(),
            fingerprint([("a", "alpha"), ("b", "beta")])
        );
    }

    #[tokio::test]
    async fn corrupt_index_starts_empty() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(INDEX_FILE), "not json").unwrap();
        let index = open(tmp.path()).await;
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_index_query_skips_embedding() {
        let tmp = TempDir::new().unwrap();
        let index = LocalVectorIndex::open(tmp.path(), Arc::new(FailingEmbedder))
            .await
            .unwrap();
        assert!(index.query("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedder_failure_surfaces() {
        let tmp = TempDir::new().unwrap();
        let index = LocalVectorIndex::open(tmp.path(), Arc::new(FailingEmbedder))
            .await
            .unwrap();
        assert!(index.add("a", "text", meta("a")).await.is_err());
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
