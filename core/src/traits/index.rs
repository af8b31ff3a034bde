use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMetadata {
    pub name: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub score: f32,
    pub metadata: IndexMetadata,
}

/// Nearest-neighbour index over skill descriptions, keyed by bare skill name.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Inserts the entry, replacing any existing entry under `id`.
    async fn add(&self, id: &str, text: &str, metadata: IndexMetadata) -> anyhow::Result<()>;

    /// Removes entries by id; absent ids are ignored.
    async fn delete(&self, ids: &[String]) -> anyhow::Result<()>;

    /// Returns up to `k` entries ordered best-first.
    async fn query(&self, text: &str, k: usize) -> anyhow::Result<Vec<IndexHit>>;

    async fn count(&self) -> anyhow::Result<usize>;

    async fn ids(&self) -> anyhow::Result<Vec<String>>;

    /// Fingerprint over the indexed `(id, text)` pairs, comparable with
    /// [`crate::index::fingerprint`] computed over the record map.
    async fn fingerprint(&self) -> anyhow::Result<String>;
}
