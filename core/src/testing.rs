//! Deterministic collaborators for tests.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::catalog::SkillCatalog;
use crate::config::CatalogConfig;
use crate::index::LocalVectorIndex;
use crate::traits::{Embedder, SkillDescriber};

/// Bag-of-words embedder hashing lowercase tokens into fixed buckets.
pub struct KeywordEmbedder {
    dims: usize,
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self { dims: 256 }
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf29ce484222325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) % self.dims as u64) as usize;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding service unreachable")
    }
}

/// Keyword embedder that can be taken offline mid-test.
pub struct SwitchableEmbedder {
    inner: KeywordEmbedder,
    available: AtomicBool,
}

impl Default for SwitchableEmbedder {
    fn default() -> Self {
        Self {
            inner: KeywordEmbedder::default(),
            available: AtomicBool::new(true),
        }
    }
}

impl SwitchableEmbedder {
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embedder for SwitchableEmbedder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if !self.available.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service unreachable");
        }
        self.inner.embed(text).await
    }
}

/// Uses the first `//` comment of the code as the summary, falling back to
/// the entry point name.
pub struct CommentDescriber;

#[async_trait]
impl SkillDescriber for CommentDescriber {
    async fn describe(&self, entry_point: &str, code: &str) -> anyhow::Result<String> {
        Ok(code
            .lines()
            .find_map(|l| l.trim().strip_prefix("//"))
            .map(|c| c.trim().to_string())
            .unwrap_or_else(|| format!("Runs {entry_point}.")))
    }
}

pub struct FailingDescriber;

#[async_trait]
impl SkillDescriber for FailingDescriber {
    async fn describe(&self, _entry_point: &str, _code: &str) -> anyhow::Result<String> {
        anyhow::bail!("text generation unavailable")
    }
}

pub async fn index_at(root: &Path) -> Arc<LocalVectorIndex> {
    Arc::new(
        LocalVectorIndex::open(&root.join("vectordb"), Arc::new(KeywordEmbedder::default()))
            .await
            .unwrap(),
    )
}

pub async fn open_catalog(root: &Path, writer: &str) -> SkillCatalog {
    let config = CatalogConfig::new(root).with_writer(writer, writer.to_uppercase());
    SkillCatalog::open(config, Arc::new(CommentDescriber), index_at(root).await, Vec::new())
        .await
        .unwrap()
}

pub fn skill_code(name: &str, comment: &str) -> String {
    format!("async function {name}(bot) {{\n  // {comment}\n  await bot.wait(1);\n}}")
}
