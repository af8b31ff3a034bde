use tracing::{debug, info, warn};

use super::SkillCatalog;
use crate::config::ReconcileMode;
use crate::error::{CatalogError, Result};
use crate::index::fingerprint;
use crate::store::SkillRecord;
use crate::traits::IndexMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    InSync,
    Rebuilt {
        indexed_before: usize,
        indexed_after: usize,
    },
}

fn indexed_text<'a>(name: &'a str, record: &'a SkillRecord) -> &'a str {
    if record.description.is_empty() {
        name
    } else {
        &record.description
    }
}

impl SkillCatalog {
    /// Rebuilds the whole index from the record map if the two disagree.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let indexed = self.index.count().await.map_err(CatalogError::external)?;
        let mut diverged = indexed != self.skills.len();

        if !diverged && self.config.reconcile == ReconcileMode::Checksum {
            let expected = fingerprint(
                self.skills
                    .iter()
                    .map(|(name, record)| (name.as_str(), indexed_text(name, record))),
            );
            let actual = self
                .index
                .fingerprint()
                .await
                .map_err(CatalogError::external)?;
            diverged = actual != expected;
        }

        if !diverged {
            debug!(skills = self.skills.len(), "Index in sync with skill records");
            return Ok(ReconcileOutcome::InSync);
        }

        warn!(
            indexed,
            records = self.skills.len(),
            "Index diverged from skill records, rebuilding"
        );

        let ids = self.index.ids().await.map_err(CatalogError::external)?;
        if !ids.is_empty() {
            self.index
                .delete(&ids)
                .await
                .map_err(CatalogError::external)?;
        }

        for (name, record) in &self.skills {
            self.index
                .add(
                    name,
                    indexed_text(name, record),
                    IndexMetadata {
                        name: name.clone(),
                        created_by: record.created_by.clone(),
                    },
                )
                .await
                .map_err(CatalogError::external)?;
        }

        let indexed_after = self.index.count().await.map_err(CatalogError::external)?;
        info!(skills = indexed_after, "Index rebuilt from skill records");

        Ok(ReconcileOutcome::Rebuilt {
            indexed_before: indexed,
            indexed_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use crate::testing::{CommentDescriber, index_at, open_catalog, skill_code};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn seeded(tmp: &TempDir) {
        let mut catalog = open_catalog(tmp.path(), "a").await;
        catalog
            .add_skill("t", "chopTree", &skill_code("chopTree", "chop wood"))
            .await
            .unwrap();
        catalog
            .add_skill("t", "mineIron", &skill_code("mineIron", "mine iron"))
            .await
            .unwrap();
    }

    async fn open_with(tmp: &TempDir, mode: ReconcileMode) -> SkillCatalog {
        let mut config = CatalogConfig::new(tmp.path()).with_writer("a", "A");
        config.reconcile = mode;
        SkillCatalog::open(
            config,
            Arc::new(CommentDescriber),
            index_at(tmp.path()).await,
            Vec::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn consistent_catalog_is_in_sync() {
        let tmp = TempDir::new().unwrap();
        seeded(&tmp).await;

        let catalog = open_with(&tmp, ReconcileMode::Checksum).await;
        assert_eq!(catalog.reconcile().await.unwrap(), ReconcileOutcome::InSync);
    }

    #[tokio::test]
    async fn lost_index_is_rebuilt_on_open() {
        let tmp = TempDir::new().unwrap();
        seeded(&tmp).await;
        std::fs::remove_file(tmp.path().join("vectordb/index.json")).unwrap();

        let catalog = open_with(&tmp, ReconcileMode::Count).await;
        assert_eq!(catalog.index.count().await.unwrap(), 2);
        assert_eq!(catalog.search("wood").await.unwrap()[0].name, "chopTree");
    }

    #[tokio::test]
    async fn extra_index_entries_are_dropped() {
        let tmp = TempDir::new().unwrap();
        seeded(&tmp).await;
        let catalog = open_with(&tmp, ReconcileMode::Count).await;
        catalog
            .index
            .add(
                "ghost",
                "ghost",
                IndexMetadata {
                    name: "ghost".into(),
                    created_by: "b".into(),
                },
            )
            .await
            .unwrap();

        let outcome = catalog.reconcile().await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Rebuilt {
                indexed_before: 3,
                indexed_after: 2
            }
        );
        let mut ids = catalog.index.ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["chopTree", "mineIron"]);
    }

    #[tokio::test]
    async fn same_count_divergence_needs_checksum_mode() {
        let tmp = TempDir::new().unwrap();
        seeded(&tmp).await;

        let count_only = open_with(&tmp, ReconcileMode::Count).await;
        count_only.index.delete(&["mineIron".to_string()]).await.unwrap();
        count_only
            .index
            .add(
                "stale",
                "stale text",
                IndexMetadata {
                    name: "stale".into(),
                    created_by: "a".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(count_only.reconcile().await.unwrap(), ReconcileOutcome::InSync);
        drop(count_only);

        let checksum = open_with(&tmp, ReconcileMode::Checksum).await;
        let mut ids = checksum.index.ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["chopTree", "mineIron"]);
        assert_eq!(checksum.reconcile().await.unwrap(), ReconcileOutcome::InSync);
    }
}
