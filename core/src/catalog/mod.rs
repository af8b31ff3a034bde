//! The skill catalog: owns the record store and the vector index and keeps
//! them consistent.

pub mod describe;
pub mod migrate;
pub mod primitives;
pub mod reconcile;
pub mod stats;

pub use describe::{LlmDescriber, SKILL_PROMPT, skill_stub};
pub use migrate::MigrationReport;
pub use primitives::load_primitives;
pub use reconcile::ReconcileOutcome;
pub use stats::CatalogStats;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::store::{
    ArtifactKind, RecordStore, SkillMap, SkillRecord, artifact_name, is_unsafe_skill_name,
};
use crate::traits::{IndexMetadata, SkillDescriber, VectorIndex};

/// Outcome of a successful [`SkillCatalog::add_skill`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedSkill {
    pub name: String,
    /// File stem the code and description artifacts were written under.
    pub artifact: String,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillHit {
    pub name: String,
    pub score: f32,
    pub created_by: String,
}

pub struct SkillCatalog {
    config: CatalogConfig,
    store: RecordStore,
    index: Arc<dyn VectorIndex>,
    describer: Arc<dyn SkillDescriber>,
    primitives: Vec<String>,
    skills: SkillMap,
}

impl SkillCatalog {
    /// Loads the records under `config.root_dir` and reconciles the index
    /// against them. A failed rebuild is logged, not returned.
    pub async fn open(
        config: CatalogConfig,
        describer: Arc<dyn SkillDescriber>,
        index: Arc<dyn VectorIndex>,
        primitives: Vec<String>,
    ) -> Result<Self> {
        let store = RecordStore::open(&config).await?;
        let skills = store.load().await?;

        info!(
            skills = skills.len(),
            writer = %config.writer_id,
            index = index.name(),
            root = %config.root_dir.display(),
            "Opened skill catalog"
        );

        let catalog = Self {
            config,
            store,
            index,
            describer,
            primitives,
            skills,
        };

        if let Err(e) = catalog.reconcile().await {
            warn!(error = %e, "Index reconciliation failed, retrieval may be incomplete");
        }

        Ok(catalog)
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Stores a new skill, or a new version when `entry_point` already exists.
    ///
    /// Returns `None` when the task matches an exclusion prefix.
    pub async fn add_skill(
        &mut self,
        task: &str,
        entry_point: &str,
        code: &str,
    ) -> Result<Option<AddedSkill>> {
        if self.config.is_excluded(task) {
            debug!(task, "Task excluded from catalog");
            return Ok(None);
        }
        if is_unsafe_skill_name(entry_point) {
            return Err(CatalogError::InvalidName(entry_point.to_string()));
        }

        let summary = self
            .describer
            .describe(entry_point, code)
            .await
            .map_err(CatalogError::external)?;
        let description = skill_stub(entry_point, &summary);
        info!(writer = %self.config.writer_id, skill = entry_point, "Generated skill description");

        // The map can lag the disk, so an existing v1 artifact also forces a
        // new version.
        let known = self.skills.contains_key(entry_point);
        let on_disk = known
            || self
                .store
                .artifact_exists(ArtifactKind::Code, entry_point)
                .await?;
        let version = if on_disk {
            info!(skill = entry_point, "Skill exists, creating new version");
            if known {
                self.index
                    .delete(&[entry_point.to_string()])
                    .await
                    .map_err(CatalogError::external)?;
            }
            self.store.next_version(entry_point).await?
        } else {
            1
        };

        // Index id is the bare name so only the current version is searchable.
        self.index
            .add(
                entry_point,
                &description,
                IndexMetadata {
                    name: entry_point.to_string(),
                    created_by: self.config.writer_id.clone(),
                },
            )
            .await
            .map_err(CatalogError::external)?;

        let version = self
            .store
            .claim_code_artifact(entry_point, version, code)
            .await?;
        let artifact =
            artifact_name(entry_point, version).unwrap_or_else(|| entry_point.to_string());
        if !self
            .store
            .write_artifact(ArtifactKind::Description, &artifact, &description)
            .await?
        {
            warn!(
                skill = entry_point,
                artifact = %artifact,
                "Description artifact already present, kept as is"
            );
        }

        let record = SkillRecord::new(
            code,
            description.as_str(),
            self.config.writer_id.as_str(),
            self.config.writer_name.as_str(),
            version,
        );
        self.skills.insert(entry_point.to_string(), record);
        self.store.persist(&self.skills).await?;

        info!(
            writer = %self.config.writer_id,
            skill = entry_point,
            version,
            "Saved skill"
        );

        Ok(Some(AddedSkill {
            name: entry_point.to_string(),
            artifact,
            version,
        }))
    }

    /// Ranked matches for `query` that resolve to a current record.
    pub async fn search(&self, query: &str) -> Result<Vec<SkillHit>> {
        let indexed = self.index.count().await.map_err(CatalogError::external)?;
        let k = self.config.retrieval_top_k.min(indexed);
        if k == 0 {
            return Ok(Vec::new());
        }

        debug!(k, query = %truncate(query, 50), "Retrieving skills");
        let hits = self
            .index
            .query(query, k)
            .await
            .map_err(CatalogError::external)?;

        let found: Vec<SkillHit> = hits
            .into_iter()
            .filter_map(|hit| match self.skills.get(&hit.id) {
                Some(record) => Some(SkillHit {
                    created_by: record.created_by.clone(),
                    name: hit.id,
                    score: hit.score,
                }),
                None => {
                    debug!(id = %hit.id, "Index hit has no current record, skipping");
                    None
                }
            })
            .collect();

        debug!(
            found = %found.iter().map(|h| h.name.as_str()).collect::<Vec<_>>().join(", "),
            "Retrieved skills"
        );
        Ok(found)
    }

    /// Code of the top-k skills for `query`, best first.
    pub async fn retrieve_skills(&self, query: &str) -> Result<Vec<String>> {
        Ok(self
            .search(query)
            .await?
            .into_iter()
            .filter_map(|hit| self.skills.get(&hit.name).map(|r| r.code.clone()))
            .collect())
    }

    /// Bumps the success or failure counter. Unknown names are ignored.
    pub async fn record_result(&mut self, name: &str, success: bool) -> Result<()> {
        let Some(record) = self.skills.get_mut(name) else {
            debug!(skill = name, "No such skill, result not recorded");
            return Ok(());
        };
        if success {
            record.success_count += 1;
        } else {
            record.fail_count += 1;
        }
        self.store.persist(&self.skills).await
    }

    /// Records created by `writer`, or every record when `None`.
    pub fn get_by_writer(&self, writer: Option<&str>) -> SkillMap {
        match writer {
            None => self.skills.clone(),
            Some(writer) => self
                .skills
                .iter()
                .filter(|(_, r)| r.created_by == writer)
                .map(|(n, r)| (n.clone(), r.clone()))
                .collect(),
        }
    }

    pub fn get_stats(&self) -> CatalogStats {
        CatalogStats::from_skills(&self.skills)
    }

    /// Every current skill's code followed by the base capability set.
    pub fn programs(&self) -> String {
        let mut programs = String::new();
        for code in self
            .skills
            .values()
            .map(|r| r.code.as_str())
            .chain(self.primitives.iter().map(String::as_str))
        {
            programs.push_str(code);
            programs.push_str("\n\n");
        }
        programs
    }

    pub fn get(&self, name: &str) -> Option<&SkillRecord> {
        self.skills.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.skills.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Code of a specific version, read from its artifact file.
    pub async fn artifact_code(&self, name: &str, version: u32) -> Result<Option<String>> {
        match artifact_name(name, version) {
            Some(artifact) => self.store.read_artifact(ArtifactKind::Code, &artifact).await,
            None => Ok(None),
        }
    }

    pub async fn versions(&self, name: &str) -> Result<Vec<u32>> {
        self.store.artifact_versions(name).await
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
