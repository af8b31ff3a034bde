use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use tokio::fs;
use tracing::{info, warn};

use super::SkillCatalog;
use crate::error::{CatalogError, Result};
use crate::store::{ArtifactKind, DOCUMENT_FILE, SkillRecord, is_unsafe_skill_name};
use crate::traits::IndexMetadata;

pub const LEGACY_WRITER: &str = "legacy";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyEntry {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn legacy_artifact(source: &Path, kind: ArtifactKind, name: &str) -> std::path::PathBuf {
    source
        .join(kind.dir_name())
        .join(format!("{name}.{}", kind.extension()))
}

/// Reads a single-writer skill directory: its document if present, else the
/// code and description files.
async fn read_legacy(source: &Path) -> Result<IndexMap<String, LegacyEntry>> {
    let document = source.join(DOCUMENT_FILE);
    if let Some(content) = read_optional(&document).await? {
        return serde_json::from_str(&content).map_err(|e| CatalogError::InvalidDocument {
            path: document,
            reason: e.to_string(),
        });
    }

    let code_dir = source.join(ArtifactKind::Code.dir_name());
    let mut entries = match fs::read_dir(&code_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(source = %source.display(), "Nothing to migrate");
            return Ok(IndexMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|ext| ext == ArtifactKind::Code.extension())
            && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
        {
            names.push(stem.to_string());
        }
    }
    names.sort();

    let mut skills = IndexMap::with_capacity(names.len());
    for name in names {
        let code = read_optional(&legacy_artifact(source, ArtifactKind::Code, &name))
            .await?
            .unwrap_or_default();
        let description =
            read_optional(&legacy_artifact(source, ArtifactKind::Description, &name))
                .await?
                .unwrap_or_default();
        skills.insert(name, LegacyEntry { code, description });
    }
    info!(count = skills.len(), "Reconstructed legacy skills from code files");
    Ok(skills)
}

impl SkillCatalog {
    /// Imports skills from a legacy single-writer directory, attributing them
    /// to `writer_id`. Names already in the catalog are left alone.
    pub async fn import_legacy(&mut self, source: &Path, writer_id: &str) -> Result<MigrationReport> {
        let legacy = read_legacy(source).await?;
        let writer_name = if writer_id == LEGACY_WRITER {
            "Legacy Bot"
        } else {
            writer_id
        };
        info!(source = %source.display(), writer = writer_id, "Migrating skills");

        let mut report = MigrationReport::default();
        let mut imported = Vec::new();

        for (name, entry) in legacy {
            if self.skills.contains_key(&name) {
                info!(skill = %name, "Skipping, already in catalog");
                report.skipped += 1;
                continue;
            }
            if is_unsafe_skill_name(&name) {
                warn!(skill = %name, "Skipping unsafe skill name");
                report.skipped += 1;
                continue;
            }

            for (kind, fallback) in [
                (ArtifactKind::Code, &entry.code),
                (ArtifactKind::Description, &entry.description),
            ] {
                let content = read_optional(&legacy_artifact(source, kind, &name))
                    .await?
                    .unwrap_or_else(|| fallback.clone());
                self.store.write_artifact(kind, &name, &content).await?;
            }

            let mut record = SkillRecord::new(entry.code, entry.description, writer_id, writer_name, 1);
            record.migrated_from = Some(source.display().to_string());
            self.skills.insert(name.clone(), record);
            imported.push(name);
            report.migrated += 1;
        }

        self.store.persist(&self.skills).await?;

        for name in &imported {
            let record = &self.skills[name];
            let text = if record.description.is_empty() {
                name.as_str()
            } else {
                record.description.as_str()
            };
            self.index
                .add(
                    name,
                    text,
                    IndexMetadata {
                        name: name.clone(),
                        created_by: record.created_by.clone(),
                    },
                )
                .await
                .map_err(CatalogError::external)?;
        }

        report.total = self.skills.len();
        info!(
            migrated = report.migrated,
            skipped = report.skipped,
            total = report.total,
            "Migration complete"
        );
        Ok(report)
    }
}
