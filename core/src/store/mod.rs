//! Durable record store: one JSON document of current records plus
//! immutable per-version code and description artifacts.

pub mod atomic;
pub mod lock;
pub mod record;

pub use atomic::{STALE_TMP_AGE, recover_interrupted_writes, write_atomic};
pub use lock::PersistLock;
pub use record::{SkillMap, SkillRecord, is_unsafe_skill_name, parse_timestamp};

use std::path::{Path, PathBuf};

use chrono::Utc;
use indexmap::IndexMap;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};

pub const DOCUMENT_FILE: &str = "skills.json";
pub const QUARANTINE_FILE: &str = "skills.quarantine.json";
pub const INDEX_DIR: &str = "vectordb";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Code,
    Description,
}

impl ArtifactKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Description => "description",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Code => "js",
            Self::Description => "txt",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Artifact file stem for a given version: `name` for v1, `nameV{n}` after.
/// Versions start at 1, so there is no artifact for version 0.
pub fn artifact_name(name: &str, version: u32) -> Option<String> {
    match version {
        0 => None,
        1 => Some(name.to_string()),
        n => Some(format!("{name}V{n}")),
    }
}

fn versioned_name(name: &str, version: u32) -> String {
    artifact_name(name, version.max(1)).unwrap_or_else(|| name.to_string())
}

pub struct RecordStore {
    root: PathBuf,
    resume: bool,
    read_only: bool,
    lock: Option<PersistLock>,
}

impl RecordStore {
    /// Opens the store for writing: creates the layout and removes stale
    /// temp files left by interrupted writes.
    pub async fn open(config: &CatalogConfig) -> Result<Self> {
        let root = config.root_dir.clone();
        for dir in [
            ArtifactKind::Code.dir_name(),
            ArtifactKind::Description.dir_name(),
            INDEX_DIR,
        ] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        let removed = recover_interrupted_writes(&root, STALE_TMP_AGE).await;
        if !removed.is_empty() {
            info!(count = removed.len(), "Removed temp files of interrupted writes");
        }

        Ok(Self {
            lock: config.lock_persist.then(|| PersistLock::new(&root)),
            root,
            resume: config.resume,
            read_only: false,
        })
    }

    /// Opens the store without touching the directory. Invalid records are
    /// skipped on load but not quarantined, and every mutation fails with
    /// [`CatalogError::ReadOnly`].
    pub fn open_read_only(config: &CatalogConfig) -> Self {
        Self {
            root: config.root_dir.clone(),
            resume: true,
            read_only: true,
            lock: None,
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(CatalogError::ReadOnly(self.root.clone()));
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_FILE)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_DIR)
    }

    pub fn artifact_path(&self, kind: ArtifactKind, artifact: &str) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(format!("{artifact}.{}", kind.extension()))
    }

    /// Loads the current map. Records that fail validation are moved to the
    /// quarantine document instead of being defaulted.
    pub async fn load(&self) -> Result<SkillMap> {
        let path = self.document_path();
        if !self.resume || !fs::try_exists(&path).await? {
            return Ok(SkillMap::new());
        }

        info!(path = %path.display(), "Loading skill records");
        let content = fs::read_to_string(&path).await?;
        let raw: IndexMap<String, serde_json::Value> =
            serde_json::from_str(&content).map_err(|e| CatalogError::InvalidDocument {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let mut skills = SkillMap::with_capacity(raw.len());
        let mut rejected = IndexMap::new();

        for (name, value) in raw {
            match check_record(&name, value.clone()) {
                Ok(record) => {
                    skills.insert(name, record);
                }
                Err(reason) => {
                    warn!(skill = %name, %reason, "Quarantining invalid skill record");
                    rejected.insert(name, value);
                }
            }
        }

        if !rejected.is_empty() && !self.read_only {
            self.quarantine(rejected).await?;
        }

        Ok(skills)
    }

    async fn quarantine(&self, rejected: IndexMap<String, serde_json::Value>) -> Result<()> {
        let path = self.root.join(QUARANTINE_FILE);
        let mut existing: IndexMap<String, serde_json::Value> =
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(existing) => existing,
                    Err(e) => {
                        let aside = self.root.join(format!(
                            "{QUARANTINE_FILE}.corrupt-{}",
                            Utc::now().format("%Y%m%dT%H%M%S%.3f")
                        ));
                        warn!(
                            path = %path.display(),
                            moved_to = %aside.display(),
                            error = %e,
                            "Unreadable quarantine document, moving it aside"
                        );
                        fs::rename(&path, &aside).await?;
                        IndexMap::new()
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
                Err(e) => return Err(e.into()),
            };
        existing.extend(rejected);
        write_atomic(&path, &serde_json::to_string_pretty(&existing)?).await?;
        Ok(())
    }

    /// Rewrites the whole document.
    pub async fn persist(&self, skills: &SkillMap) -> Result<()> {
        self.ensure_writable()?;
        let content = serde_json::to_string_pretty(skills)?;
        let _guard = match &self.lock {
            Some(lock) => Some(lock.acquire().await?),
            None => None,
        };
        write_atomic(&self.document_path(), &content).await?;
        debug!(skills = skills.len(), "Persisted skill records");
        Ok(())
    }

    /// Creates the artifact file unless it already exists. Returns whether
    /// anything was written.
    pub async fn write_artifact(
        &self,
        kind: ArtifactKind,
        artifact: &str,
        content: &str,
    ) -> Result<bool> {
        self.ensure_writable()?;
        let path = self.artifact_path(kind, artifact);
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Artifact exists, leaving untouched");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(true)
    }

    pub async fn read_artifact(&self, kind: ArtifactKind, artifact: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.artifact_path(kind, artifact)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn artifact_exists(&self, kind: ArtifactKind, artifact: &str) -> Result<bool> {
        Ok(fs::try_exists(self.artifact_path(kind, artifact)).await?)
    }

    /// First unused `nameV{n}` code artifact, starting at 2.
    pub async fn next_version(&self, name: &str) -> Result<u32> {
        let mut version = 2;
        while self
            .artifact_exists(ArtifactKind::Code, &versioned_name(name, version))
            .await?
        {
            version += 1;
        }
        Ok(version)
    }

    /// Writes `code` to the first free code artifact at or after `version`
    /// and returns the version it landed in. Never reuses an existing file,
    /// so a writer that lost a race moves on to the next version.
    pub async fn claim_code_artifact(&self, name: &str, version: u32, code: &str) -> Result<u32> {
        let mut version = version.max(1);
        loop {
            if self
                .write_artifact(ArtifactKind::Code, &versioned_name(name, version), code)
                .await?
            {
                return Ok(version);
            }
            let next = self.next_version(name).await?;
            debug!(skill = name, taken = version, next, "Code artifact taken, moving on");
            version = next.max(version + 1);
        }
    }

    /// Versions of `name` with a code artifact on disk, ascending.
    pub async fn artifact_versions(&self, name: &str) -> Result<Vec<u32>> {
        let kind = ArtifactKind::Code;
        let mut versions = Vec::new();
        let mut entries = match fs::read_dir(self.root.join(kind.dir_name())).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|f| f.strip_suffix(kind.extension()))
                .and_then(|f| f.strip_suffix('.'))
            else {
                continue;
            };
            if stem == name {
                versions.push(1);
            } else if let Some(n) = stem
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('V'))
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n >= 2)
            {
                versions.push(n);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }
}

fn check_record(name: &str, value: serde_json::Value) -> std::result::Result<SkillRecord, String> {
    if is_unsafe_skill_name(name) {
        return Err("unsafe skill name".to_string());
    }
    let record: SkillRecord = serde_json::from_value(value).map_err(|e| e.to_string())?;
    record.validate()?;
    Ok(record)
}
