use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const SKILLVAULT_DIR: &str = ".skillvault";

pub const DEFAULT_EXCLUDED_TASK: &str = "Deposit useless items into the chest at";

/// How startup reconciliation decides the index has diverged from the record map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Entry count only.
    Count,
    /// Entry count plus a fingerprint over ids and description text.
    #[default]
    Checksum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub root_dir: PathBuf,
    pub retrieval_top_k: usize,
    pub resume: bool,
    pub writer_id: String,
    pub writer_name: String,
    pub exclude_task_prefixes: Vec<String>,
    pub lock_persist: bool,
    pub reconcile: ReconcileMode,
    pub primitives_dir: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            root_dir: get_skillvault_dir().join("shared_skills"),
            retrieval_top_k: 5,
            resume: true,
            writer_id: "bot".to_string(),
            writer_name: "Bot".to_string(),
            exclude_task_prefixes: vec![DEFAULT_EXCLUDED_TASK.to_string()],
            lock_persist: false,
            reconcile: ReconcileMode::default(),
            primitives_dir: None,
        }
    }
}

impl CatalogConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_writer(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.writer_id = id.into();
        self.writer_name = name.into();
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.retrieval_top_k = k;
        self
    }

    pub fn is_excluded(&self, task: &str) -> bool {
        self.exclude_task_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && task.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub embedding: EmbeddingConfig,
    pub catalog: CatalogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            embedding: EmbeddingConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

pub fn get_skillvault_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(SKILLVAULT_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_skillvault_dir().join("config.toml")
}

pub fn ensure_skillvault_dir() -> Result<PathBuf> {
    let dir = get_skillvault_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).with_context(|| {
            format!("Failed to create skillvault directory at {}", dir.display())
        })?;
    }

    Ok(dir)
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path();

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!("Config file not found. Run 'skillvault init' to create one.")
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    parse_config(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_skillvault_dir()?;

    let config_path = get_config_path();
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let config = parse_config(
            r#"
            model = "llama3.2"

            [catalog]
            root_dir = "/tmp/skills"
            writer_id = "bot-2"
            reconcile = "count"
            "#,
        )
        .unwrap();

        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.catalog.root_dir, PathBuf::from("/tmp/skills"));
        assert_eq!(config.catalog.writer_id, "bot-2");
        assert_eq!(config.catalog.writer_name, "Bot");
        assert_eq!(config.catalog.retrieval_top_k, 5);
        assert_eq!(config.catalog.reconcile, ReconcileMode::Count);
        assert!(config.catalog.resume);
    }

    #[test]
    fn exclusion_matches_prefix_only() {
        let config = CatalogConfig::new("/tmp/skills");
        assert!(config.is_excluded("Deposit useless items into the chest at (1, 2, 3)"));
        assert!(!config.is_excluded("Mine 3 iron ore"));
        assert!(!config.is_excluded("Please Deposit useless items into the chest at x"));
    }

    #[test]
    fn empty_prefix_excludes_nothing() {
        let mut config = CatalogConfig::new("/tmp/skills");
        config.exclude_task_prefixes = vec![String::new()];
        assert!(!config.is_excluded("anything"));
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = parse_config(&text).unwrap();
        assert_eq!(parsed.catalog.exclude_task_prefixes, config.catalog.exclude_task_prefixes);
        assert_eq!(parsed.model, config.model);
    }
}
