//! Error types for catalog operations

use std::path::PathBuf;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Description generator, embedder or index backend failed
    #[error("External dependency error: {0}")]
    ExternalDependency(String),

    /// Entry-point name cannot be used as an artifact file name
    #[error("Invalid skill name: {0:?}")]
    InvalidName(String),

    /// Record document is not a JSON object of records
    #[error("Invalid record document {}: {reason}", path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    /// Mutation attempted through a store opened for reading only
    #[error("Store at {} is open read-only", .0.display())]
    ReadOnly(PathBuf),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn external(err: anyhow::Error) -> Self {
        CatalogError::ExternalDependency(format!("{err:#}"))
    }

    pub fn is_external(&self) -> bool {
        matches!(self, CatalogError::ExternalDependency(_))
    }
}
