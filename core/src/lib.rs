pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod providers;
pub mod store;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{
    AddedSkill, CatalogStats, LlmDescriber, MigrationReport, ReconcileOutcome, SkillCatalog,
    SkillHit, load_primitives,
};
pub use config::*;
pub use error::{CatalogError, Result};
pub use index::LocalVectorIndex;
pub use providers::*;
pub use store::{ArtifactKind, RecordStore, SkillMap, SkillRecord};
pub use traits::*;
