pub mod describer;
pub mod embedder;
pub mod index;
pub mod provider;

pub use describer::SkillDescriber;
pub use embedder::Embedder;
pub use index::{IndexHit, IndexMetadata, VectorIndex};
pub use provider::{ChatMessage, ChatRequest, ChatResponse, Provider};
