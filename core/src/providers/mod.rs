pub mod factory;
pub mod ollama;
pub mod openai;

pub use factory::{create_embedder, create_provider};
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
