use async_trait::async_trait;

/// Produces a natural-language summary of a skill's code.
///
/// The returned text is the bare summary; the catalog wraps it in the
/// skill stub before storing and embedding it.
#[async_trait]
pub trait SkillDescriber: Send + Sync {
    async fn describe(&self, entry_point: &str, code: &str) -> anyhow::Result<String>;
}
