use crate::config::Config;
use crate::providers::{OllamaProvider, OpenAIProvider};
use crate::traits::{Embedder, Provider};
use anyhow::{Result, anyhow};
use std::sync::Arc;

const OPENAI_KEY_VARS: &[&str] = &["OPENAI_API_KEY", "SKILLVAULT_OPENAI_API_KEY"];

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("openai");

    match provider_name.to_lowercase().as_str() {
        "ollama" => {
            let mut provider = OllamaProvider::new().with_model(config.model.clone());
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = resolve_api_key_with_fallback(OPENAI_KEY_VARS, &config.api_key)?;
            let mut provider = OpenAIProvider::new(api_key).with_model(config.model.clone());
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        _ => Err(anyhow!(
            "Unknown provider: {}. Available: openai, ollama",
            provider_name
        )),
    }
}

/// Embedding settings fall back to the chat provider's when unset.
pub fn create_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedding = &config.embedding;
    let provider_name = embedding
        .provider
        .as_deref()
        .or(config.provider.as_deref())
        .unwrap_or("openai");
    let base_url = embedding.base_url.as_ref().or(config.base_url.as_ref());

    match provider_name.to_lowercase().as_str() {
        "ollama" => {
            let mut provider = OllamaProvider::new();
            if let Some(model) = &embedding.model {
                provider = provider.with_embedding_model(model.clone());
            }
            if let Some(base_url) = base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "openai" => {
            let config_key = if embedding.api_key.is_empty() {
                &config.api_key
            } else {
                &embedding.api_key
            };
            let api_key = resolve_api_key_with_fallback(OPENAI_KEY_VARS, config_key)?;
            let mut provider = OpenAIProvider::new(api_key);
            if let Some(model) = &embedding.model {
                provider = provider.with_embedding_model(model.clone());
            }
            if let Some(base_url) = base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        _ => Err(anyhow!(
            "Unknown embedding provider: {}. Available: openai, ollama",
            provider_name
        )),
    }
}

fn resolve_api_key_with_fallback(env_vars: &[&str], config_key: &str) -> Result<String> {
    for var_name in env_vars {
        if let Ok(key) = resolve_api_key_from_env(var_name) {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(anyhow!("No API key found (set one of {})", env_vars.join(", ")))
    }
}

fn resolve_api_key_from_env(var_name: &str) -> Result<String> {
    std::env::var(var_name).map_err(|_| anyhow!("Environment variable {} not set", var_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ollama_config() -> Config {
        Config {
            provider: Some("ollama".to_string()),
            model: "qwen2.5".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = ollama_config();
        assert_eq!(create_provider(&config).unwrap().name(), "ollama");
        assert_eq!(create_embedder(&config).unwrap().name(), "nomic-embed-text");
    }

    #[test]
    fn embedding_model_override() {
        let mut config = ollama_config();
        config.embedding.model = Some("mxbai-embed-large".to_string());
        assert_eq!(create_embedder(&config).unwrap().name(), "mxbai-embed-large");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = Config {
            provider: Some("carrier-pigeon".to_string()),
            ..Config::default()
        };
        assert!(create_provider(&config).is_err());
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn config_key_is_fallback() {
        let key = resolve_api_key_with_fallback(&["SKILLVAULT_TEST_UNSET_KEY"], "from-config").unwrap();
        assert_eq!(key, "from-config");
        assert!(resolve_api_key_with_fallback(&["SKILLVAULT_TEST_UNSET_KEY"], "").is_err());
    }
}
