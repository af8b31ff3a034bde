use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Embedder, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<OllamaMessage<'_>> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: &m.role,
                content: &m.content,
            })
            .collect()
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> anyhow::Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Ollama API error ({}): {}",
                status,
                error_text
            ));
        }

        Ok(response)
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(
        &self,
        request: ChatRequest<'_>,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<ChatResponse> {
        let ollama_request = OllamaRequest {
            model,
            messages: Self::convert_messages(request.messages),
            options: OllamaOptions { temperature },
            stream: false,
        };

        let ollama_response: OllamaResponse =
            self.post("api/chat", &ollama_request).await?.json().await?;

        let message = ollama_response.message;
        if message.content.as_ref().is_none_or(|c| c.trim().is_empty()) {
            // Reasoning models occasionally stop after the thinking phase.
            if message.thinking.is_some() {
                anyhow::bail!("Ollama returned reasoning without a final answer");
            }
            anyhow::bail!("Empty response from Ollama");
        }

        Ok(ChatResponse {
            text: message.content,
        })
    }
}

#[async_trait]
impl Embedder for OllamaProvider {
    fn name(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let request = OllamaEmbedRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response: OllamaEmbedResponse = self.post("api/embed", &request).await?.json().await?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding in Ollama response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let provider = OllamaProvider::default();
        assert_eq!(provider.model(), "llama3.2");
        assert_eq!(Embedder::name(&provider), "nomic-embed-text");
    }

    #[test]
    fn messages_keep_role_and_content() {
        let messages = [ChatMessage::system("sys"), ChatMessage::user("hi")];
        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[1].content, "hi");
    }

    #[test]
    fn parses_embed_response() {
        let response: OllamaEmbedResponse =
            serde_json::from_str(r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2]]}"#)
                .unwrap();
        assert_eq!(response.embeddings, vec![vec![0.1, 0.2]]);
    }
}
