//! Ollama `/api/generate` client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::NarrativeClient;
use crate::logging::truncate_field;
use crate::prelude::*;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Talks to a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &EdaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EdaError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NarrativeClient for OllamaClient {
    #[instrument(skip(self, prompt), fields(prompt.len = prompt.len()))]
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(url = %url, prompt = %truncate_field(prompt, 200), "Requesting narrative");

        let response = self
            .http
            .post(&url)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| EdaError::Narrative(format!("failed to reach Ollama at {}: {e}", self.base_url)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EdaError::Narrative(format!(
                "Ollama returned {status}: {}",
                truncate_field(&body, 200)
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| EdaError::Narrative(format!("unexpected Ollama response: {e}")))?;
        info!(model, chars = body.response.len(), "Narrative generated");
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(url: &str) -> OllamaClient {
        OllamaClient::new(&EdaConfig::default().with_ollama_base_url(url)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_posts_non_streaming_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(json!({
                "model": "llama3.2",
                "prompt": "describe",
                "stream": false,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r##"{"model":"llama3.2","response":"# Test\nAnalysis content","done":true}"##)
            .create_async()
            .await;

        let text = client(&server.url())
            .generate("llama3.2", "describe")
            .await
            .unwrap();

        assert_eq!(text, "# Test\nAnalysis content");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_is_a_narrative_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model 'nope' not found"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).generate("nope", "x").await.unwrap_err();
        match err {
            EdaError::Narrative(message) => assert!(message.contains("404")),
            other => panic!("expected Narrative error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_narrative_error() {
        let err = client("http://127.0.0.1:9")
            .generate("llama3.2", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, EdaError::Narrative(_)));
    }
}
