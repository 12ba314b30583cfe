//! Ollama backend implementation
//!
//! HTTP client for the Ollama `/api/generate` endpoint. Text messages go to
//! the default model; receipt photos go to the vision model with the image
//! in the `images` array.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::prompts::PromptLibrary;

use super::parsing::parse_candidate;
use super::types::{ExpenseCandidate, ExtractionInput};
use super::AIBackend;

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_OLLAMA_VISION_MODEL: &str = "llama3.2-vision";

#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    default_model: String,
    vision_model: String,
    prompts: PromptLibrary,
}

impl OllamaBackend {
    pub fn new(base_url: &str, default_model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: default_model.to_string(),
            vision_model: DEFAULT_OLLAMA_VISION_MODEL.to_string(),
            prompts: PromptLibrary::from_env(),
        }
    }

    pub fn with_vision_model(mut self, model: &str) -> Self {
        self.vision_model = model.to_string();
        self
    }

    /// Create from environment variables; requires `OLLAMA_HOST`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model =
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string());
        let vision = std::env::var("OLLAMA_VISION_MODEL")
            .unwrap_or_else(|_| DEFAULT_OLLAMA_VISION_MODEL.to_string());
        Some(Self::new(&host, &model).with_vision_model(&vision))
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    format: &'static str,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn extract_expense(&self, input: &ExtractionInput) -> Result<ExpenseCandidate> {
        let request = match input.image.as_deref() {
            Some(image) if !image.is_empty() => OllamaRequest {
                model: self.vision_model.clone(),
                prompt: self.prompts.receipt_prompt(input.trimmed_text())?,
                images: vec![base64::engine::general_purpose::STANDARD.encode(image)],
                format: "json",
                stream: false,
            },
            _ => {
                let text = input
                    .trimmed_text()
                    .ok_or_else(|| Error::InvalidData("Empty extraction input".into()))?;
                OllamaRequest {
                    model: self.default_model.clone(),
                    prompt: self.prompts.expense_prompt(text)?,
                    images: Vec::new(),
                    format: "json",
                    stream: false,
                }
            }
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let ollama_response: OllamaResponse = response.json().await?;
        debug!("Ollama response: {}", ollama_response.response);

        parse_candidate(&ollama_response.response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.default_model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_request_omits_images() {
        let request = OllamaRequest {
            model: "llama3.2".into(),
            prompt: "p".into(),
            images: Vec::new(),
            format: "json",
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("images").is_none());
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_host_trailing_slash_trimmed() {
        let backend = OllamaBackend::new("http://localhost:11434/", "llama3.2");
        assert_eq!(backend.host(), "http://localhost:11434");
        assert_eq!(backend.model(), "llama3.2");
    }
}
