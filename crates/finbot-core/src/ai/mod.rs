//! Pluggable AI backend abstraction for expense extraction
//!
//! # Architecture
//!
//! - `AIBackend` trait: one structured-extraction call plus health/identity
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `OllamaBackend`, `MockBackend`
//! - `Extractor`: the best-effort wrapper the ingestion pipeline talks to.
//!   It bounds each call with a timeout and collapses every failure to `None`.
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: gemini (default), ollama, or mock
//! - `GEMINI_API_KEY`: required for the gemini backend
//! - `GEMINI_MODEL`: default gemini-2.5-flash
//! - `GEMINI_HOST`: default https://generativelanguage.googleapis.com
//! - `OLLAMA_HOST`: required for the ollama backend
//! - `OLLAMA_MODEL` / `OLLAMA_VISION_MODEL`: text and receipt models
//! - `FINBOT_AI_TIMEOUT_SECS`: per-call timeout, default 30

mod gemini;
mod mock;
mod ollama;
pub mod parsing;
pub mod types;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;

/// Environment variable for the per-call extraction timeout
pub const AI_TIMEOUT_ENV: &str = "FINBOT_AI_TIMEOUT_SECS";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

/// Trait defining the interface for all AI backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Turn a message or receipt image into a structured expense guess
    async fn extract_expense(&self, input: &ExtractionInput) -> Result<ExpenseCandidate>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Model name (for logging)
    fn model(&self) -> &str;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// Google Generative Language REST API
    Gemini(GeminiBackend),
    /// Ollama HTTP API
    Ollama(OllamaBackend),
    /// Deterministic keyword classifier
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None if the selected backend is missing its required settings.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "gemini".to_string());

        match backend.to_lowercase().as_str() {
            "gemini" => GeminiBackend::from_env().map(AIClient::Gemini),
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                warn!(backend = %backend, "Unknown AI_BACKEND, falling back to gemini");
                GeminiBackend::from_env().map(AIClient::Gemini)
            }
        }
    }

    pub fn gemini(host: &str, api_key: &str, model: &str) -> Self {
        AIClient::Gemini(GeminiBackend::new(host, api_key, model))
    }

    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn extract_expense(&self, input: &ExtractionInput) -> Result<ExpenseCandidate> {
        match self {
            AIClient::Gemini(b) => b.extract_expense(input).await,
            AIClient::Ollama(b) => b.extract_expense(input).await,
            AIClient::Mock(b) => b.extract_expense(input).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Gemini(b) => b.health_check().await,
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.model(),
            AIClient::Ollama(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.host(),
            AIClient::Ollama(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// Best-effort extraction: one attempt, bounded by a timeout, `None` on any failure
#[derive(Clone)]
pub struct Extractor {
    client: AIClient,
    timeout: Duration,
}

impl Extractor {
    pub fn new(client: AIClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Build from the environment; None when no backend is configured
    pub fn from_env() -> Option<Self> {
        let secs = std::env::var(AI_TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_AI_TIMEOUT_SECS);
        AIClient::from_env().map(|client| Self::new(client, Duration::from_secs(secs)))
    }

    pub fn client(&self) -> &AIClient {
        &self.client
    }

    pub async fn extract(&self, input: &ExtractionInput) -> Option<ExpenseCandidate> {
        if input.is_empty() {
            debug!("Skipping extraction for empty input");
            return None;
        }

        match tokio::time::timeout(self.timeout, self.client.extract_expense(input)).await {
            Ok(Ok(candidate)) => {
                debug!(?candidate, model = self.client.model(), "Extracted expense candidate");
                Some(candidate)
            }
            Ok(Err(e)) => {
                warn!(model = self.client.model(), "Expense extraction failed: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    model = self.client.model(),
                    timeout_secs = self.timeout.as_secs(),
                    "Expense extraction timed out"
                );
                None
            }
        }
    }
}
