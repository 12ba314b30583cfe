//! Test utilities for finbot-core
//!
//! A mock model server speaking just enough of the Ollama and Gemini HTTP
//! APIs to exercise the real backends end to end.
//!
//! Prompt handling:
//! - expense prompts are answered by the keyword classifier
//! - receipt prompts get a fixed "Cafe Blue" receipt
//! - a message containing "garbage" gets a non-JSON reply

use axum::{
    extract::{Json, Path},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::oneshot;

use crate::ai::MockBackend;

/// Mock model server for backend tests
pub struct MockModelServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockModelServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_ollama_generate))
            .route(
                "/v1beta/models/:name",
                get(handle_gemini_model).post(handle_gemini_generate),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockModelServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Answer a prompt the way a cooperative model would
fn answer(prompt: &str) -> String {
    if prompt.contains("Scan this receipt image") {
        return json!({
            "item": "Cafe Blue",
            "amount": "240",
            "category": "Food",
            "mode": "Cash"
        })
        .to_string();
    }

    let message = prompt
        .split_once("Analyze this expense message: \"")
        .and_then(|(_, rest)| rest.split_once('"'))
        .map(|(message, _)| message)
        .unwrap_or(prompt);

    if message.contains("garbage") {
        return "Sorry, I am not sure what you mean.".to_string();
    }

    serde_json::to_string(&MockBackend::classify(message)).unwrap()
}

#[derive(Serialize)]
struct TagsResponse {
    models: Vec<Value>,
}

async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![json!({"name": "llama3.2:latest"})],
    })
}

#[derive(Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(default)]
    images: Vec<String>,
}

async fn handle_ollama_generate(Json(request): Json<GenerateRequest>) -> Json<Value> {
    let response = if request.images.is_empty() && request.prompt.contains("Scan this receipt") {
        "missing image".to_string()
    } else {
        answer(&request.prompt)
    };

    Json(json!({
        "model": request.model,
        "response": response,
        "done": true
    }))
}

async fn handle_gemini_model(Path(model): Path<String>) -> Json<Value> {
    Json(json!({ "name": format!("models/{}", model) }))
}

async fn handle_gemini_generate(
    Path(call): Path<String>,
    Json(request): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if !call.ends_with(":generateContent") {
        return Err(StatusCode::NOT_FOUND);
    }

    let prompt = request["contents"][0]["parts"][0]["text"]
        .as_str()
        .ok_or(StatusCode::BAD_REQUEST)?;

    // Gemini likes to fence its JSON
    let text = format!("```json\n{}\n```", answer(prompt));

    Ok(Json(json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }], "role": "model" }
        }]
    })))
}
