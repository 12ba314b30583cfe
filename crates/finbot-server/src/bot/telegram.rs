//! Telegram Bot API adapter
//!
//! Translates `getUpdates` payloads into [`ChatUpdate`]s and implements
//! [`ChatTransport`] over the HTTP Bot API. All decisions live in
//! [`BotHandler`]; this module only moves bytes.
//!
//! Environment variables:
//! - `TELEGRAM_BOT_TOKEN`: required to enable the bot
//! - `TELEGRAM_API_HOST`: default https://api.telegram.org

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use finbot_core::error::{Error, Result};

use super::{BotHandler, BotReply, ChatTransport, ChatUpdate, DELETE_PREFIX};

pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_API_HOST_ENV: &str = "TELEGRAM_API_HOST";
pub const DEFAULT_API_HOST: &str = "https://api.telegram.org";

/// Long-poll window for getUpdates
const POLL_TIMEOUT_SECS: u64 = 30;
/// Client timeout; must exceed the long-poll window
const HTTP_TIMEOUT_SECS: u64 = 60;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

/// Map a Telegram update to a platform-neutral one; unsupported kinds are dropped
pub fn to_chat_update(update: Update) -> Option<ChatUpdate> {
    if let Some(query) = update.callback_query {
        let message = query.message?;
        return Some(ChatUpdate::Callback {
            chat_id: message.chat.id.to_string(),
            callback_id: query.id,
            message_id: message.message_id,
            data: query.data.unwrap_or_default(),
        });
    }

    let message = update.message?;
    let chat_id = message.chat.id.to_string();

    if let Some(photos) = message.photo.filter(|p| !p.is_empty()) {
        // Largest rendition
        let best = photos
            .into_iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))?;
        return Some(ChatUpdate::Photo {
            chat_id,
            file_id: best.file_id,
            caption: message.caption,
        });
    }

    message
        .text
        .map(|text| ChatUpdate::from_message(&chat_id, &text))
}

fn upstream(e: impl std::fmt::Display) -> Error {
    Error::Upstream(e.to_string())
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    host: String,
    token: String,
}

impl TelegramClient {
    pub fn new(host: &str, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Create from environment variables; None without a bot token
    pub fn from_env() -> Option<Self> {
        let token = std::env::var(TELEGRAM_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())?;
        let host =
            std::env::var(TELEGRAM_API_HOST_ENV).unwrap_or_else(|_| DEFAULT_API_HOST.to_string());
        Some(Self::new(&host, &token))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.host, self.token, method)
    }

    fn unwrap_response<T>(method: &str, response: ApiResponse<T>) -> Result<T> {
        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(Error::Upstream(format!(
                "{} failed: {}",
                method,
                description.unwrap_or_else(|| "no description".into())
            ))),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(upstream)?;

        let parsed: ApiResponse<T> = response.json().await.map_err(upstream)?;
        Self::unwrap_response(method, parsed)
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"]
            }),
        )
        .await
    }

    fn message_body(chat_id: &str, reply: &BotReply) -> Value {
        let mut body = json!({
            "chat_id": chat_id,
            "text": reply.text,
        });
        if reply.markdown {
            body["parse_mode"] = json!("Markdown");
        }
        if let Some(id) = reply.delete_button {
            body["reply_markup"] = json!({
                "inline_keyboard": [[
                    { "text": "Delete", "callback_data": format!("{}{}", DELETE_PREFIX, id) }
                ]]
            });
        }
        body
    }
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(&self, chat_id: &str, reply: &BotReply) -> Result<i64> {
        let sent: SentMessage = self
            .call("sendMessage", &Self::message_body(chat_id, reply))
            .await?;
        Ok(sent.message_id)
    }

    async fn edit_message(&self, chat_id: &str, message_id: i64, reply: &BotReply) -> Result<()> {
        let mut body = Self::message_body(chat_id, reply);
        body["message_id"] = json!(message_id);
        // Result is the edited message (or `true`); either way we only need success
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()> {
        let _: Value = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": callback_id, "text": text }),
            )
            .await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: &str, file_name: &str, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(upstream)?;
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(upstream)?;
        let parsed: ApiResponse<Value> = response.json().await.map_err(upstream)?;
        Self::unwrap_response("sendDocument", parsed).map(|_| ())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file: File = self
            .call("getFile", &json!({ "file_id": file_id }))
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| Error::Upstream("getFile returned no file_path".into()))?;

        let url = format!("{}/file/bot{}/{}", self.host, self.token, file_path);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(upstream)?
            .error_for_status()
            .map_err(upstream)?;
        let bytes = response.bytes().await.map_err(upstream)?;
        debug!(file_id, size = bytes.len(), "Downloaded chat file");
        Ok(bytes.to_vec())
    }
}

/// Poll for updates forever, handling each on its own task
pub async fn run_polling(client: Arc<TelegramClient>, handler: Arc<BotHandler>) {
    info!("Telegram bot polling started");
    let mut offset = 0;

    loop {
        let updates = match client.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(chat_update) = to_chat_update(update) else {
                continue;
            };

            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.dispatch(chat_update).await {
                    error!(error = %e, "Failed to deliver bot reply");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Json as AxumJson, routing::post, Router};
    use std::sync::Mutex;

    fn update(value: Value) -> Update {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_update() {
        let u = update(json!({
            "update_id": 1,
            "message": { "message_id": 10, "chat": { "id": 42 }, "text": "/start 123456" }
        }));
        assert_eq!(
            to_chat_update(u),
            Some(ChatUpdate::Command {
                chat_id: "42".into(),
                name: "start".into(),
                args: "123456".into(),
            })
        );
    }

    #[test]
    fn test_photo_update_picks_largest() {
        let u = update(json!({
            "update_id": 2,
            "message": {
                "message_id": 11,
                "chat": { "id": 42 },
                "caption": "dinner",
                "photo": [
                    { "file_id": "small", "width": 90, "height": 90 },
                    { "file_id": "large", "width": 1280, "height": 960 },
                    { "file_id": "medium", "width": 320, "height": 240 }
                ]
            }
        }));
        assert_eq!(
            to_chat_update(u),
            Some(ChatUpdate::Photo {
                chat_id: "42".into(),
                file_id: "large".into(),
                caption: Some("dinner".into()),
            })
        );
    }

    #[test]
    fn test_callback_update() {
        let u = update(json!({
            "update_id": 3,
            "callback_query": {
                "id": "cb",
                "data": "DELETE_9",
                "message": { "message_id": 12, "chat": { "id": 42 } }
            }
        }));
        assert_eq!(
            to_chat_update(u),
            Some(ChatUpdate::Callback {
                chat_id: "42".into(),
                callback_id: "cb".into(),
                message_id: 12,
                data: "DELETE_9".into(),
            })
        );
    }

    #[test]
    fn test_unsupported_update_dropped() {
        let u = update(json!({
            "update_id": 4,
            "message": { "message_id": 13, "chat": { "id": 42 } }
        }));
        assert!(to_chat_update(u).is_none());
    }

    #[test]
    fn test_message_body_with_button() {
        let reply = BotReply {
            text: "Expense Added!".into(),
            delete_button: Some(5),
            ..Default::default()
        };
        let body = TelegramClient::message_body("42", &reply);
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "DELETE_5"
        );
        assert!(body.get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn test_send_message_against_mock_api() {
        let received: Arc<Mutex<Vec<Value>>> = Arc::default();
        let sink = received.clone();
        let app = Router::new().route(
            "/bottest-token/sendMessage",
            post(move |AxumJson(body): AxumJson<Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(body);
                    AxumJson(json!({ "ok": true, "result": { "message_id": 77 } }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = TelegramClient::new(&format!("http://{}", addr), "test-token");
        let id = client
            .send_message("42", &crate::bot::otp_message("1234"))
            .await
            .unwrap();
        assert_eq!(id, 77);

        let bodies = received.lock().unwrap();
        assert_eq!(bodies[0]["chat_id"], "42");
        assert_eq!(bodies[0]["parse_mode"], "Markdown");
    }

    #[tokio::test]
    async fn test_api_error_is_upstream() {
        let app = Router::new().route(
            "/botbad/sendMessage",
            post(|| async { AxumJson(json!({ "ok": false, "description": "chat not found" })) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = TelegramClient::new(&format!("http://{}", addr), "bad");
        let err = client
            .send_message("42", &BotReply::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(msg) if msg.contains("chat not found")));
    }
}
