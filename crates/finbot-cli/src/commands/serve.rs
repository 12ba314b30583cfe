//! Server command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use finbot_core::ai::{AIBackend, Extractor};
use finbot_server::bot::telegram::{run_polling, TelegramClient};
use finbot_server::{AppState, BotHandler, ChatTransport, ServerConfig};

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_encrypt: bool,
    static_dir: Option<&Path>,
    no_bot: bool,
) -> Result<()> {
    println!("🚀 Starting FinBot web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let config = ServerConfig::from_env()?;
    if !config.allowed_origins.is_empty() {
        println!(
            "   🌐 CORS origins: {} (FINBOT_ALLOWED_ORIGINS)",
            config.allowed_origins.join(", ")
        );
    }

    let extractor = Extractor::from_env();
    match &extractor {
        Some(e) => println!("   🤖 AI extraction: {}", e.client().model()),
        None => println!("   💡 Tip: Set GEMINI_API_KEY or AI_BACKEND=ollama for expense extraction"),
    }

    let telegram = TelegramClient::from_env().map(Arc::new);
    match (&telegram, no_bot) {
        (Some(_), false) => println!("   💬 Telegram bot: polling"),
        (Some(_), true) => println!("   💬 Telegram bot: send-only (--no-bot)"),
        (None, _) => println!("   💡 Tip: Set TELEGRAM_BOT_TOKEN to enable the chat bot"),
    }

    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let chat = telegram
        .clone()
        .map(|client| client as Arc<dyn ChatTransport>);
    let state = AppState::new(db, extractor, config, chat);

    if let (Some(client), false) = (telegram, no_bot) {
        let handler = Arc::new(BotHandler::new(
            state.ingestor.clone(),
            client.clone() as Arc<dyn ChatTransport>,
        ));
        tokio::spawn(run_polling(client, handler));
    }

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;
    finbot_server::serve(state, host, port, static_dir_str).await?;

    Ok(())
}
