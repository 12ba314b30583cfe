//! Chat bot
//!
//! Platform-neutral dispatch: an adapter turns platform updates into
//! [`ChatUpdate`]s, [`BotHandler::handle`] decides the [`BotReply`], and
//! [`BotHandler::dispatch`] drives the outbound side through a
//! [`ChatTransport`] (placeholder message, edit, documents, callback toasts).
//!
//! ```text
//! Telegram update ── to_chat_update ── ChatUpdate ── handle ── BotReply ── ChatTransport
//! ```

pub mod telegram;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use finbot_core::error::{Error, ExtractionSource, Result};
use finbot_core::linking::consume_link_code;
use finbot_core::statement::{write_transient, STATEMENT_FILENAME};
use finbot_core::{format_amount, Expense, Ingestor, MonthRange, Statement};

pub use telegram::TelegramClient;

/// Callback data prefix for the inline delete button
pub const DELETE_PREFIX: &str = "DELETE_";

pub const WELCOME: &str = "Welcome to FinBot!\nTo link your account, go to the Website > Login > Get Code, and send it here like:\n/start 123456";
pub const INVALID_CODE: &str = "Invalid or Expired Code! Please generate a new one from the website.";
pub const NOT_LINKED: &str = "You are not linked! Please login to the website first.";
pub const LINK_FIRST: &str = "Please link your account first.";
pub const MAKING_REPORT: &str = "Making your PDF... wait a sec.";
pub const NO_EXPENSES: &str = "No expenses found this month!";
pub const ANALYZING: &str = "Analyzing...";
pub const SCANNING: &str = "Scanning Receipt...";
pub const COULD_NOT_UNDERSTAND: &str = "Could not understand. Try format: '100 Momos'";
pub const COULD_NOT_READ_BILL: &str = "Could not read the bill. Try again later.";
pub const SOMETHING_WRONG: &str = "Something went wrong. Please try again.";
pub const EXPENSE_DELETED: &str = "Expense Deleted Successfully!";
pub const HELP: &str = "Send an expense like \"100 momos\" or \"spent 500 on petrol via gpay\".\nSend a photo of a bill to scan it.\n/report - this month's PDF statement\n/start <code> - link your account";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Try /help";

/// One inbound chat event, stripped of platform details
#[derive(Debug, Clone, PartialEq)]
pub enum ChatUpdate {
    /// `/name args`
    Command {
        chat_id: String,
        name: String,
        args: String,
    },
    Text {
        chat_id: String,
        text: String,
    },
    Photo {
        chat_id: String,
        file_id: String,
        caption: Option<String>,
    },
    /// Inline button press on an earlier bot message
    Callback {
        chat_id: String,
        callback_id: String,
        message_id: i64,
        data: String,
    },
}

impl ChatUpdate {
    /// Classify a plain message as command or free text
    pub fn from_message(chat_id: &str, text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed.strip_prefix('/') {
            Some(rest) => {
                let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                // "/start@FinBot 123" addresses a specific bot in group chats
                let name = head.split('@').next().unwrap_or(head);
                ChatUpdate::Command {
                    chat_id: chat_id.to_string(),
                    name: name.to_lowercase(),
                    args: args.trim().to_string(),
                }
            }
            None => ChatUpdate::Text {
                chat_id: chat_id.to_string(),
                text: trimmed.to_string(),
            },
        }
    }

    pub fn chat_id(&self) -> &str {
        match self {
            ChatUpdate::Command { chat_id, .. }
            | ChatUpdate::Text { chat_id, .. }
            | ChatUpdate::Photo { chat_id, .. }
            | ChatUpdate::Callback { chat_id, .. } => chat_id,
        }
    }
}

/// What the bot says back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotReply {
    pub text: String,
    /// Render `text` as Markdown
    pub markdown: bool,
    /// Attach an inline "Delete" button for this expense id
    pub delete_button: Option<i64>,
    /// PDF statement sent as a document after the text
    pub document: Option<Vec<u8>>,
    /// Short toast acknowledging a button press
    pub notice: Option<String>,
}

impl BotReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
            ..Default::default()
        }
    }
}

/// Outbound side of a chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a message; returns its platform message id
    async fn send_message(&self, chat_id: &str, reply: &BotReply) -> Result<i64>;

    /// Replace the text (and button) of an earlier message
    async fn edit_message(&self, chat_id: &str, message_id: i64, reply: &BotReply) -> Result<()>;

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()>;

    async fn send_document(&self, chat_id: &str, file_name: &str, path: &Path) -> Result<()>;

    /// Fetch an uploaded file (a photo) by its platform file id
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// Password-reset OTP message
pub fn otp_message(otp: &str) -> BotReply {
    BotReply::markdown(format!(
        "*Password Reset Request*\n\nYour OTP is: *{}*\n\nValid for 5 minutes. Do not share this with anyone.",
        otp
    ))
}

fn linked_message(name: &str) -> String {
    format!(
        "Account Linked Successfully!\nHello {}, I am ready.\n\nTry sending an expense: \"spent 100 for petrol\",\nOr if you want to download monthly expense report try /report command",
        name
    )
}

fn expense_message(heading: &str, expense: &Expense) -> BotReply {
    BotReply {
        text: format!(
            "{}\nItem: {}\nAmount: {}\nCategory: {}\nMode: {}",
            heading,
            expense.title,
            format_amount(expense.amount),
            expense.category,
            expense.mode
        ),
        delete_button: Some(expense.id),
        ..Default::default()
    }
}

fn ingest_failure(err: Error) -> BotReply {
    match err {
        Error::NotLinked => BotReply::text(NOT_LINKED),
        Error::ExtractionFailed(ExtractionSource::Text) => BotReply::text(COULD_NOT_UNDERSTAND),
        Error::ExtractionFailed(ExtractionSource::Photo) => BotReply::text(COULD_NOT_READ_BILL),
        other => {
            error!(error = %other, "Chat ingestion failed");
            BotReply::text(SOMETHING_WRONG)
        }
    }
}

/// Chat state machine over the ingestion pipeline
pub struct BotHandler {
    ingestor: Ingestor,
    transport: Arc<dyn ChatTransport>,
}

impl BotHandler {
    pub fn new(ingestor: Ingestor, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            ingestor,
            transport,
        }
    }

    /// Decide the reply for one update
    pub async fn handle(&self, update: &ChatUpdate) -> BotReply {
        match update {
            ChatUpdate::Command {
                chat_id,
                name,
                args,
            } => self.handle_command(chat_id, name, args).await,
            ChatUpdate::Text { chat_id, text } => {
                match self.ingestor.ingest_chat_text(chat_id, text).await {
                    Ok(expense) => expense_message("Expense Added!", &expense),
                    Err(e) => ingest_failure(e),
                }
            }
            ChatUpdate::Photo {
                chat_id,
                file_id,
                caption,
            } => self.handle_photo(chat_id, file_id, caption.clone()).await,
            ChatUpdate::Callback { chat_id, data, .. } => self.handle_callback(chat_id, data),
        }
    }

    async fn handle_command(&self, chat_id: &str, name: &str, args: &str) -> BotReply {
        match name {
            "start" if args.is_empty() => BotReply::text(WELCOME),
            "start" => match consume_link_code(self.ingestor.db(), args, chat_id) {
                Ok(user) => BotReply::text(linked_message(&user.name)),
                Err(Error::InvalidOrExpiredCode) => BotReply::text(INVALID_CODE),
                Err(Error::Validation(msg)) => BotReply::text(msg),
                Err(e) => {
                    error!(error = %e, "Linking failed");
                    BotReply::text(SOMETHING_WRONG)
                }
            },
            "report" => self.handle_report(chat_id).await,
            "help" => BotReply::text(HELP),
            _ => BotReply::text(UNKNOWN_COMMAND),
        }
    }

    async fn handle_report(&self, chat_id: &str) -> BotReply {
        let ingestor = self.ingestor.clone();
        let chat_id = chat_id.to_string();
        let build = move || -> Result<BotReply> {
            let user = ingestor.ensure_linked(&chat_id)?;
            let expenses = ingestor
                .db()
                .list_expenses_in_range(user.id, &MonthRange::current())?;
            if expenses.is_empty() {
                return Ok(BotReply::text(NO_EXPENSES));
            }

            let statement = Statement::build(&user.name, &expenses, Utc::now().date_naive());
            info!(user_id = user.id, rows = statement.rows.len(), "Rendering chat statement");
            Ok(BotReply {
                text: MAKING_REPORT.to_string(),
                document: Some(statement.render_pdf()?),
                ..Default::default()
            })
        };

        let result = tokio::task::spawn_blocking(build)
            .await
            .unwrap_or_else(|e| Err(Error::Internal(format!("Report task failed: {}", e))));

        match result {
            Ok(reply) => reply,
            Err(Error::NotLinked) => BotReply::text(LINK_FIRST),
            Err(e) => {
                error!(error = %e, "Report generation failed");
                BotReply::text(SOMETHING_WRONG)
            }
        }
    }

    async fn handle_photo(&self, chat_id: &str, file_id: &str, caption: Option<String>) -> BotReply {
        // Never download images for strangers
        if let Err(e) = self.ingestor.ensure_linked(chat_id) {
            return ingest_failure(e);
        }

        let image = match self.transport.download_file(file_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Photo download failed");
                return BotReply::text(COULD_NOT_READ_BILL);
            }
        };

        let caption = caption.filter(|c| !c.trim().is_empty());
        match self.ingestor.ingest_chat_photo(chat_id, image, caption).await {
            Ok(expense) => expense_message("Bill Scanned!", &expense),
            Err(e) => ingest_failure(e),
        }
    }

    fn handle_callback(&self, chat_id: &str, data: &str) -> BotReply {
        let Some(expense_id) = data
            .strip_prefix(DELETE_PREFIX)
            .and_then(|id| id.parse::<i64>().ok())
        else {
            return BotReply {
                notice: Some("Unknown action".into()),
                ..Default::default()
            };
        };

        let result = self
            .ingestor
            .ensure_linked(chat_id)
            .and_then(|user| self.ingestor.delete_expense(expense_id, user.id));

        match result {
            Ok(()) => BotReply {
                text: EXPENSE_DELETED.to_string(),
                notice: Some("Expense Deleted!".into()),
                ..Default::default()
            },
            Err(Error::NotLinked) => BotReply {
                notice: Some(NOT_LINKED.into()),
                ..Default::default()
            },
            Err(Error::NotFoundOrUnauthorized) => BotReply {
                notice: Some("Expense not found or already deleted.".into()),
                ..Default::default()
            },
            Err(e) => {
                error!(error = %e, expense_id, "Chat delete failed");
                BotReply {
                    notice: Some("Error deleting expense.".into()),
                    ..Default::default()
                }
            }
        }
    }

    /// Handle one update end to end through the transport
    pub async fn dispatch(&self, update: ChatUpdate) -> Result<()> {
        let chat_id = update.chat_id().to_string();

        match &update {
            ChatUpdate::Text { .. } | ChatUpdate::Photo { .. } => {
                // Unlinked chats get the answer directly, without a placeholder
                if let Err(e) = self.ingestor.ensure_linked(&chat_id) {
                    self.transport
                        .send_message(&chat_id, &ingest_failure(e))
                        .await?;
                    return Ok(());
                }

                let placeholder = if matches!(update, ChatUpdate::Photo { .. }) {
                    SCANNING
                } else {
                    ANALYZING
                };
                let message_id = self
                    .transport
                    .send_message(&chat_id, &BotReply::text(placeholder))
                    .await?;

                let reply = self.handle(&update).await;
                self.transport
                    .edit_message(&chat_id, message_id, &reply)
                    .await
            }
            ChatUpdate::Callback {
                callback_id,
                message_id,
                ..
            } => {
                let reply = self.handle(&update).await;
                self.transport
                    .answer_callback(callback_id, reply.notice.as_deref().unwrap_or_default())
                    .await?;
                if !reply.text.is_empty() {
                    self.transport
                        .edit_message(&chat_id, *message_id, &reply)
                        .await?;
                }
                Ok(())
            }
            ChatUpdate::Command { .. } => {
                let reply = self.handle(&update).await;
                self.transport.send_message(&chat_id, &reply).await?;

                if let Some(bytes) = &reply.document {
                    // Removed from disk when `file` drops
                    let file = write_transient(bytes)?;
                    self.transport
                        .send_document(&chat_id, STATEMENT_FILENAME, file.path())
                        .await?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests;
