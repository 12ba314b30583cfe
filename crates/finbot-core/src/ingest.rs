//! Expense ingestion pipeline
//!
//! Three input paths end in the same place: one validated row in `expenses`
//! and one `ExpenseEvent::Created` for the owner.
//!
//! ```text
//! manual form ──────────────────────────────┐
//! chat text  ── linked? ── extract ── map ──┼── insert ── notify
//! chat photo ── linked? ── extract ── map ──┘
//! ```
//!
//! Extraction is best-effort (see [`Extractor`]); a `None` becomes
//! `ExtractionFailed` and nothing is retried.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::ai::{ExpenseCandidate, ExtractionInput, Extractor};
use crate::db::Database;
use crate::error::{Error, ExtractionSource, Result};
use crate::models::{Category, Expense, ExpenseSource, NewExpense, PaymentMode, User};
use crate::notify::{ExpenseEvent, Notifier};

/// Title used when a receipt yields no shop name
pub const RECEIPT_FALLBACK_TITLE: &str = "Scanned Receipt";

/// Fields from the web form; everything is optional until validated
#[derive(Debug, Clone, Default)]
pub struct ManualEntry {
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub mode: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339
    pub date: Option<String>,
}

/// Parse a form amount; blank means absent
pub fn parse_amount(raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| Error::Validation(format!("Amount must be a number, got {:?}", raw)))
}

/// Parse a user-supplied expense date
pub fn parse_expense_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| Error::Validation(format!("Invalid date: {:?}", raw)))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn validate_positive_amount(amount: Option<f64>) -> Result<f64> {
    match amount {
        Some(a) if a.is_finite() && a > 0.0 => Ok(a),
        Some(_) => Err(Error::Validation("Amount must be greater than zero".into())),
        None => Err(Error::Validation("Amount is required".into())),
    }
}

fn mode_from(label: Option<&str>) -> PaymentMode {
    label.map(PaymentMode::normalize).unwrap_or_default()
}

fn category_from(label: Option<&str>) -> Category {
    label.map(Category::normalize).unwrap_or_default()
}

/// Drives extraction, validation, persistence and notification
#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    extractor: Option<Extractor>,
    notifier: Notifier,
}

impl Ingestor {
    pub fn new(db: Database, extractor: Option<Extractor>, notifier: Notifier) -> Self {
        Self {
            db,
            extractor,
            notifier,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn extractor(&self) -> Option<&Extractor> {
        self.extractor.as_ref()
    }

    pub fn has_extractor(&self) -> bool {
        self.extractor.is_some()
    }

    async fn extract(&self, input: &ExtractionInput) -> Option<ExpenseCandidate> {
        match &self.extractor {
            Some(extractor) => extractor.extract(input).await,
            None => {
                warn!("No AI backend configured; extraction unavailable");
                None
            }
        }
    }

    fn persist(&self, expense: NewExpense) -> Result<Expense> {
        let saved = self.db.insert_expense(&expense)?;
        info!(
            user_id = saved.user_id,
            expense_id = saved.id,
            source = saved.source.as_str(),
            "Expense recorded"
        );
        self.notifier
            .publish(saved.user_id, ExpenseEvent::Created { id: saved.id });
        Ok(saved)
    }

    /// Web form entry
    pub fn ingest_manual(&self, user_id: i64, entry: ManualEntry) -> Result<Expense> {
        let title = non_blank(entry.title.as_deref())
            .ok_or_else(|| Error::Validation("Title is required".into()))?;
        let amount = validate_positive_amount(entry.amount)?;
        let date = match non_blank(entry.date.as_deref()) {
            Some(raw) => parse_expense_date(&raw)?,
            None => Utc::now(),
        };

        self.persist(NewExpense {
            user_id,
            title,
            amount,
            category: category_from(entry.category.as_deref()),
            mode: mode_from(entry.mode.as_deref()),
            date,
            source: ExpenseSource::Manual,
        })
    }

    /// Web form entry with a receipt image; form fields override the scan
    pub async fn ingest_receipt_upload(
        &self,
        user_id: i64,
        image: Vec<u8>,
        overrides: ManualEntry,
    ) -> Result<Expense> {
        // Validate what the user typed before paying for a model call
        let amount_override = match overrides.amount {
            Some(_) => Some(validate_positive_amount(overrides.amount)?),
            None => None,
        };
        let date = match non_blank(overrides.date.as_deref()) {
            Some(raw) => parse_expense_date(&raw)?,
            None => Utc::now(),
        };

        let candidate = self
            .extract(&ExtractionInput::image(image, None))
            .await
            .ok_or(Error::ExtractionFailed(ExtractionSource::Photo))?;

        let title = non_blank(overrides.title.as_deref())
            .or_else(|| non_blank(candidate.item.as_deref()))
            .unwrap_or_else(|| RECEIPT_FALLBACK_TITLE.to_string());
        let amount = amount_override.unwrap_or_else(|| receipt_amount(candidate.amount));
        let category = non_blank(overrides.category.as_deref()).or(candidate.category);
        let mode = non_blank(overrides.mode.as_deref()).or(candidate.mode);

        self.persist(NewExpense {
            user_id,
            title,
            amount,
            category: category_from(category.as_deref()),
            mode: mode_from(mode.as_deref()),
            date,
            source: ExpenseSource::ReceiptUpload,
        })
    }

    /// Resolve the account linked to a chat, or `NotLinked`
    pub fn ensure_linked(&self, chat_id: &str) -> Result<User> {
        self.db
            .get_user_by_chat_id(chat_id)?
            .ok_or(Error::NotLinked)
    }

    /// Free-text chat message such as "100 momos"
    pub async fn ingest_chat_text(&self, chat_id: &str, text: &str) -> Result<Expense> {
        let user = self.ensure_linked(chat_id)?;

        let candidate = self
            .extract(&ExtractionInput::text(text))
            .await
            .ok_or(Error::ExtractionFailed(ExtractionSource::Text))?;

        let title = non_blank(candidate.item.as_deref())
            .ok_or(Error::ExtractionFailed(ExtractionSource::Text))?;
        let amount = candidate
            .amount
            .filter(|a| a.is_finite() && *a > 0.0)
            .ok_or(Error::ExtractionFailed(ExtractionSource::Text))?;

        self.persist(NewExpense {
            user_id: user.id,
            title,
            amount,
            category: category_from(candidate.category.as_deref()),
            mode: mode_from(candidate.mode.as_deref()),
            date: Utc::now(),
            source: ExpenseSource::ChatText,
        })
    }

    /// Receipt photo sent to the bot, with its optional caption
    pub async fn ingest_chat_photo(
        &self,
        chat_id: &str,
        image: Vec<u8>,
        caption: Option<String>,
    ) -> Result<Expense> {
        let user = self.ensure_linked(chat_id)?;

        let candidate = self
            .extract(&ExtractionInput::image(image, caption))
            .await
            .ok_or(Error::ExtractionFailed(ExtractionSource::Photo))?;

        self.persist(NewExpense {
            user_id: user.id,
            title: non_blank(candidate.item.as_deref())
                .unwrap_or_else(|| RECEIPT_FALLBACK_TITLE.to_string()),
            amount: receipt_amount(candidate.amount),
            category: category_from(candidate.category.as_deref()),
            mode: mode_from(candidate.mode.as_deref()),
            date: Utc::now(),
            source: ExpenseSource::ChatPhoto,
        })
    }

    /// Delete an expense the acting user owns
    ///
    /// Missing and foreign expenses are indistinguishable to the caller.
    pub fn delete_expense(&self, expense_id: i64, acting_user_id: i64) -> Result<()> {
        if !self.db.delete_owned_expense(expense_id, acting_user_id)? {
            return Err(Error::NotFoundOrUnauthorized);
        }
        info!(user_id = acting_user_id, expense_id, "Expense deleted");
        self.notifier
            .publish(acting_user_id, ExpenseEvent::Deleted { id: expense_id });
        Ok(())
    }
}

/// Receipt totals fall back to 0 when missing or nonsensical
fn receipt_amount(amount: Option<f64>) -> f64 {
    amount.filter(|a| a.is_finite() && *a >= 0.0).unwrap_or(0.0)
}
