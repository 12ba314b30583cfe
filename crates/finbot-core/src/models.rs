//! Domain models for FinBot

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Expense category
///
/// This is the closed set shared by the extraction prompts, the database
/// CHECK constraint and the web form. Anything outside it is coerced to
/// `General` by [`Category::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    Food,
    Travel,
    Fuel,
    Shopping,
    Entertainment,
    Bills,
    Health,
    Education,
    Groceries,
    #[default]
    General,
}

impl Category {
    /// All categories, in display order
    pub const ALL: [Category; 10] = [
        Self::Food,
        Self::Travel,
        Self::Fuel,
        Self::Shopping,
        Self::Entertainment,
        Self::Bills,
        Self::Health,
        Self::Education,
        Self::Groceries,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Travel => "Travel",
            Self::Fuel => "Fuel",
            Self::Shopping => "Shopping",
            Self::Entertainment => "Entertainment",
            Self::Bills => "Bills",
            Self::Health => "Health",
            Self::Education => "Education",
            Self::Groceries => "Groceries",
            Self::General => "General",
        }
    }

    /// Map any label (classifier output, form input) onto the closed set
    pub fn normalize(label: &str) -> Self {
        label.trim().parse().unwrap_or_default()
    }

    /// Category labels as a JSON-style list, e.g. `["Food", "Travel", ...]`
    pub fn prompt_list() -> String {
        let quoted: Vec<String> = Self::ALL
            .iter()
            .map(|c| format!("\"{}\"", c.as_str()))
            .collect();
        format!("[{}]", quoted.join(", "))
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an expense was paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMode {
    #[default]
    Cash,
    Online,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Online => "Online",
        }
    }

    /// Online only when explicitly stated; "Unknown", empty or anything else is Cash
    pub fn normalize(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("online") {
            Self::Online
        } else {
            Self::Cash
        }
    }
}

impl std::str::FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "online" => Ok(Self::Online),
            _ => Err(format!("Unknown payment mode: {}", s)),
        }
    }
}

impl std::fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expense source - which ingestion path created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseSource {
    /// Entered through the web form
    #[default]
    Manual,
    /// Free-text chat message
    ChatText,
    /// Receipt photo sent to the bot
    ChatPhoto,
    /// Receipt image uploaded through the web form
    ReceiptUpload,
}

impl ExpenseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::ChatText => "chat_text",
            Self::ChatPhoto => "chat_photo",
            Self::ReceiptUpload => "receipt_upload",
        }
    }
}

impl std::str::FromStr for ExpenseSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "chat_text" => Ok(Self::ChatText),
            "chat_photo" => Ok(Self::ChatPhoto),
            "receipt_upload" => Ok(Self::ReceiptUpload),
            _ => Err(format!("Unknown expense source: {}", s)),
        }
    }
}

/// A registered user
///
/// Secrets (password hash, pending codes) are never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub telegram_chat_id: Option<String>,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    #[serde(skip_serializing)]
    pub verification_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_password_otp: Option<String>,
    #[serde(skip_serializing)]
    pub reset_password_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_linked(&self) -> bool {
        self.telegram_chat_id.is_some()
    }
}

/// A persisted expense
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub amount: f64,
    pub category: Category,
    pub mode: PaymentMode,
    pub date: DateTime<Utc>,
    pub source: ExpenseSource,
    pub created_at: DateTime<Utc>,
}

/// A validated expense ready to insert
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub user_id: i64,
    pub title: String,
    pub amount: f64,
    pub category: Category,
    pub mode: PaymentMode,
    pub date: DateTime<Utc>,
    pub source: ExpenseSource,
}

/// Closed calendar-month interval [first instant, last instant]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthRange {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::Validation(format!("Invalid month: {}-{}", year, month)))?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| Error::Validation(format!("Invalid month: {}-{}", year, month)))?;
        let last = next_first
            .pred_opt()
            .ok_or_else(|| Error::Validation(format!("Invalid month: {}-{}", year, month)))?;

        let start = first
            .and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt))
            .ok_or_else(|| Error::Internal("Invalid month start".into()))?;
        let end = last
            .and_hms_opt(23, 59, 59)
            .map(|dt| Utc.from_utc_datetime(&dt))
            .ok_or_else(|| Error::Internal("Invalid month end".into()))?;

        Ok(Self {
            year,
            month,
            start,
            end,
        })
    }

    /// The month containing `instant`
    pub fn containing(instant: DateTime<Utc>) -> Self {
        // A month taken from a valid date is always constructible
        Self::new(instant.year(), instant.month()).unwrap_or_else(|_| Self {
            year: instant.year(),
            month: instant.month(),
            start: instant,
            end: instant,
        })
    }

    /// The current UTC calendar month
    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    /// Resolve optional `month` / `year` query values, defaulting to the current month
    pub fn from_parts(month: Option<u32>, year: Option<i32>) -> Result<Self> {
        let now = Utc::now();
        Self::new(year.unwrap_or(now.year()), month.unwrap_or(now.month()))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Human-readable label, e.g. "January 2024"
    pub fn label(&self) -> String {
        self.start.format("%B %Y").to_string()
    }
}

/// Sum of amounts for one category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: f64,
}

/// Sum of amounts for one day (`YYYY-MM-DD`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyTotal {
    pub date: String,
    pub total: f64,
}

/// Sum of amounts for one payment mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModeTotal {
    pub mode: PaymentMode,
    pub total: f64,
}

/// Month-scoped dashboard statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseStats {
    pub category_stats: Vec<CategoryTotal>,
    /// Sorted ascending by date
    pub daily_stats: Vec<DailyTotal>,
    pub mode_stats: Vec<ModeTotal>,
    pub total_expense: f64,
}

/// A freshly generated linking code
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCode {
    pub code: String,
    pub instruction: String,
    pub expires_at: DateTime<Utc>,
}
