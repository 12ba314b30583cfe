//! Error types for FinBot

use thiserror::Error;

/// Which chat input an extraction failure came from
///
/// The two paths surface different user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Text,
    Photo,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("{0}")]
    Validation(String),

    #[error("Chat is not linked to a FinBot account")]
    NotLinked,

    #[error("Could not extract an expense from the {0:?} input")]
    ExtractionFailed(ExtractionSource),

    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,

    #[error("Expense not found or unauthorized")]
    NotFoundOrUnauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Upstream transport error: {0}")]
    Upstream(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
