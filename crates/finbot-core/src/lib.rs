//! FinBot Core Library
//!
//! Shared functionality for the FinBot expense tracker:
//! - Domain models and the closed category set
//! - Database access (SQLCipher via a pooled connection)
//! - Pluggable AI backends for expense extraction (Gemini, Ollama, mock)
//! - Ingestion pipeline for manual, chat-text and chat-photo input
//! - Account linking and password-reset codes
//! - Month-scoped statistics and PDF statements
//! - Per-user notification fan-out

pub mod ai;
pub mod auth;
pub mod db;
pub mod error;
pub mod ingest;
pub mod linking;
pub mod models;
pub mod notify;
pub mod prompts;
pub mod statement;
pub mod stats;

/// Test utilities including a mock model server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, ExpenseCandidate, ExtractionInput, Extractor, MockBackend};
pub use db::Database;
pub use error::{Error, ExtractionSource, Result};
pub use ingest::{Ingestor, ManualEntry};
pub use models::{
    Category, CategoryTotal, DailyTotal, Expense, ExpenseSource, ExpenseStats, LinkCode,
    ModeTotal, MonthRange, PaymentMode, User,
};
pub use notify::{ExpenseEvent, Notifier};
pub use prompts::{PromptId, PromptLibrary};
pub use statement::{format_amount, Statement};
pub use stats::StatsEngine;
