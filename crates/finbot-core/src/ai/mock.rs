//! Mock backend for testing
//!
//! A deterministic keyword classifier standing in for a real model. Useful
//! for unit tests and for running the bot locally without an API key.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::{ExpenseCandidate, ExtractionInput};
use super::AIBackend;

const KEYWORDS: &[(&str, &[&str])] = &[
    ("Fuel", &["petrol", "diesel", "fuel", "cng"]),
    ("Travel", &["uber", "ola", "cab", "taxi", "train", "bus", "metro", "flight", "auto"]),
    ("Groceries", &["vegetable", "vegetables", "ration", "grocery", "groceries", "milk", "sabzi"]),
    ("Food", &["momos", "pizza", "burger", "lunch", "dinner", "breakfast", "tea", "coffee", "chai", "samosa", "thali", "restaurant", "cafe"]),
    ("Bills", &["electricity", "rent", "wifi", "internet", "recharge", "bill"]),
    ("Health", &["medicine", "doctor", "pharmacy", "hospital", "gym"]),
    ("Education", &["book", "books", "course", "fees", "tuition"]),
    ("Entertainment", &["movie", "netflix", "concert", "game", "spotify"]),
    ("Shopping", &["shirt", "shoes", "amazon", "flipkart", "clothes", "jeans"]),
];

const ONLINE_HINTS: &[&str] = &["gpay", "upi", "online", "paytm", "phonepe", "card", "netbanking"];

#[derive(Clone)]
enum Behavior {
    Keywords,
    Fixed(ExpenseCandidate),
    Fail,
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Keyword classifier, healthy
    pub fn new() -> Self {
        Self {
            healthy: true,
            behavior: Behavior::Keywords,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always returns `candidate`, whatever the input
    pub fn with_response(candidate: ExpenseCandidate) -> Self {
        Self {
            behavior: Behavior::Fixed(candidate),
            ..Self::new()
        }
    }

    /// Every extraction fails, as if the model returned garbage
    pub fn failing() -> Self {
        Self {
            healthy: false,
            behavior: Behavior::Fail,
            ..Self::new()
        }
    }

    /// Number of extraction calls made through this backend (shared across clones)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn classify(text: &str) -> ExpenseCandidate {
        let lower = text.to_lowercase();
        let words: Vec<&str> = text.split_whitespace().collect();

        let amount = words
            .iter()
            .find_map(|w| w.trim_start_matches(['₹', '$']).parse::<f64>().ok());

        let item_words: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| w.trim_start_matches(['₹', '$']).parse::<f64>().is_err())
            .filter(|w| !ONLINE_HINTS.contains(&w.to_lowercase().as_str()))
            .filter(|w| !matches!(w.to_lowercase().as_str(), "rs" | "rs." | "for" | "on" | "spent" | "via" | "se" | "ka"))
            .collect();
        let item = (!item_words.is_empty()).then(|| item_words.join(" "));

        let category = KEYWORDS
            .iter()
            .find(|(_, keys)| {
                lower
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|w| keys.contains(&w))
            })
            .map(|(category, _)| category.to_string())
            .unwrap_or_else(|| "General".to_string());

        let mode = if ONLINE_HINTS.iter().any(|hint| lower.contains(hint)) {
            "Online"
        } else {
            "Cash"
        };

        ExpenseCandidate {
            item,
            amount,
            category: Some(category),
            mode: Some(mode.to_string()),
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn extract_expense(&self, input: &ExtractionInput) -> Result<ExpenseCandidate> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Fail => Err(Error::InvalidData("No JSON found in AI response".into())),
            Behavior::Fixed(candidate) => Ok(candidate.clone()),
            Behavior::Keywords => {
                let text = input.trimmed_text().unwrap_or("");
                if input.image.is_some() && text.is_empty() {
                    // Nothing to read without a caption
                    return Ok(ExpenseCandidate::default());
                }
                Ok(Self::classify(text))
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
