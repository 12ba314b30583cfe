//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap their JSON in markdown fences or chatter before and
//! after the payload. These helpers cut the payload out before parsing.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

use super::types::ExpenseCandidate;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json|JSON)?").expect("valid fence regex"))
}

/// Remove markdown code fences (```json ... ```)
pub fn strip_fences(response: &str) -> String {
    fence_regex().replace_all(response, "").trim().to_string()
}

fn truncate(raw: &str) -> String {
    if raw.chars().count() > 200 {
        format!("{}...", raw.chars().take(200).collect::<String>())
    } else {
        raw.to_string()
    }
}

/// Slice out the outermost `{...}` object
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| &response[start..=end])
}

/// Parse an expense candidate from raw model output
pub fn parse_candidate(response: &str) -> Result<ExpenseCandidate> {
    let cleaned = strip_fences(response);

    let json_str = extract_json_object(&cleaned).ok_or_else(|| {
        Error::InvalidData(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(&cleaned)
        ))
    })?;

    serde_json::from_str(json_str).map_err(|e| {
        Error::InvalidData(format!(
            "Invalid JSON from AI: {} | Raw: {}",
            e,
            truncate(json_str)
        ))
    })
}
