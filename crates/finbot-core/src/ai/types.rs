//! AI backend request/response types
//!
//! These types are backend-agnostic and used across all AI implementations.

use serde::{Deserialize, Deserializer, Serialize};

/// Input to one extraction call
///
/// An image takes precedence; `text` then travels along as a caption.
#[derive(Debug, Clone, Default)]
pub struct ExtractionInput {
    pub text: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl ExtractionInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(image: Vec<u8>, caption: Option<String>) -> Self {
        Self {
            text: caption,
            image: Some(image),
        }
    }

    /// Text with surrounding whitespace removed, if any remains
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.image.as_ref().map_or(true, |i| i.is_empty()) && self.trimmed_text().is_none()
    }
}

/// Structured expense guess returned by a model
///
/// Every field may be missing; the ingestion pipeline decides what is
/// acceptable for each input path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseCandidate {
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

/// Accept a JSON number or a bare numeric string
///
/// Strings carrying currency symbols or separators (`"₹150"`, `"1,200"`)
/// are malformed and fail the whole candidate.
fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    match Option::<RawAmount>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawAmount::Number(n)) => Ok(Some(n)),
        Some(RawAmount::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("malformed amount: {:?}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_number_or_numeric_string() {
        let c: ExpenseCandidate = serde_json::from_str(r#"{"item":"Momos","amount":100}"#).unwrap();
        assert_eq!(c.amount, Some(100.0));

        let c: ExpenseCandidate = serde_json::from_str(r#"{"amount":"250.5"}"#).unwrap();
        assert_eq!(c.amount, Some(250.5));
        assert!(c.item.is_none());
    }

    #[test]
    fn test_amount_with_symbol_is_malformed() {
        let result = serde_json::from_str::<ExpenseCandidate>(r#"{"item":"Tea","amount":"₹150"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_null_and_missing_amount() {
        let c: ExpenseCandidate = serde_json::from_str(r#"{"item":"Tea","amount":null}"#).unwrap();
        assert!(c.amount.is_none());
        let c: ExpenseCandidate = serde_json::from_str(r#"{"item":"Tea"}"#).unwrap();
        assert!(c.amount.is_none());
    }

    #[test]
    fn test_input_emptiness() {
        assert!(ExtractionInput::default().is_empty());
        assert!(ExtractionInput::text("   ").is_empty());
        assert!(!ExtractionInput::text("100 momos").is_empty());
        assert!(!ExtractionInput::image(vec![1, 2, 3], None).is_empty());
        assert!(ExtractionInput::image(vec![], None).is_empty());
    }
}
