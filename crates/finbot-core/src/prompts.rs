//! Prompt library for expense extraction
//!
//! Prompts are resolved in two layers:
//! 1. An override file in `FINBOT_PROMPTS_DIR` (if set and present)
//! 2. The embedded default compiled into the binary
//!
//! Templates use `{{var}}` placeholders. `{{categories}}` is always filled
//! from [`Category::prompt_list`] so prompts cannot drift from the closed set.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::models::Category;

/// Environment variable naming the override directory
pub const PROMPTS_DIR_ENV: &str = "FINBOT_PROMPTS_DIR";

mod defaults {
    pub const EXTRACT_EXPENSE: &str = include_str!("../../../prompts/extract_expense.md");
    pub const EXTRACT_RECEIPT: &str = include_str!("../../../prompts/extract_receipt.md");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Free-text chat message → expense JSON
    ExtractExpense,
    /// Receipt photo (plus caption) → expense JSON
    ExtractReceipt,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractExpense => "extract_expense",
            Self::ExtractReceipt => "extract_receipt",
        }
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::ExtractExpense => defaults::EXTRACT_EXPENSE,
            Self::ExtractReceipt => defaults::EXTRACT_RECEIPT,
        }
    }
}

/// Loads prompt templates, honouring on-disk overrides
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Library with the override directory taken from `FINBOT_PROMPTS_DIR`
    pub fn from_env() -> Self {
        Self {
            override_dir: std::env::var(PROMPTS_DIR_ENV).ok().map(PathBuf::from),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
        }
    }

    /// Embedded defaults only
    pub fn embedded_only() -> Self {
        Self { override_dir: None }
    }

    fn load(&self, id: PromptId) -> Result<String> {
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.md", id.as_str()));
            if path.exists() {
                return fs::read_to_string(&path).map_err(|e| {
                    Error::InvalidData(format!(
                        "Failed to read prompt override {}: {}",
                        path.display(),
                        e
                    ))
                });
            }
        }
        Ok(id.default_content().to_string())
    }

    /// Render a prompt with `{{var}}` placeholders replaced
    pub fn render(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<String> {
        let mut result = self.load(id)?;

        let categories = Category::prompt_list();
        result = result.replace("{{categories}}", &categories);

        for (key, value) in vars {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, value);
        }

        Ok(result)
    }

    /// Prompt for a free-text expense message
    pub fn expense_prompt(&self, text: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("text", text);
        self.render(PromptId::ExtractExpense, &vars)
    }

    /// Prompt for a receipt photo with an optional caption
    pub fn receipt_prompt(&self, caption: Option<&str>) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("caption", caption.unwrap_or(""));
        self.render(PromptId::ExtractReceipt, &vars)
    }
}
