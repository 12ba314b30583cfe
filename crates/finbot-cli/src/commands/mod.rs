//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Database init and the shared `open_db` helper
//! - `reports` - Month stats and PDF statements
//! - `serve` - Web server and bot command
//! - `users` - User listing

pub mod core;
pub mod reports;
pub mod serve;
pub mod users;

// Re-export command functions for main.rs
pub use core::*;
pub use reports::*;
pub use serve::*;
pub use users::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
