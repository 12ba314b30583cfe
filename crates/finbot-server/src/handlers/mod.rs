//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod auth;
pub mod events;
pub mod expenses;
pub mod profile;
pub mod reports;

// Re-export all handlers for use in router
pub use auth::*;
pub use events::*;
pub use expenses::*;
pub use profile::*;
pub use reports::*;
