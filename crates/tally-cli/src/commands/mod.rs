//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_db, load_config) and init/load/users/consent
//! - `profile` - Signals, profile refresh and persona explanations
//! - `recommend` - Consent-gated recommendations
//! - `review` - AML-pattern alerts and the human review queue
//! - `eval` - Offline evaluation report
//! - `prompts` - Prompt library inspection

pub mod core;
pub mod eval;
pub mod profile;
pub mod prompts;
pub mod recommend;
pub mod review;

// Re-export command functions for main.rs
pub use core::*;
pub use eval::*;
pub use profile::*;
pub use prompts::*;
pub use recommend::*;
pub use review::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
