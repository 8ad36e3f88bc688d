//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tally_core::models::{ConsentStatus, ReviewAction, Window};

/// Tally - Behavioral finance profiles with guarded, educational recommendations
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Behavioral finance profiler with persona-gated education", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Threshold config file (defaults to the data-dir override, then built-in values)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Compute as of this date (YYYY-MM-DD, default: today)
    #[arg(long, global = true)]
    pub as_of: Option<NaiveDate>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Load a JSON snapshot of users, accounts, transactions and liabilities
    Load {
        /// Snapshot file ({"users": [...]})
        file: PathBuf,
    },

    /// List users with consent and latest persona
    Users,

    /// Record a user's consent decision
    Consent {
        user: String,

        /// opt-in or opt-out
        status: ConsentStatus,
    },

    /// Show raw signals for one window
    Signals {
        user: String,

        /// Window in days: 30 or 180
        #[arg(short, long, default_value = "30")]
        window: Window,
    },

    /// Recompute and store profiles for both windows
    Profile {
        user: String,

        /// Add a plain-language explanation (uses the AI backend when configured)
        #[arg(long)]
        explain: bool,
    },

    /// Show eligible recommendations (requires consent)
    Recommend {
        user: String,

        /// Rewrite copy with the AI backend, falling back to templates
        #[arg(long)]
        ai: bool,
    },

    /// Show educational AML-pattern alerts
    Alerts { user: String },

    /// Manage the human review queue
    Review {
        #[command(subcommand)]
        action: Option<ReviewCommand>,
    },

    /// Evaluate coverage, explainability, auditability and latency over all users
    Eval {
        /// Write the full report as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Manage AI prompts
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum ReviewCommand {
    /// List review items (pending only by default)
    List {
        /// Include decided items
        #[arg(long)]
        all: bool,
    },

    /// Approve or override a pending item
    Decide {
        /// Review item ID
        id: i64,

        /// approve or override
        action: ReviewAction,

        /// Operator notes
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,

    /// Show the content of a prompt
    Show {
        /// Prompt ID (e.g., recommendation_copy)
        prompt_id: String,
    },

    /// Show the override directory path
    Path,
}
