//! Error types for tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Consent is missing or not opted in; the caller must not show recommendations
    #[error("Consent required: user {0} has not opted in")]
    ConsentRequired(String),

    /// A title or rationale matched a banned-language pattern
    #[error("Tone violation in {id}: matched /{pattern}/")]
    ToneViolation { id: String, pattern: String },

    /// The copy collaborator could not produce usable text
    #[error("AI backend unavailable: {0}")]
    AiUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this error should be surfaced to an end user as an actionable message
    pub fn is_consent_required(&self) -> bool {
        matches!(self, Self::ConsentRequired(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
