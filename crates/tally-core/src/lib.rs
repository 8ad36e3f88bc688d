//! Tally Core Library
//!
//! Shared functionality for the tally behavioral finance profiler:
//! - Signal extraction over 30/180-day windows
//! - Persona classification via an ordered rule cascade
//! - Consent, eligibility and tone guardrails
//! - Persona-gated recommendations with mandatory disclosures
//! - Educational AML-pattern heuristics for human review
//! - Pluggable AI copy backends with deterministic fallback
//! - SQLite store for snapshots, profiles and the review queue

pub mod ai;
pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod evaluation;
pub mod guardrails;
pub mod models;
pub mod persona;
pub mod profile;
pub mod prompts;
pub mod recommend;
pub mod signals;

/// Test utilities including mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, AiCopyWriter, CopyWriter, MockBackend, TemplateCopyWriter};
pub use alerts::{aml_educational_alerts, AlertReport, AlertSeverity, AML_EDU_DISCLOSURE};
pub use config::TallyConfig;
pub use db::{Database, FinancialStore};
pub use error::{Error, Result};
pub use guardrails::{eligible, enforce_consent, tone_check, EligibilityContext, STANDARD_DISCLOSURE};
pub use models::{UserSnapshot, Window};
pub use persona::{assign_persona, Persona, PersonaKey};
pub use profile::{DecisionTrace, ProfileService};
pub use recommend::{recommendations_for, RecommendationContext, RecommendationItem};
pub use signals::{compute_signals, Signals};
