//! AI backend request and response types
//!
//! These types are backend-agnostic and used across all AI implementations.

use serde::{Deserialize, Serialize};

use crate::persona::PersonaKey;
use crate::recommend::RecommendationKind;
use crate::signals::Signals;

/// Tone the rewritten copy should take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CopyRegister {
    /// Everyday educational voice
    #[default]
    Standard,
    /// Transparency, documentation and professional referral, for users with
    /// an open AML-pattern alert
    AmlReview,
}

/// Everything a backend needs to rewrite one recommendation
#[derive(Debug, Clone)]
pub struct CopyRequest {
    pub recommendation_id: String,
    pub kind: RecommendationKind,
    pub persona: PersonaKey,
    pub signals: Signals,
    pub register: CopyRegister,
    /// Deterministic copy the rewrite replaces (and falls back to)
    pub template: GeneratedCopy,
}

/// Title and rationale for one recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCopy {
    pub title: String,
    pub rationale: String,
    #[serde(default)]
    pub ai_generated: bool,
}

/// Structural limits a rewrite must respect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopyLimits {
    pub title_max_chars: usize,
    pub rationale_max_chars: usize,
}

impl Default for CopyLimits {
    fn default() -> Self {
        Self {
            title_max_chars: 60,
            rationale_max_chars: 320,
        }
    }
}
