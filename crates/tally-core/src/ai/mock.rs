//! Mock backend for testing
//!
//! Produces deterministic copy without a network. The response mode can be
//! switched to exercise every fallback path of the copy writer.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::guardrails::STANDARD_DISCLOSURE;
use crate::persona::Persona;
use crate::signals::Signals;

use super::parsing::{parse_copy_response, parse_explanation};
use super::types::{CopyLimits, CopyRegister, CopyRequest, GeneratedCopy};
use super::AIBackend;

/// How the mock answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockResponse {
    /// Well-formed copy in the requested register
    #[default]
    Valid,
    /// Backend error
    Fail,
    /// Text with no JSON payload
    Malformed,
    /// Never answers within any reasonable timeout
    Hang,
    /// Structurally valid copy containing banned language
    Shaming,
}

/// Mock AI backend for testing
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    pub response: MockResponse,
}

impl MockBackend {
    /// Create a new mock backend (healthy, valid responses)
    pub fn new() -> Self {
        Self {
            healthy: true,
            response: MockResponse::Valid,
        }
    }

    /// Create an unhealthy mock backend that fails every request
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            response: MockResponse::Fail,
        }
    }

    pub fn with_response(response: MockResponse) -> Self {
        Self {
            healthy: true,
            response,
        }
    }

    fn raw_copy(&self, request: &CopyRequest) -> Option<String> {
        let (title, rationale) = match (self.response, request.register) {
            (MockResponse::Shaming, _) => (
                "Stop overspending today".to_string(),
                format!("Your habits look irresponsible. {}", STANDARD_DISCLOSURE),
            ),
            (_, CopyRegister::AmlReview) => (
                "Keep clear records and get a second look".to_string(),
                format!(
                    "Keeping notes on large transfers makes your activity easy to explain, and a licensed professional can review it with you. {}",
                    STANDARD_DISCLOSURE
                ),
            ),
            (_, CopyRegister::Standard) => (
                request.template.title.clone(),
                format!("Based on your recent activity: {}", request.template.rationale),
            ),
        };
        serde_json::to_string(&serde_json::json!({
            "title": title,
            "rationale": rationale,
        }))
        .ok()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn write_recommendation_copy(
        &self,
        request: &CopyRequest,
        limits: &CopyLimits,
    ) -> Result<GeneratedCopy> {
        match self.response {
            MockResponse::Fail => Err(Error::AiUnavailable("mock backend failure".into())),
            MockResponse::Malformed => parse_copy_response("I'd rather not answer in JSON.", limits),
            MockResponse::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::AiUnavailable("mock backend hung".into()))
            }
            MockResponse::Valid | MockResponse::Shaming => {
                let raw = self
                    .raw_copy(request)
                    .ok_or_else(|| Error::InvalidData("mock copy did not serialize".into()))?;
                parse_copy_response(&raw, limits)
            }
        }
    }

    async fn explain_persona(&self, persona: &Persona, _signals: &Signals) -> Result<String> {
        match self.response {
            MockResponse::Fail | MockResponse::Malformed => {
                Err(Error::AiUnavailable("mock backend failure".into()))
            }
            MockResponse::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::AiUnavailable("mock backend hung".into()))
            }
            MockResponse::Valid | MockResponse::Shaming => parse_explanation(&format!(
                "You fit the {} profile because {}.",
                persona.key.label(),
                persona.reason
            )),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
