//! Copy writers
//!
//! `TemplateCopyWriter` returns the deterministic template unchanged.
//! `AiCopyWriter` wraps an [`AIBackend`] with the same contract: each attempt
//! is bounded by a timeout, retries back off exponentially, and anything short
//! of valid copy falls back to the template.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::CopyConfig;
use crate::persona::Persona;
use crate::signals::Signals;

use super::types::{CopyLimits, CopyRequest, GeneratedCopy};
use super::{AIBackend, AIClient};

/// Produces title and rationale for a recommendation; never fails
#[async_trait]
pub trait CopyWriter: Send + Sync {
    async fn write_copy(&self, request: &CopyRequest) -> GeneratedCopy;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Deterministic writer: the template is the copy
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateCopyWriter;

#[async_trait]
impl CopyWriter for TemplateCopyWriter {
    async fn write_copy(&self, request: &CopyRequest) -> GeneratedCopy {
        request.template.clone()
    }

    fn name(&self) -> &str {
        "template"
    }
}

/// AI writer with silent fallback to the template
pub struct AiCopyWriter<B: AIBackend> {
    backend: B,
    fallback: TemplateCopyWriter,
    timeout: Duration,
    max_attempts: u32,
    config: CopyConfig,
}

impl<B: AIBackend> AiCopyWriter<B> {
    pub fn new(backend: B, config: &CopyConfig) -> Self {
        Self {
            backend,
            fallback: TemplateCopyWriter,
            timeout: config.timeout(),
            max_attempts: config.max_attempts.max(1),
            config: config.clone(),
        }
    }

    /// Override the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn limits(&self) -> CopyLimits {
        CopyLimits {
            title_max_chars: self.config.title_max_chars,
            rationale_max_chars: self.config.rationale_max_chars,
        }
    }
}

#[async_trait]
impl<B: AIBackend> CopyWriter for AiCopyWriter<B> {
    async fn write_copy(&self, request: &CopyRequest) -> GeneratedCopy {
        let limits = self.limits();

        for attempt in 1..=self.max_attempts {
            let call = self.backend.write_recommendation_copy(request, &limits);
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(copy)) => {
                    debug!(id = %request.recommendation_id, model = self.backend.model(), "AI copy accepted");
                    return copy;
                }
                Ok(Err(e)) => {
                    warn!(id = %request.recommendation_id, attempt, "AI copy failed: {}", e);
                }
                Err(_) => {
                    warn!(
                        id = %request.recommendation_id,
                        attempt,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "AI copy timed out"
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }
        }

        self.fallback.write_copy(request).await
    }

    fn name(&self) -> &str {
        "ai"
    }
}

/// Pick the writer for a request: AI when asked for and configured, template otherwise
pub fn copy_writer(use_ai: bool, ai: Option<AIClient>, config: &CopyConfig) -> Box<dyn CopyWriter> {
    match (use_ai, ai) {
        (true, Some(client)) => Box::new(AiCopyWriter::new(client, config)),
        (true, None) => {
            warn!("AI copy requested but no backend is configured; using templates");
            Box::new(TemplateCopyWriter)
        }
        (false, _) => Box::new(TemplateCopyWriter),
    }
}

/// AI explanation of a persona, or the raw reason when AI is unavailable
pub async fn explain_persona_or_reason<B: AIBackend + ?Sized>(
    ai: Option<&B>,
    persona: &Persona,
    signals: &Signals,
    timeout: Duration,
) -> String {
    let Some(backend) = ai else {
        return persona.reason.clone();
    };

    match tokio::time::timeout(timeout, backend.explain_persona(persona, signals)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("Persona explanation failed: {}", e);
            persona.reason.clone()
        }
        Err(_) => {
            warn!("Persona explanation timed out");
            persona.reason.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::CopyRegister;
    use crate::ai::{MockBackend, MockResponse};
    use crate::guardrails::STANDARD_DISCLOSURE;
    use crate::persona::PersonaKey;
    use crate::recommend::RecommendationKind;

    fn request(register: CopyRegister) -> CopyRequest {
        CopyRequest {
            recommendation_id: "edu-apy".to_string(),
            kind: RecommendationKind::Education,
            persona: PersonaKey::SavingsBuilder,
            signals: Signals::default(),
            register,
            template: GeneratedCopy {
                title: "Pick a high-yield savings account".to_string(),
                rationale: format!("Savings inflow $250/mo; growth 5.0%. {}", STANDARD_DISCLOSURE),
                ai_generated: false,
            },
        }
    }

    fn writer(response: MockResponse) -> AiCopyWriter<MockBackend> {
        AiCopyWriter::new(MockBackend::with_response(response), &CopyConfig::default())
            .with_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_template_writer_is_identity() {
        let req = request(CopyRegister::Standard);
        assert_eq!(TemplateCopyWriter.write_copy(&req).await, req.template);
    }

    #[tokio::test]
    async fn test_ai_writer_uses_backend_copy() {
        let copy = writer(MockResponse::Valid)
            .write_copy(&request(CopyRegister::Standard))
            .await;
        assert!(copy.ai_generated);
        assert!(copy.rationale.contains(STANDARD_DISCLOSURE));
    }

    #[tokio::test]
    async fn test_ai_writer_shifts_register_for_aml() {
        let standard = writer(MockResponse::Valid)
            .write_copy(&request(CopyRegister::Standard))
            .await;
        let aml = writer(MockResponse::Valid)
            .write_copy(&request(CopyRegister::AmlReview))
            .await;
        assert_ne!(standard.rationale, aml.rationale);
        assert!(aml.rationale.contains("licensed professional"));
    }

    #[tokio::test]
    async fn test_ai_writer_falls_back_on_failure_malformed_and_timeout() {
        let req = request(CopyRegister::Standard);
        for response in [MockResponse::Fail, MockResponse::Malformed, MockResponse::Hang] {
            let copy = writer(response).write_copy(&req).await;
            assert_eq!(copy, req.template, "no fallback for {:?}", response);
            assert!(!copy.ai_generated);
        }
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let config = CopyConfig {
            max_attempts: 3,
            backoff_ms: 1,
            ..CopyConfig::default()
        };
        let writer = AiCopyWriter::new(MockBackend::with_response(MockResponse::Hang), &config)
            .with_timeout(Duration::from_millis(20));

        let started = std::time::Instant::now();
        let req = request(CopyRegister::Standard);
        assert_eq!(writer.write_copy(&req).await, req.template);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_copy_writer_selection() {
        let config = CopyConfig::default();
        assert_eq!(copy_writer(false, Some(AIClient::mock()), &config).name(), "template");
        assert_eq!(copy_writer(true, None, &config).name(), "template");
        assert_eq!(copy_writer(true, Some(AIClient::mock()), &config).name(), "ai");
    }

    #[tokio::test]
    async fn test_explain_persona_falls_back_to_reason() {
        let persona = Persona {
            key: PersonaKey::HighUtilization,
            reason: "util_max=68%, interest=true, min_pay_only=false, overdue=false".to_string(),
            priority: 1,
        };
        let signals = Signals::default();
        let timeout = Duration::from_millis(100);

        let none: Option<&MockBackend> = None;
        assert_eq!(explain_persona_or_reason(none, &persona, &signals, timeout).await, persona.reason);

        let failing = MockBackend::unhealthy();
        assert_eq!(
            explain_persona_or_reason(Some(&failing), &persona, &signals, timeout).await,
            persona.reason
        );

        let ok = MockBackend::new();
        let text = explain_persona_or_reason(Some(&ok), &persona, &signals, timeout).await;
        assert!(text.contains("High Utilization"));
    }
}
