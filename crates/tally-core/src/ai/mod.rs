//! Pluggable AI backend abstraction
//!
//! AI only ever rewrites text that tally already produced deterministically.
//! Every caller goes through a [`CopyWriter`], which falls back to the
//! deterministic template whenever a backend fails, times out or returns
//! malformed output.
//!
//! # Architecture
//!
//! - `AIBackend` trait: the interface every backend implements
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//! - `CopyWriter` trait: `TemplateCopyWriter` and the `AiCopyWriter` decorator
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai_compatible, mock). Default: openai_compatible
//! - `OPENAI_COMPATIBLE_HOST`, `OPENAI_COMPATIBLE_MODEL`, `OPENAI_COMPATIBLE_API_KEY`
//! - `OPENAI_API_KEY`: hosted OpenAI when no compatible host is set

mod copy;
mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use copy::{copy_writer, explain_persona_or_reason, AiCopyWriter, CopyWriter, TemplateCopyWriter};
pub use mock::{MockBackend, MockResponse};
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;
use crate::persona::Persona;
use crate::signals::Signals;

/// Trait defining the interface for all AI backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Rewrite one recommendation's title and rationale
    ///
    /// Implementations validate the result against `limits` and the
    /// disclosure requirement before returning it.
    async fn write_recommendation_copy(
        &self,
        request: &CopyRequest,
        limits: &CopyLimits,
    ) -> Result<GeneratedCopy>;

    /// Plain-language explanation of an assigned persona
    async fn explain_persona(&self, persona: &Persona, signals: &Signals) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI-compatible backend (hosted OpenAI, vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None if the selected backend is not configured.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to openai_compatible");
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
        }
    }

    /// Create an OpenAI-compatible backend directly
    pub fn openai_compatible(host: &str, model: &str) -> Self {
        AIClient::OpenAICompatible(OpenAICompatibleBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Bound HTTP requests made by the backend; the mock has nothing to bound
    pub fn with_request_timeout(self, timeout: std::time::Duration) -> Self {
        match self {
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_request_timeout(timeout)),
            mock @ AIClient::Mock(_) => mock,
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn write_recommendation_copy(
        &self,
        request: &CopyRequest,
        limits: &CopyLimits,
    ) -> Result<GeneratedCopy> {
        match self {
            AIClient::OpenAICompatible(b) => b.write_recommendation_copy(request, limits).await,
            AIClient::Mock(b) => b.write_recommendation_copy(request, limits).await,
        }
    }

    async fn explain_persona(&self, persona: &Persona, signals: &Signals) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.explain_persona(persona, signals).await,
            AIClient::Mock(b) => b.explain_persona(persona, signals).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
