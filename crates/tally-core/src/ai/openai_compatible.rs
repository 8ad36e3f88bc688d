//! OpenAI-compatible backend implementation
//!
//! Works with the hosted OpenAI API and any server that implements the chat
//! completions API (vLLM, LocalAI, llama-server, Docker Model Runner).
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)
//! - `OPENAI_API_KEY`: When no host is set, selects https://api.openai.com

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::guardrails::STANDARD_DISCLOSURE;
use crate::persona::Persona;
use crate::prompts::{PromptId, PromptLibrary};
use crate::signals::Signals;

use super::parsing::{parse_copy_response, parse_explanation};
use super::types::{CopyLimits, CopyRegister, CopyRequest, GeneratedCopy};
use super::AIBackend;

const OPENAI_HOST: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 200;
/// Same as the default `copy.timeout_secs`
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

fn http_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
        Client::new()
    })
}

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: http_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Bound every HTTP request, health checks included
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.http_client = http_client(timeout);
        self
    }

    /// Use a specific prompt library (tests, custom override dirs)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create from environment variables
    ///
    /// `OPENAI_COMPATIBLE_HOST` wins; otherwise `OPENAI_API_KEY` selects the
    /// hosted API. Returns None when neither is set.
    pub fn from_env() -> Option<Self> {
        let model =
            std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        if let Ok(host) = std::env::var("OPENAI_COMPATIBLE_HOST") {
            let mut backend = Self::new(&host, &model);
            backend.api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY").ok();
            return Some(backend);
        }

        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        Some(Self::with_api_key(OPENAI_HOST, &model, &api_key))
    }

    fn render(&self, id: PromptId, vars: &HashMap<&str, String>) -> Result<(String, String)> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        let template = prompts.get(id)?;
        Ok((template.render_system(vars), template.render_user(vars)))
    }

    /// Make a chat completion request
    async fn chat_completion(&self, system: &str, user: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user.to_string(),
        });

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AiUnavailable(format!("OpenAI API error {}: {}", status, body)));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::AiUnavailable("No response from OpenAI API".into()))
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn write_recommendation_copy(
        &self,
        request: &CopyRequest,
        limits: &CopyLimits,
    ) -> Result<GeneratedCopy> {
        let prompt_id = match request.register {
            CopyRegister::Standard => PromptId::RecommendationCopy,
            CopyRegister::AmlReview => PromptId::RecommendationCopyAml,
        };

        let mut vars = HashMap::new();
        vars.insert("id", request.recommendation_id.clone());
        vars.insert("kind", request.kind.as_str().to_string());
        vars.insert("persona", request.persona.as_str().to_string());
        vars.insert("title", request.template.title.clone());
        vars.insert("rationale", request.template.rationale.clone());
        vars.insert("signals", serde_json::to_string_pretty(&request.signals)?);
        vars.insert("disclosure", STANDARD_DISCLOSURE.to_string());
        vars.insert("title_max", limits.title_max_chars.to_string());
        vars.insert("rationale_max", limits.rationale_max_chars.to_string());

        let (system, user) = self.render(prompt_id, &vars)?;
        let response = self.chat_completion(&system, &user).await?;
        debug!(id = %request.recommendation_id, "OpenAI-compatible copy response: {}", response);

        parse_copy_response(&response, limits)
    }

    async fn explain_persona(&self, persona: &Persona, signals: &Signals) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("persona", persona.key.as_str().to_string());
        vars.insert("label", persona.key.label().to_string());
        vars.insert("reason", persona.reason.clone());
        vars.insert("signals", serde_json::to_string_pretty(signals)?);

        let (system, user) = self.render(PromptId::ExplainPersona, &vars)?;
        let response = self.chat_completion(&system, &user).await?;
        debug!("OpenAI-compatible persona explanation: {}", response);

        parse_explanation(&response)
    }

    async fn health_check(&self) -> bool {
        let mut req_builder = self.http_client.get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        match req_builder.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
