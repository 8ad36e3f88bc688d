//! Test utilities for tally-core
//!
//! Provides a mock OpenAI-compatible server so the real HTTP backend can be
//! exercised end to end, including slow, failing and malformed responses.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::guardrails::STANDARD_DISCLOSURE;

/// How the mock server answers chat completion requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockServerBehavior {
    /// Well-formed copy that passes validation
    #[default]
    Valid,
    /// Prose with no JSON object
    Malformed,
    /// HTTP 500 on every completion
    ServerError,
    /// Copy that uses banned language
    Shaming,
    /// Sleep before answering validly
    Slow(Duration),
}

#[derive(Clone)]
struct ServerState {
    behavior: MockServerBehavior,
    completions: Arc<AtomicUsize>,
}

/// Mock OpenAI-compatible server for testing and development
pub struct MockOpenAIServer {
    addr: SocketAddr,
    completions: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOpenAIServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(MockServerBehavior::Valid).await
    }

    /// Start the mock server with a specific behavior
    pub async fn start_with(behavior: MockServerBehavior) -> Self {
        let completions = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            behavior,
            completions: completions.clone(),
        };

        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            completions,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of chat completion requests received so far
    pub fn completion_count(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOpenAIServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Model listing (health check)
async fn handle_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        object: "list".to_string(),
        data: vec![ModelInfo {
            id: "gpt-4o-mini".to_string(),
            object: "model".to_string(),
        }],
    })
}

async fn handle_chat(State(state): State<ServerState>, Json(request): Json<ChatRequest>) -> Response {
    state.completions.fetch_add(1, Ordering::SeqCst);

    let user = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    let is_explanation = !user.contains("Recommendation id:");

    let content = match state.behavior {
        MockServerBehavior::ServerError => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded").into_response();
        }
        MockServerBehavior::Malformed => "Sure! Here is a friendlier version of your tip.".to_string(),
        MockServerBehavior::Shaming => serde_json::json!({
            "title": "Stop overspending today",
            "rationale": format!("Your spending is irresponsible. {}", STANDARD_DISCLOSURE),
        })
        .to_string(),
        MockServerBehavior::Slow(delay) => {
            tokio::time::sleep(delay).await;
            valid_content(user, is_explanation)
        }
        MockServerBehavior::Valid => valid_content(user, is_explanation),
    };

    Json(ChatResponse {
        id: "chatcmpl-mock".to_string(),
        model: request.model,
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason: "stop".to_string(),
        }],
    })
    .into_response()
}

/// Copy for recommendation prompts, plain text for persona explanations
fn valid_content(user: &str, is_explanation: bool) -> String {
    if is_explanation {
        let persona = field(user, "Persona:").unwrap_or("your persona");
        return format!(
            "You were matched to {} based on your recent activity. This is a starting point for learning, not a judgment.",
            persona
        );
    }

    let title = field(user, "Current title:").unwrap_or("A next step that fits");
    let copy = serde_json::json!({
        "title": title,
        "rationale": format!("Here is a small step based on your recent activity. {}", STANDARD_DISCLOSURE),
    });
    format!("```json\n{}\n```", copy)
}

/// Value following `label` on its line
fn field<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    id: String,
    model: String,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
struct ChatChoice {
    index: u32,
    message: ChatMessage,
    finish_reason: String,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    object: String,
    data: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    id: String,
    object: String,
}
