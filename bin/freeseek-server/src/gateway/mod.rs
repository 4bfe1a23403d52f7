//! Completion gateway: the boundary to the external LLM API.
//!
//! The API is abstracted as "submit the role-tagged turns, receive a channel
//! of incremental text deltas ending in [`CompletionEvent::Done`] or
//! [`CompletionEvent::Error`]". [`OpenAiGateway`] is the production
//! implementation speaking the OpenAI-compatible chat-completions protocol;
//! relay tests substitute a scripted implementation of [`CompletionGateway`].

mod stream;

use std::future::Future;

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use freeseek_types::Role;

/// One role-tagged turn of conversation context.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Events produced while a completion streams in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// One incremental fragment of generated text.
    Delta(String),
    /// Natural end of the stream.
    Done,
    /// The stream broke; no further events follow.
    Error(String),
}

/// Failures raised before any delta has been relayed.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("completion API rejected the credentials")]
    Auth,

    #[error("completion API rate limited the request")]
    RateLimited,

    #[error("completion API timed out")]
    Timeout,

    #[error("completion request failed: {0}")]
    Request(String),
}

pub trait CompletionGateway: Send + Sync + 'static {
    /// Submit the full prior context and start streaming. Errors returned
    /// here happen before any response bytes, so callers can still answer
    /// with a plain HTTP status.
    fn open(
        &self,
        turns: Vec<Turn>,
    ) -> impl Future<Output = Result<mpsc::Receiver<CompletionEvent>, GatewayError>> + Send;
}

/// How many deltas may queue between the parser task and the relay before
/// the parser suspends.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Gateway for OpenAI-compatible chat-completion APIs (DeepSeek, OpenAI,
/// llama.cpp servers, …).
#[derive(Clone)]
pub struct OpenAiGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiGateway {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
        }
    }
}

impl CompletionGateway for OpenAiGateway {
    async fn open(
        &self,
        turns: Vec<Turn>,
    ) -> Result<mpsc::Receiver<CompletionEvent>, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: self.model.clone(),
            messages: turns,
            stream: true,
        };

        let mut req = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            req = req.header(AUTHORIZATION, format!("Bearer {}", self.api_key));
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GatewayError::Auth);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Request(error_message(status, &body)));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(stream::relay_sse_body(response, tx));
        Ok(rx)
    }
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return format!("HTTP {}: {}", status.as_u16(), parsed.error.message);
    }
    format!("HTTP {}: request failed", status.as_u16())
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<Turn>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChunk {
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkChoice {
    pub delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkDelta {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ── Tests ──────────────────────────────────────────────────────────────────────
