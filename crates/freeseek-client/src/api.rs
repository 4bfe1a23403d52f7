//! Remote backend: talks to a freeseek-server instance.
//!
//! Plain REST for account and chat management, plus the streaming turn
//! request that reads the server's SSE frames incrementally. A transport
//! error mid-stream (including an abruptly terminated body, the server's
//! only failure signal once the stream has started) fails the turn; a clean
//! close is natural completion.

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use freeseek_types::sse::SseDecoder;
use freeseek_types::{ChatPayload, StreamFrame, TokenPayload};

use crate::error::ClientError;
use crate::session::Backend;

#[derive(Clone)]
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SignupBody<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateChatBody<'a> {
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct TurnBody<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl RemoteBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: None,
        }
    }

    /// Resume a session with a previously issued token.
    pub fn with_token(base_url: &str, token: &str) -> Self {
        let mut backend = Self::new(base_url);
        backend.token = Some(token.to_owned());
        backend
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/signup"))
            .json(&SignupBody {
                username,
                email,
                password,
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Log in and keep the issued token for subsequent requests.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&LoginBody { username, password })
            .send()
            .await?;
        let body: TokenPayload = Self::check(response).await?.json().await?;
        self.token = Some(body.token);
        Ok(())
    }

    pub async fn create_chat(&self, title: &str) -> Result<ChatPayload, ClientError> {
        let response = self
            .authorized(self.client.post(self.url("/chats")))?
            .json(&CreateChatBody { title })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ClientError::Auth("not logged in".into()))?;
        Ok(req.bearer_auth(token))
    }

    /// Map non-success statuses onto the error taxonomy, preferring the
    /// server's own `{"error": …}` message when the body carries one.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .ok()
            .and_then(|body| parse_error_message(&body))
            .unwrap_or_else(|| "request failed".to_owned());
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Auth(message));
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error)
}

impl Backend for RemoteBackend {
    async fn load_chats(&self) -> Result<Vec<ChatPayload>, ClientError> {
        let response = self
            .authorized(self.client.get(self.url("/chats")))?
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn stream_turn<F>(
        &self,
        chat_id: Option<&str>,
        content: &str,
        mut on_frame: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(StreamFrame),
    {
        let path = match chat_id {
            Some(id) => format!("/chats/{id}/messages"),
            None => "/chats/stream".to_owned(),
        };
        let response = self
            .authorized(self.client.post(self.url(&path)))?
            .json(&TurnBody { content })
            .send()
            .await?;
        let response = Self::check(response).await?;

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = body.next().await {
            let bytes = chunk.map_err(|e| ClientError::Stream(e.to_string()))?;
            for payload in decoder.push(&bytes) {
                match serde_json::from_str::<StreamFrame>(&payload) {
                    Ok(frame) => on_frame(frame),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unparseable stream frame");
                    }
                }
            }
        }
        // Clean close: the turn is complete.
        Ok(())
    }

    async fn persist(&self, _chats: &[ChatPayload]) -> Result<(), ClientError> {
        // The server already holds the durable copy.
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let backend = RemoteBackend::new("http://localhost:3000/");
        assert_eq!(backend.url("/chats"), "http://localhost:3000/chats");
    }

    #[test]
    fn server_error_bodies_are_extracted() {
        assert_eq!(
            parse_error_message(r#"{"error":"Chat not found"}"#).as_deref(),
            Some("Chat not found")
        );
        assert!(parse_error_message("<html>oops</html>").is_none());
    }

    #[test]
    fn requests_without_a_token_fail_fast() {
        let backend = RemoteBackend::new("http://localhost:3000");
        let err = backend
            .authorized(backend.client.get("http://localhost:3000/chats"))
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let backend = RemoteBackend::with_token("http://localhost:3000", "jwt-secret-token");
        let printed = format!("{backend:?}");
        assert!(!printed.contains("jwt-secret-token"));
    }
}
