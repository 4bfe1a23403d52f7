//! Local backend: chats persisted to a JSON file, completions fetched
//! directly from a configured endpoint.
//!
//! This is the offline flavor of the same [`Backend`] abstraction the remote
//! API implements: the chat list lives entirely on this machine and the
//! completion endpoint streams raw text chunks (no SSE framing, no auth, no
//! server-side persistence).

use futures::StreamExt;

use freeseek_types::{ChatPayload, StreamFrame};

use crate::error::ClientError;
use crate::session::Backend;

#[derive(Debug, Clone)]
pub struct LocalBackend {
    path: std::path::PathBuf,
    completions_url: String,
    client: reqwest::Client,
}

#[derive(serde::Serialize)]
struct LocalTurnBody<'a> {
    message: &'a str,
}

impl LocalBackend {
    pub fn new(path: impl Into<std::path::PathBuf>, completions_url: &str) -> Self {
        Self {
            path: path.into(),
            completions_url: completions_url.to_owned(),
            client: reqwest::Client::new(),
        }
    }
}

impl Backend for LocalBackend {
    async fn load_chats(&self) -> Result<Vec<ChatPayload>, ClientError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn stream_turn<F>(
        &self,
        _chat_id: Option<&str>,
        content: &str,
        mut on_frame: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(StreamFrame),
    {
        let response = self
            .client
            .post(&self.completions_url)
            .json(&LocalTurnBody { message: content })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Api {
                status: response.status().as_u16(),
                message: "completion request failed".into(),
            });
        }

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let bytes = chunk.map_err(|e| ClientError::Stream(e.to_string()))?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if !text.is_empty() {
                on_frame(StreamFrame {
                    content: text,
                    chat_id: None,
                });
            }
        }
        Ok(())
    }

    async fn persist(&self, chats: &[ChatPayload]) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(chats)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use freeseek_types::{ContentKind, MessagePayload, Role};

    fn sample_chats() -> Vec<ChatPayload> {
        vec![ChatPayload {
            id: "c1".into(),
            title: "T".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            messages: vec![MessagePayload {
                id: "m1".into(),
                chat_id: "c1".into(),
                role: Role::User,
                content: "hi".into(),
                content_type: ContentKind::Text,
                created_at: "2026-01-01T00:00:00Z".into(),
            }],
        }]
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("chats.json"), "http://127.0.0.1:9");

        backend.persist(&sample_chats()).await.unwrap();
        let loaded = backend.load_chats().await.unwrap();
        assert_eq!(loaded, sample_chats());
    }

    #[tokio::test]
    async fn missing_file_means_no_chats_yet() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("chats.json"), "http://127.0.0.1:9");
        assert!(backend.load_chats().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let backend = LocalBackend::new(path, "http://127.0.0.1:9");
        assert!(matches!(
            backend.load_chats().await,
            Err(ClientError::Decode(_))
        ));
    }
}
