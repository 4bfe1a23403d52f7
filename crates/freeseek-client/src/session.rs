//! Session driver: wires the conversation reducer to a backing store.
//!
//! One [`ChatSession`] owns the state plus a [`Backend`]; [`ChatSession::send`]
//! runs a full turn (optimistic entries, per-frame delta merging, completion
//! or rollback) and leaves the reducer the only place state ever changes.
//!
//! The backend is chosen once at startup: [`crate::api::RemoteBackend`] for
//! server-held chats, [`crate::store::LocalBackend`] for a purely local file.

use std::future::Future;

use freeseek_types::{ChatPayload, ContentKind, StreamFrame};
use tracing::warn;

use crate::error::ClientError;
use crate::state::{ConversationState, EntryId, StateEvent};

/// A backing store for the conversation state.
pub trait Backend {
    /// Fetch the full chat list.
    fn load_chats(&self) -> impl Future<Output = Result<Vec<ChatPayload>, ClientError>>;

    /// Run one streaming turn. `chat_id` of `None` targets the new-chat
    /// route. `on_frame` is invoked for every delta frame, in order.
    fn stream_turn<F>(
        &self,
        chat_id: Option<&str>,
        content: &str,
        on_frame: F,
    ) -> impl Future<Output = Result<(), ClientError>>
    where
        F: FnMut(StreamFrame);

    /// Write a post-turn snapshot. Remote backends no-op here; the server is
    /// already the source of truth.
    fn persist(&self, chats: &[ChatPayload]) -> impl Future<Output = Result<(), ClientError>>;
}

/// The conversation state plus the backend it syncs against.
#[derive(Debug)]
pub struct ChatSession<B: Backend> {
    state: ConversationState,
    backend: B,
}

impl<B: Backend> ChatSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            state: ConversationState::new(),
            backend,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn select_chat(&mut self, id: EntryId) {
        self.state.set_active(id);
    }

    /// Replace the local chat list with the backend's.
    pub async fn load(&mut self) -> Result<(), ClientError> {
        let chats = self.backend.load_chats().await?;
        self.state.apply(StateEvent::ChatsLoaded(chats));
        Ok(())
    }

    /// Run one chat turn end to end.
    ///
    /// Empty input or an in-flight turn is a silent no-op. On failure the
    /// optimistic entries are rolled back and the error is returned for the
    /// UI to surface; previously committed messages are untouched.
    pub async fn send(&mut self, content: &str) -> Result<(), ClientError> {
        if !self.state.can_send(content) {
            return Ok(());
        }

        let target = self.state.active_server_chat_id().map(str::to_owned);
        self.state.apply(StateEvent::SendStarted {
            content: content.to_owned(),
            content_type: ContentKind::Text,
        });

        let Self { state, backend } = self;
        let mut accumulated = String::new();
        let mut server_chat_id: Option<String> = None;

        let outcome = backend
            .stream_turn(target.as_deref(), content, |frame| {
                if server_chat_id.is_none() {
                    server_chat_id = frame.chat_id;
                }
                accumulated.push_str(&frame.content);
                state.apply(StateEvent::DeltaReceived {
                    text: accumulated.clone(),
                });
            })
            .await;

        match outcome {
            Ok(()) => {
                let is_new_chat = target.is_none();
                state.apply(StateEvent::TurnCompleted {
                    chat_id: server_chat_id.clone(),
                });

                // Snapshot before reloading so a file-backed store already
                // holds the finished turn when `load_chats` reads it back.
                if let Err(e) = backend.persist(&state.snapshot()).await {
                    // The turn itself succeeded; a snapshot failure is
                    // logged, not surfaced as a failed turn.
                    warn!(error = %e, "failed to persist chat snapshot");
                }

                if is_new_chat {
                    // Swap every temporary identity for the durable ones.
                    let chats = backend.load_chats().await?;
                    state.apply(StateEvent::ChatsLoaded(chats));
                    if let Some(id) = server_chat_id {
                        state.set_active(EntryId::Server(id));
                    }
                }
                Ok(())
            }
            Err(e) => {
                state.apply(StateEvent::TurnFailed);
                Err(e)
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
