//! Streaming relay: orchestrates one chat turn.
//!
//! A turn moves through `Submitted → Relaying → Completed | Failed`:
//!
//! - **Submitted**: the route has already durably appended the user's
//!   message (and, for a brand-new chat, created the chat) before calling
//!   [`stream_turn`].
//! - **Relaying**: the gateway has accepted the full prior context and the
//!   relay forwards every delta to the client as one SSE frame, in gateway
//!   order, while appending it to a running accumulator. One suspend point
//!   per gateway event, one per frame write; no other buffering.
//! - **Completed**: on the gateway's end-of-stream signal, exactly one
//!   assistant message holding the accumulated text is appended to the
//!   store, then the connection closes.
//! - **Failed**: on a gateway error, or when the client disconnects (the
//!   frame send fails), the relay stops consuming the gateway and persists
//!   nothing; the user message stays. Headers are already out by then, so
//!   closing the connection is the only failure signal.
//!
//! Gateway failures raised before the stream opens are returned as plain
//! errors so the route can still answer with a 502/504 status.

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use freeseek_types::{ContentKind, Role, StreamFrame};

use crate::entities::{ChatStore, MessageRecord, SqliteStore};
use crate::error::ServerError;
use crate::gateway::{CompletionEvent, CompletionGateway, Turn};

/// How many frames may queue towards a slow client before the relay
/// suspends instead of buffering further.
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Map stored history to gateway turns, role-tagged, in stored order.
pub fn context_turns(messages: &[MessageRecord]) -> Vec<Turn> {
    messages
        .iter()
        .map(|m| Turn {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}

/// Open a completion for `turns` and return the SSE response relaying it.
///
/// `announce_chat_id` makes every frame carry the chat id; the new-chat
/// route needs it because the client has no server id for the chat yet.
pub async fn stream_turn<G: CompletionGateway>(
    store: Arc<SqliteStore>,
    gateway: &G,
    turns: Vec<Turn>,
    chat_id: String,
    announce_chat_id: bool,
) -> Result<Response, ServerError> {
    let mut events = gateway.open(turns).await?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(FRAME_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut accumulated = String::new();
        let announced = announce_chat_id.then(|| chat_id.clone());

        loop {
            match events.recv().await {
                Some(CompletionEvent::Delta(delta)) => {
                    accumulated.push_str(&delta);
                    let frame = StreamFrame {
                        content: delta,
                        chat_id: announced.clone(),
                    };
                    let data = match serde_json::to_string(&frame) {
                        Ok(data) => data,
                        Err(e) => {
                            error!(chat_id = %chat_id, error = %e, "failed to encode stream frame");
                            return;
                        }
                    };
                    if tx.send(Ok(Event::default().data(data))).await.is_err() {
                        info!(
                            chat_id = %chat_id,
                            accumulated_len = accumulated.len(),
                            "client disconnected mid-stream; turn abandoned"
                        );
                        return;
                    }
                }
                Some(CompletionEvent::Done) => {
                    let content_len = accumulated.len();
                    let message = MessageRecord {
                        id: Uuid::new_v4().to_string(),
                        chat_id: chat_id.clone(),
                        role: Role::Assistant,
                        content: std::mem::take(&mut accumulated),
                        content_type: ContentKind::Text,
                        created_at: Utc::now(),
                    };
                    if let Err(e) = store.append_message(message).await {
                        error!(chat_id = %chat_id, error = %e, "failed to persist assistant message");
                    } else {
                        info!(chat_id = %chat_id, content_len, "turn completed");
                    }
                    // Dropping tx closes the client connection.
                    return;
                }
                Some(CompletionEvent::Error(e)) => {
                    warn!(
                        chat_id = %chat_id,
                        error = %e,
                        accumulated_len = accumulated.len(),
                        "completion stream failed; turn abandoned"
                    );
                    return;
                }
                None => {
                    warn!(chat_id = %chat_id, "completion stream ended unexpectedly; turn abandoned");
                    return;
                }
            }
        }
    });

    Ok(Sse::new(ReceiverStream::new(rx)).into_response())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{ChatRecord, UserRecord, UserStore};
    use crate::gateway::GatewayError;
    use http_body_util::BodyExt;
    use std::sync::Mutex;

    /// Gateway that replays a scripted event sequence.
    struct ScriptedGateway {
        events: Mutex<Option<Vec<CompletionEvent>>>,
    }

    impl ScriptedGateway {
        fn new(events: Vec<CompletionEvent>) -> Self {
            Self {
                events: Mutex::new(Some(events)),
            }
        }
    }

    impl CompletionGateway for ScriptedGateway {
        async fn open(
            &self,
            _turns: Vec<Turn>,
        ) -> Result<mpsc::Receiver<CompletionEvent>, GatewayError> {
            let events = self
                .events
                .lock()
                .unwrap()
                .take()
                .expect("gateway opened twice");
            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    /// Gateway that refuses before streaming.
    struct RefusingGateway;

    impl CompletionGateway for RefusingGateway {
        async fn open(
            &self,
            _turns: Vec<Turn>,
        ) -> Result<mpsc::Receiver<CompletionEvent>, GatewayError> {
            Err(GatewayError::Timeout)
        }
    }

    async fn seeded_store() -> Arc<SqliteStore> {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store
            .create_user(UserRecord {
                id: "u1".into(),
                username: "ada".into(),
                email: "ada@x.com".into(),
                password_hash: "hash".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .create_chat(ChatRecord {
                id: "c1".into(),
                user_id: "u1".into(),
                title: "hi".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .append_message(MessageRecord {
                id: "m1".into(),
                chat_id: "c1".into(),
                role: Role::User,
                content: "hi".into(),
                content_type: ContentKind::Text,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        Arc::new(store)
    }

    /// Drain the SSE body and decode every `data:` frame.
    async fn collect_frames(response: Response) -> Vec<StreamFrame> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        text.split("\n\n")
            .filter_map(|event| {
                event
                    .lines()
                    .find_map(|line| line.strip_prefix("data: "))
            })
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn completed_turn_persists_the_concatenated_deltas() {
        let store = seeded_store().await;
        let gateway = ScriptedGateway::new(vec![
            CompletionEvent::Delta("Hel".into()),
            CompletionEvent::Delta("lo ".into()),
            CompletionEvent::Delta("there".into()),
            CompletionEvent::Done,
        ]);

        let turns = vec![Turn {
            role: Role::User,
            content: "hi".into(),
        }];
        let response = stream_turn(Arc::clone(&store), &gateway, turns, "c1".into(), false)
            .await
            .unwrap();

        let frames = collect_frames(response).await;
        let forwarded: String = frames.iter().map(|f| f.content.as_str()).collect();
        assert_eq!(forwarded, "Hello there");
        assert!(frames.iter().all(|f| f.chat_id.is_none()));

        // Body close means the relay task is done; the assistant message is
        // exactly the forwarded concatenation.
        let chat = store.get_chat("c1", "u1").await.unwrap().unwrap();
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[1].role, Role::Assistant);
        assert_eq!(chat.messages[1].content, "Hello there");
    }

    #[tokio::test]
    async fn failed_turn_persists_no_assistant_message() {
        let store = seeded_store().await;
        let gateway = ScriptedGateway::new(vec![
            CompletionEvent::Delta("par".into()),
            CompletionEvent::Delta("tial".into()),
            CompletionEvent::Error("connection reset".into()),
        ]);

        let turns = vec![Turn {
            role: Role::User,
            content: "hi".into(),
        }];
        let response = stream_turn(Arc::clone(&store), &gateway, turns, "c1".into(), false)
            .await
            .unwrap();

        let frames = collect_frames(response).await;
        assert_eq!(frames.len(), 2);

        let chat = store.get_chat("c1", "u1").await.unwrap().unwrap();
        assert_eq!(chat.messages.len(), 1, "partial turn must not be persisted");
        assert_eq!(chat.messages[0].content, "hi");
    }

    #[tokio::test]
    async fn new_chat_frames_announce_the_chat_id() {
        let store = seeded_store().await;
        let gateway = ScriptedGateway::new(vec![
            CompletionEvent::Delta("ok".into()),
            CompletionEvent::Done,
        ]);

        let turns = vec![Turn {
            role: Role::User,
            content: "hi".into(),
        }];
        let response = stream_turn(Arc::clone(&store), &gateway, turns, "c1".into(), true)
            .await
            .unwrap();

        let frames = collect_frames(response).await;
        assert!(!frames.is_empty());
        assert!(frames.iter().all(|f| f.chat_id.as_deref() == Some("c1")));
    }

    #[tokio::test]
    async fn pre_stream_gateway_failure_is_a_plain_error() {
        let store = seeded_store().await;
        let err = stream_turn(store, &RefusingGateway, Vec::new(), "c1".into(), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServerError::Upstream(GatewayError::Timeout)
        ));
    }

    #[tokio::test]
    async fn client_disconnect_abandons_the_turn() {
        let store = seeded_store().await;
        // Endless deltas and never Done: only a disconnect ends this turn.
        let gateway = ScriptedGateway::new(vec![CompletionEvent::Delta("x".into()); 512]);

        let turns = vec![Turn {
            role: Role::User,
            content: "hi".into(),
        }];
        let response = stream_turn(Arc::clone(&store), &gateway, turns, "c1".into(), false)
            .await
            .unwrap();

        // Simulate the browser going away mid-stream.
        drop(response);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let chat = store.get_chat("c1", "u1").await.unwrap().unwrap();
        assert_eq!(chat.messages.len(), 1, "abandoned turn must not persist");
    }

    #[test]
    fn context_turns_preserve_roles_and_order() {
        let messages = vec![
            MessageRecord {
                id: "m1".into(),
                chat_id: "c1".into(),
                role: Role::User,
                content: "first".into(),
                content_type: ContentKind::Text,
                created_at: Utc::now(),
            },
            MessageRecord {
                id: "m2".into(),
                chat_id: "c1".into(),
                role: Role::Assistant,
                content: "second".into(),
                content_type: ContentKind::Text,
                created_at: Utc::now(),
            },
        ];
        let turns = context_turns(&messages);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "first");
        assert_eq!(turns[1].role, Role::Assistant);
    }
}
