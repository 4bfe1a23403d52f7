//! Chat routes: create / list, plus the two streaming turn routes.
//!
//! The streaming routes accept either a JSON `{content}` body or a
//! `multipart/form-data` upload with an `image` part, exactly like the
//! non-streaming message shape, and answer with a `text/event-stream`
//! relayed from the completion gateway.

use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use axum::routing::post;
use axum::{Extension, Json, Router};
use chrono::Utc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use freeseek_types::{ChatPayload, ContentKind, MessagePayload, Role, StreamFrame};

use crate::entities::{ChatRecord, ChatStore, MessageRecord};
use crate::error::ServerError;
use crate::middleware::auth::CurrentUser;
use crate::relay;
use crate::schemas::chat::{CreateChatRequest, TurnRequest};
use crate::state::AppState;
use crate::uploads;

/// Leading characters of the first message that become the default title.
const TITLE_PREFIX_CHARS: usize = 50;

#[derive(OpenApi)]
#[openapi(
    paths(create_chat, list_chats, stream_new_chat, stream_chat_message),
    components(schemas(
        CreateChatRequest,
        TurnRequest,
        ChatPayload,
        MessagePayload,
        StreamFrame,
        Role,
        ContentKind
    ))
)]
pub struct ChatApi;

/// Register chat routes. All of them sit behind the bearer-auth middleware.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chats", post(create_chat).get(list_chats))
        .route("/chats/stream", post(stream_new_chat))
        .route("/chats/{chat_id}/messages", post(stream_chat_message))
}

/// Create an empty chat (`POST /chats`).
#[utoipa::path(
    post,
    path = "/chats",
    tag = "chats",
    request_body = CreateChatRequest,
    responses(
        (status = 200, description = "Chat created", body = ChatPayload),
        (status = 400, description = "Invalid title"),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateChatRequest>,
) -> Result<Json<ChatPayload>, ServerError> {
    req.validate()
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let chat = ChatRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user.id,
        title: req.title,
        created_at: Utc::now(),
    };
    state.store.create_chat(chat.clone()).await?;
    Ok(Json(chat.to_payload(&[])))
}

/// List the caller's chats, newest first (`GET /chats`).
#[utoipa::path(
    get,
    path = "/chats",
    tag = "chats",
    responses(
        (status = 200, description = "Chat list with messages resolved", body = Vec<ChatPayload>),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<ChatPayload>>, ServerError> {
    let chats = state.store.list_chats(&user.id).await?;
    Ok(Json(chats.iter().map(|c| c.to_payload()).collect()))
}

/// Start a new chat and stream its first turn (`POST /chats/stream`).
///
/// Creates the chat plus its first message, then relays the completion as
/// SSE frames carrying the new chat's id.
#[utoipa::path(
    post,
    path = "/chats/stream",
    tag = "chats",
    request_body = TurnRequest,
    responses(
        (status = 200, description = "SSE delta stream", body = StreamFrame, content_type = "text/event-stream"),
        (status = 400, description = "Empty or malformed body"),
        (status = 401, description = "Missing or invalid token"),
        (status = 502, description = "Completion service unavailable"),
    )
)]
pub async fn stream_new_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    req: Request,
) -> Result<Response, ServerError> {
    let (content, kind) = extract_turn_body(&state, req).await?;

    let title = match kind {
        ContentKind::Text => content.chars().take(TITLE_PREFIX_CHARS).collect(),
        ContentKind::Image => "New Chat".to_owned(),
    };
    let chat = ChatRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user.id,
        title,
        created_at: Utc::now(),
    };
    let message = MessageRecord {
        id: Uuid::new_v4().to_string(),
        chat_id: chat.id.clone(),
        role: Role::User,
        content,
        content_type: kind,
        created_at: Utc::now(),
    };
    state
        .store
        .create_chat_with_first_message(chat.clone(), message.clone())
        .await?;

    info!(chat_id = %chat.id, kind = kind.as_str(), "new chat turn started");

    let turns = relay::context_turns(std::slice::from_ref(&message));
    relay::stream_turn(
        Arc::clone(&state.store),
        state.gateway.as_ref(),
        turns,
        chat.id,
        true,
    )
    .await
}

/// Append a message to an existing chat and stream the response turn
/// (`POST /chats/{chat_id}/messages`).
#[utoipa::path(
    post,
    path = "/chats/{chat_id}/messages",
    tag = "chats",
    request_body = TurnRequest,
    responses(
        (status = 200, description = "SSE delta stream", body = StreamFrame, content_type = "text/event-stream"),
        (status = 400, description = "Empty or malformed body"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Chat not found"),
        (status = 502, description = "Completion service unavailable"),
    )
)]
pub async fn stream_chat_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(chat_id): Path<String>,
    req: Request,
) -> Result<Response, ServerError> {
    // Absent and foreign chats answer identically.
    let chat = state
        .store
        .get_chat(&chat_id, &user.id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Chat not found".into()))?;

    let (content, kind) = extract_turn_body(&state, req).await?;

    let message = MessageRecord {
        id: Uuid::new_v4().to_string(),
        chat_id: chat_id.clone(),
        role: Role::User,
        content,
        content_type: kind,
        created_at: Utc::now(),
    };
    state.store.append_message(message.clone()).await?;

    info!(chat_id = %chat_id, kind = kind.as_str(), history_len = chat.messages.len(), "chat turn started");

    let mut history = chat.messages;
    history.push(message);
    let turns = relay::context_turns(&history);

    relay::stream_turn(
        Arc::clone(&state.store),
        state.gateway.as_ref(),
        turns,
        chat_id,
        false,
    )
    .await
}

/// Pull the turn content out of either body shape: JSON `{content}` for text,
/// multipart with an `image` part for uploads (stored to disk; the message
/// content becomes the public path).
async fn extract_turn_body(
    state: &AppState,
    req: Request,
) -> Result<(String, ContentKind), ServerError> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| ServerError::BadRequest(format!("invalid multipart body: {e}")))?;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("invalid multipart body: {e}")))?
        {
            if field.name() == Some("image") {
                let original_name = field.file_name().unwrap_or("upload").to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("upload read failed: {e}")))?;
                let path =
                    uploads::store_image(&state.config.upload_dir, &original_name, &bytes).await?;
                return Ok((path, ContentKind::Image));
            }
        }
        return Err(ServerError::BadRequest("missing image field".into()));
    }

    let Json(body) = Json::<TurnRequest>::from_request(req, &())
        .await
        .map_err(|e| ServerError::BadRequest(format!("invalid request body: {e}")))?;
    if body.content.trim().is_empty() {
        return Err(ServerError::BadRequest("content must not be empty".into()));
    }
    Ok((body.content, ContentKind::Text))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{UserRecord, UserStore};
    use crate::test_support::test_state;

    async fn add_user(state: &AppState, id: &str) -> CurrentUser {
        state
            .store
            .create_user(UserRecord {
                id: id.into(),
                username: format!("u-{id}"),
                email: format!("{id}@x.com"),
                password_hash: "hash".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        CurrentUser { id: id.into() }
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn create_chat_returns_an_empty_chat() {
        let state = test_state().await;
        let user = add_user(&state, "u1").await;

        let Json(chat) = create_chat(
            State(state),
            Extension(user),
            Json(CreateChatRequest { title: "T".into() }),
        )
        .await
        .unwrap();
        assert_eq!(chat.title, "T");
        assert!(chat.messages.is_empty());
    }

    #[tokio::test]
    async fn list_chats_only_shows_the_callers_chats() {
        let state = test_state().await;
        let alice = add_user(&state, "alice").await;
        let bob = add_user(&state, "bob").await;

        create_chat(
            State(state.clone()),
            Extension(alice.clone()),
            Json(CreateChatRequest {
                title: "alice-chat".into(),
            }),
        )
        .await
        .unwrap();

        let Json(bobs) = list_chats(State(state), Extension(bob)).await.unwrap();
        assert!(bobs.is_empty());
    }

    #[tokio::test]
    async fn foreign_chat_turn_is_not_found_and_leaves_the_chat_untouched() {
        let state = test_state().await;
        let alice = add_user(&state, "alice").await;
        let mallory = add_user(&state, "mallory").await;

        let Json(chat) = create_chat(
            State(state.clone()),
            Extension(alice.clone()),
            Json(CreateChatRequest { title: "T".into() }),
        )
        .await
        .unwrap();

        let err = stream_chat_message(
            State(state.clone()),
            Extension(mallory),
            Path(chat.id.clone()),
            json_request(r#"{"content":"hi"}"#),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));

        let untouched = state.store.get_chat(&chat.id, "alice").await.unwrap().unwrap();
        assert!(untouched.messages.is_empty());
    }

    #[tokio::test]
    async fn empty_content_is_rejected_before_any_write() {
        let state = test_state().await;
        let alice = add_user(&state, "alice").await;

        let Json(chat) = create_chat(
            State(state.clone()),
            Extension(alice.clone()),
            Json(CreateChatRequest { title: "T".into() }),
        )
        .await
        .unwrap();

        let err = stream_chat_message(
            State(state.clone()),
            Extension(alice),
            Path(chat.id.clone()),
            json_request(r#"{"content":"   "}"#),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));

        let untouched = state.store.get_chat(&chat.id, "alice").await.unwrap().unwrap();
        assert!(untouched.messages.is_empty());
    }
}
