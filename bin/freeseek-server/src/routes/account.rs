//! Signup and login routes.
//!
//! Password hashing and verification run on the blocking pool; bcrypt takes
//! hundreds of milliseconds by design and must not stall the async executor.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use freeseek_types::TokenPayload;

use crate::auth;
use crate::entities::user::is_unique_violation;
use crate::entities::{UserRecord, UserStore};
use crate::error::ServerError;
use crate::schemas::account::{LoginRequest, SignupRequest, StatusMessage};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(signup, login),
    components(schemas(SignupRequest, LoginRequest, StatusMessage, TokenPayload))
)]
pub struct AccountApi;

/// Register account routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

/// Create a user (`POST /signup`).
#[utoipa::path(
    post,
    path = "/signup",
    tag = "account",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = StatusMessage),
        (status = 400, description = "Invalid input or user already exists"),
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<Response, ServerError> {
    req.validate()
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let password = req.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| ServerError::Internal(format!("hashing task failed: {e}")))??;

    let user = UserRecord {
        id: Uuid::new_v4().to_string(),
        username: req.username.clone(),
        email: req.email.clone(),
        password_hash,
        created_at: Utc::now(),
    };

    match state.store.create_user(user).await {
        Ok(()) => {
            info!(username = %req.username, "user created");
            Ok((
                StatusCode::CREATED,
                Json(StatusMessage {
                    message: "User created successfully".into(),
                }),
            )
                .into_response())
        }
        Err(e) if is_unique_violation(&e) => {
            Err(ServerError::BadRequest("user already exists".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Exchange credentials for a bearer token (`POST /login`).
///
/// An unknown username and a wrong password produce the same response so the
/// route cannot be used to probe which usernames exist.
#[utoipa::path(
    post,
    path = "/login",
    tag = "account",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenPayload),
        (status = 401, description = "Invalid credentials"),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenPayload>, ServerError> {
    let invalid = || ServerError::Unauthorized("Invalid credentials".into());

    let Some(user) = state.store.find_by_username(&req.username).await? else {
        return Err(invalid());
    };

    let password = req.password;
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| ServerError::Internal(format!("verification task failed: {e}")))?;
    if !matches {
        return Err(invalid());
    }

    let token = auth::issue_token(
        &user.id,
        &state.config.jwt_secret,
        state.config.token_ttl_hours,
    )?;
    info!(username = %req.username, "login succeeded");
    Ok(Json(TokenPayload { token }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
