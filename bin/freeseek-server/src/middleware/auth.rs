//! Bearer-token authentication middleware.
//!
//! A missing header yields 401 `Unauthorized`; a token that fails to decode,
//! is expired, or references a user that no longer exists yields 401
//! `Invalid token`. On success the authenticated user id is inserted into the
//! request extensions for handlers to pick up.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth;
use crate::entities::UserStore;
use crate::error::ServerError;
use crate::state::AppState;

/// Authenticated caller, available as `Extension<CurrentUser>` behind
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return ServerError::Unauthorized("Unauthorized".into()).into_response();
    };

    let claims = match auth::decode_token(token, &state.config.jwt_secret) {
        Ok(claims) => claims,
        Err(_) => return ServerError::Unauthorized("Invalid token".into()).into_response(),
    };

    // Resolve the user on every request; a token for a vanished user is as
    // invalid as a forged one.
    match state.store.find_by_id(&claims.sub).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser { id: user.id });
            next.run(req).await
        }
        Ok(None) => ServerError::Unauthorized("Invalid token".into()).into_response(),
        Err(e) => ServerError::Database(e).into_response(),
    }
}
