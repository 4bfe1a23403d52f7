//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `FREESEEK_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - Public account routes (`/signup`, `/login`)
//! - Bearer-auth-protected chat routes and static `/uploads` serving

pub mod account;
pub mod chats;
pub mod doc;
pub mod health;

use std::sync::Arc;

use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::auth::require_auth;
use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .merge(health::router())
        .merge(account::router());

    let protected = chats::router().layer(middleware::from_fn_with_state(
        state.clone(),
        require_auth,
    ));

    let mut app = Router::new()
        .merge(public)
        .merge(protected)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir));

    // ── Swagger UI ────────────────────────────────────────────────────────────
    // Enabled by default; disable with FREESEEK_ENABLE_SWAGGER=false in
    // production to avoid exposing the API structure to potential attackers.
    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
