//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::gateway::OpenAiGateway;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Persistent user / chat / message store.
    pub store: Arc<SqliteStore>,
    /// Completion API client.
    pub gateway: Arc<OpenAiGateway>,
}
