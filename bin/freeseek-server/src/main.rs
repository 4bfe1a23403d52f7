//! freeseek-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Ensure the upload directory exists.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod auth;
mod config;
mod entities;
mod error;
mod gateway;
mod middleware;
mod relay;
mod routes;
mod schemas;
mod state;
mod uploads;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::gateway::OpenAiGateway;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: FREESEEK_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "freeseek-server starting");

    if cfg.uses_dev_secret() {
        warn!("FREESEEK_JWT_SECRET is unset; using the development fallback secret");
    }

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Upload directory ────────────────────────────────────────────────────
    uploads::ensure_dir(&cfg.upload_dir).await?;
    info!(upload_dir = %cfg.upload_dir, "upload directory ready");

    // ── 5. Shared application state ────────────────────────────────────────────
    let gateway = OpenAiGateway::new(&cfg.completions_url, &cfg.completions_key, &cfg.completions_model);
    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        store: Arc::new(store),
        gateway: Arc::new(gateway),
    });

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("freeseek-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c   => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}

// ── Test helpers ───────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::Config;
    use crate::entities::SqliteStore;
    use crate::gateway::OpenAiGateway;
    use crate::state::AppState;

    /// Fresh in-memory application state; the gateway points at a closed
    /// port, so tests that would reach the network fail fast instead of
    /// hanging.
    pub(crate) async fn test_state() -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".into(),
            database_url: "sqlite::memory:".into(),
            upload_dir: std::env::temp_dir()
                .join("freeseek-test-uploads")
                .to_string_lossy()
                .into_owned(),
            jwt_secret: "test-secret".into(),
            token_ttl_hours: 3,
            completions_url: "http://127.0.0.1:9".into(),
            completions_key: String::new(),
            completions_model: "test-model".into(),
            log_level: "info".into(),
            log_json: false,
            cors_allowed_origins: None,
            enable_swagger: false,
        };
        let store = SqliteStore::connect(&config.database_url).await.unwrap();
        let gateway = OpenAiGateway::new(
            &config.completions_url,
            &config.completions_key,
            &config.completions_model,
        );
        Arc::new(AppState {
            config: Arc::new(config),
            store: Arc::new(store),
            gateway: Arc::new(gateway),
        })
    }
}
