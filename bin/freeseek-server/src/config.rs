//! Server configuration, loaded from environment variables at startup.

/// Runtime configuration for freeseek-server.
///
/// Every field has a default so the server starts without any environment
/// variables set; `FREESEEK_JWT_SECRET` and `FREESEEK_COMPLETIONS_KEY` are the
/// two that any real deployment must override.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://freeseek.db"`).
    pub database_url: String,

    /// Directory where uploaded images are stored and served from.
    pub upload_dir: String,

    /// HMAC secret for signing and verifying JWTs.
    pub jwt_secret: String,

    /// Token lifetime in hours.
    pub token_ttl_hours: i64,

    /// Base URL of the OpenAI-compatible completion API.
    pub completions_url: String,

    /// API key for the completion API; empty means no Authorization header.
    pub completions_key: String,

    /// Model identifier sent with every completion request.
    pub completions_model: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated CORS origin allow-list; `None` means permissive.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,
}

/// Fallback signing secret so a bare `cargo run` works in development.
const DEV_JWT_SECRET: &str = "freeseek-dev-secret";

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("FREESEEK_BIND", "0.0.0.0:3000"),
            database_url: env_or("FREESEEK_DATABASE_URL", "sqlite://freeseek.db"),
            upload_dir: env_or("FREESEEK_UPLOAD_DIR", "uploads"),
            jwt_secret: env_or("FREESEEK_JWT_SECRET", DEV_JWT_SECRET),
            token_ttl_hours: parse_env("FREESEEK_TOKEN_TTL_HOURS", 3),
            completions_url: env_or("FREESEEK_COMPLETIONS_URL", "https://api.deepseek.com"),
            completions_key: env_or("FREESEEK_COMPLETIONS_KEY", ""),
            completions_model: env_or("FREESEEK_MODEL", "deepseek-chat"),
            log_level: env_or("FREESEEK_LOG", "info"),
            log_json: std::env::var("FREESEEK_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_allowed_origins: std::env::var("FREESEEK_CORS_ORIGINS").ok(),
            enable_swagger: std::env::var("FREESEEK_ENABLE_SWAGGER")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        }
    }

    /// True when the signing secret is still the development fallback.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
