//! Database abstraction layer.
//!
//! [`UserStore`] and [`ChatStore`] define the persistence interface; the
//! default implementation is [`SqliteStore`]. To swap to another database
//! (Postgres, MySQL, …), implement both traits for a new type and change the
//! concrete type in [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures (stable since Rust
//! 1.75) so no extra `async-trait` crate is required.

pub mod chat;
pub mod dao;
pub mod user;

pub use chat::ChatStore;
pub use dao::{ChatRecord, ChatWithMessages, MessageRecord, UserRecord};
pub use user::UserStore;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// SQLite-backed store for users, chats, and messages.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending
    /// migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://freeseek.db"` or `"sqlite::memory:"` for tests.
    /// The migrations path is resolved relative to `CARGO_MANIFEST_DIR` at
    /// compile time and embedded into the binary.
    ///
    /// The pool is capped at one connection: SQLite permits a single writer,
    /// and an in-memory database lives only as long as its connection.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}
