use std::future::Future;

use chrono::{DateTime, Utc};

use super::{SqliteStore, UserRecord};

pub trait UserStore: Send + Sync + 'static {
    /// Persist a new user. A unique-constraint violation on `username` or
    /// `email` surfaces as `sqlx::Error::Database`.
    fn create_user(
        &self,
        user: UserRecord,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;

    fn find_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;
}

impl UserStore for SqliteStore {
    async fn create_user(&self, user: UserRecord) -> Result<(), sqlx::Error> {
        let created_at = user.created_at.to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, username, email, password_hash, created_at \
             FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_user))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, username, email, password_hash, created_at \
             FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_user))
    }
}

fn row_to_user(
    (id, username, email, password_hash, created_at): (String, String, String, String, String),
) -> UserRecord {
    UserRecord {
        id,
        username,
        email,
        password_hash,
        created_at: created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|e| {
                tracing::warn!(raw = %created_at, error = %e, "failed to parse user created_at; using now");
                Utc::now()
            }),
    }
}

/// True when the error is a UNIQUE-constraint violation, i.e. the username or
/// email is already registered.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use uuid::Uuid;

    fn sample_user(username: &str, email: &str) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            password_hash: "$2b$10$placeholderplaceholderplace".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.create_user(sample_user("ada", "ada@x.com")).await.unwrap();

        let found = store.find_by_username("ada").await.unwrap().unwrap();
        assert_eq!(found.email, "ada@x.com");

        let by_id = store.find_by_id(&found.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "ada");
    }

    #[tokio::test]
    async fn unknown_username_yields_none() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.create_user(sample_user("ada", "ada@x.com")).await.unwrap();

        let err = store
            .create_user(sample_user("grace", "ada@x.com"))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn debug_output_redacts_the_hash() {
        let printed = format!("{:?}", sample_user("ada", "ada@x.com"));
        assert!(printed.contains("***"));
        assert!(!printed.contains("placeholder"));
    }
}
