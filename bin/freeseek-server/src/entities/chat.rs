use std::future::Future;

use chrono::{DateTime, Utc};
use freeseek_types::{ContentKind, Role};

use super::{ChatRecord, ChatWithMessages, MessageRecord, SqliteStore};

pub trait ChatStore: Send + Sync + 'static {
    fn create_chat(
        &self,
        chat: ChatRecord,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Create a chat together with its first message in one transaction, so
    /// a failed turn submission never leaves an empty chat behind.
    fn create_chat_with_first_message(
        &self,
        chat: ChatRecord,
        msg: MessageRecord,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Append a message to its chat. The append sequence number is assigned
    /// inside the insert, so read order never depends on timestamp ties.
    fn append_message(
        &self,
        msg: MessageRecord,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// All chats owned by `user_id`, newest first, messages resolved.
    fn list_chats(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ChatWithMessages>, sqlx::Error>> + Send;

    /// One chat with its messages. Returns `None` both when the chat does not
    /// exist and when it is owned by someone else; callers must not be able
    /// to tell the difference.
    fn get_chat(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<ChatWithMessages>, sqlx::Error>> + Send;
}

impl ChatStore for SqliteStore {
    async fn create_chat(&self, chat: ChatRecord) -> Result<(), sqlx::Error> {
        let created_at = chat.created_at.to_rfc3339();
        sqlx::query(
            "INSERT INTO chats (id, user_id, title, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&chat.id)
        .bind(&chat.user_id)
        .bind(&chat.title)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_chat_with_first_message(
        &self,
        chat: ChatRecord,
        msg: MessageRecord,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO chats (id, user_id, title, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&chat.id)
        .bind(&chat.user_id)
        .bind(&chat.title)
        .bind(chat.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO messages (id, chat_id, seq, role, content, content_type, created_at) \
             VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6)",
        )
        .bind(&msg.id)
        .bind(&msg.chat_id)
        .bind(msg.role.as_str())
        .bind(&msg.content)
        .bind(msg.content_type.as_str())
        .bind(msg.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn append_message(&self, msg: MessageRecord) -> Result<(), sqlx::Error> {
        let created_at = msg.created_at.to_rfc3339();
        sqlx::query(
            "INSERT INTO messages (id, chat_id, seq, role, content, content_type, created_at) \
             VALUES (?1, ?2, \
                     (SELECT COALESCE(MAX(seq) + 1, 0) FROM messages WHERE chat_id = ?2), \
                     ?3, ?4, ?5, ?6)",
        )
        .bind(&msg.id)
        .bind(&msg.chat_id)
        .bind(msg.role.as_str())
        .bind(&msg.content)
        .bind(msg.content_type.as_str())
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatWithMessages>, sqlx::Error> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, user_id, title, created_at \
             FROM chats WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in rows {
            let chat = row_to_chat(row);
            let messages = self.chat_messages(&chat.id).await?;
            chats.push(ChatWithMessages { chat, messages });
        }
        Ok(chats)
    }

    async fn get_chat(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Option<ChatWithMessages>, sqlx::Error> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, user_id, title, created_at \
             FROM chats WHERE id = ?1 AND user_id = ?2",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let chat = row_to_chat(row);
        let messages = self.chat_messages(&chat.id).await?;
        Ok(Some(ChatWithMessages { chat, messages }))
    }
}

impl SqliteStore {
    async fn chat_messages(&self, chat_id: &str) -> Result<Vec<MessageRecord>, sqlx::Error> {
        let rows: Vec<(String, String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, chat_id, role, content, content_type, created_at \
             FROM messages WHERE chat_id = ?1 ORDER BY seq ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_message).collect())
    }
}

fn row_to_chat((id, user_id, title, created_at): (String, String, String, String)) -> ChatRecord {
    ChatRecord {
        id,
        user_id,
        title,
        created_at: parse_timestamp(&created_at, "chat"),
    }
}

fn row_to_message(
    (id, chat_id, role, content, content_type, created_at): (
        String,
        String,
        String,
        String,
        String,
        String,
    ),
) -> MessageRecord {
    MessageRecord {
        id,
        chat_id,
        role: role.parse().unwrap_or_else(|e: String| {
            tracing::warn!(raw = %role, error = %e, "unknown role in store; treating as user");
            Role::User
        }),
        content,
        content_type: content_type.parse().unwrap_or_else(|e: String| {
            tracing::warn!(raw = %content_type, error = %e, "unknown content type in store; treating as text");
            ContentKind::Text
        }),
        created_at: parse_timestamp(&created_at, "message"),
    }
}

fn parse_timestamp(raw: &str, kind: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        tracing::warn!(raw = %raw, error = %e, "failed to parse {kind} created_at; using now");
        Utc::now()
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
