use chrono::{DateTime, Utc};

use super::MessageRecord;

/// A single row in the `chats` table.
#[derive(Debug, Clone)]
pub struct ChatRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A chat with its messages resolved in append order.
#[derive(Debug, Clone)]
pub struct ChatWithMessages {
    pub chat: ChatRecord,
    pub messages: Vec<MessageRecord>,
}
