use chrono::{DateTime, Utc};
use freeseek_types::{ContentKind, Role};

/// A single row in the `messages` table.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    /// Text, or the public `/uploads/...` path for an image message.
    pub content: String,
    pub content_type: ContentKind,
    pub created_at: DateTime<Utc>,
}
