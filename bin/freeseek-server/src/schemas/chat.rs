//! Request types and entity→payload conversions for the chat routes.
//!
//! Response shapes live in `freeseek-types` so the client crate reads the
//! same definitions it sends against.

use freeseek_types::{ChatPayload, MessagePayload};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{ChatRecord, ChatWithMessages, MessageRecord};

/// Request body for `POST /chats`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateChatRequest {
    #[validate(length(min = 1, max = 120, message = "title must be 1-120 characters"))]
    pub title: String,
}

/// JSON request body for the streaming turn routes.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TurnRequest {
    pub content: String,
}

impl MessageRecord {
    pub fn to_payload(&self) -> MessagePayload {
        MessagePayload {
            id: self.id.clone(),
            chat_id: self.chat_id.clone(),
            role: self.role,
            content: self.content.clone(),
            content_type: self.content_type,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl ChatRecord {
    pub fn to_payload(&self, messages: &[MessageRecord]) -> ChatPayload {
        ChatPayload {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at.to_rfc3339(),
            messages: messages.iter().map(MessageRecord::to_payload).collect(),
        }
    }
}

impl ChatWithMessages {
    pub fn to_payload(&self) -> ChatPayload {
        self.chat.to_payload(&self.messages)
    }
}
