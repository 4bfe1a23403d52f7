//! Wire types shared between the FreeSeek server and client crates.
//!
//! Everything here is plain serde data. The optional `utoipa` feature adds
//! `ToSchema` derives so the server can reference these types in its OpenAPI
//! components without forcing utoipa onto client builds.

pub mod sse;

use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// What a message's `content` field holds: inline text, or the public path of
/// an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentKind::Text),
            "image" => Ok(ContentKind::Image),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

/// One SSE frame of a streamed chat turn.
///
/// Serialized as the `data:` payload of each event:
/// `{"content": "<delta>", "chatId": "<id>"}`. `chat_id` is only present on
/// the new-chat route, where the client has no server id for the chat yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct StreamFrame {
    pub content: String,
    #[serde(rename = "chatId", skip_serializing_if = "Option::is_none", default)]
    pub chat_id: Option<String>,
}

/// A persisted message as returned by the chat routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct MessagePayload {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub content_type: ContentKind,
    /// RFC 3339 UTC timestamp.
    pub created_at: String,
}

/// A chat with its messages resolved, newest-first in list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ChatPayload {
    pub id: String,
    pub title: String,
    /// RFC 3339 UTC timestamp.
    pub created_at: String,
    pub messages: Vec<MessagePayload>,
}

/// Response body of `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct TokenPayload {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_serde() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::Assistant);
    }

    #[test]
    fn frame_with_chat_id_uses_camel_case_key() {
        let frame = StreamFrame {
            content: "hi".into(),
            chat_id: Some("abc".into()),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["content"], "hi");
        assert_eq!(json["chatId"], "abc");
    }

    #[test]
    fn frame_without_chat_id_omits_the_key() {
        let frame = StreamFrame {
            content: "hi".into(),
            chat_id: None,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("chatId").is_none());
    }

    #[test]
    fn content_kind_parses_from_stored_column_values() {
        assert_eq!("text".parse::<ContentKind>().unwrap(), ContentKind::Text);
        assert_eq!("image".parse::<ContentKind>().unwrap(), ContentKind::Image);
        assert!("video".parse::<ContentKind>().is_err());
    }
}
