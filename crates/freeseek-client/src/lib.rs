//! Conversation state core for FreeSeek clients.
//!
//! UI-agnostic building blocks a frontend composes:
//!
//! - [`state::ConversationState`]: a reducer over the chat list with
//!   optimistic sends, cumulative delta merging, and deterministic rollback.
//! - [`session::ChatSession`]: drives the reducer against a pluggable
//!   [`session::Backend`], chosen once at startup: the server API
//!   ([`api::RemoteBackend`]) or a local JSON file
//!   ([`store::LocalBackend`]).
//! - [`markup`] / [`markdown`]: parse assistant output into reasoning-tagged
//!   segments and rich-text blocks for rendering.

pub mod api;
pub mod error;
pub mod markdown;
pub mod markup;
pub mod session;
pub mod state;
pub mod store;

pub use api::RemoteBackend;
pub use error::ClientError;
pub use markdown::{Block, MessagePart, RenderedMessage, Span, render_message};
pub use markup::{Segment, split_reasoning};
pub use session::{Backend, ChatSession};
pub use state::{ChatEntry, ChatMessage, ConversationState, EntryId, StateEvent};
pub use store::LocalBackend;
