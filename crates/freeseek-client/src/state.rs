//! Client conversation state.
//!
//! A reducer over the chat list: every mutation is one [`StateEvent`] applied
//! atomically through [`ConversationState::apply`], so optimistic updates,
//! delta merging, and rollback are deterministic and testable without a UI.
//!
//! Optimistic entries carry local numeric identities distinct from server
//! ids; after a brand-new chat's first turn completes, the session reloads
//! the chat list from the backend and [`StateEvent::ChatsLoaded`] replaces
//! every temporary identity wholesale (no merge by value).

use freeseek_types::{ChatPayload, ContentKind, Role};

/// Identity of a client-held chat or message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryId {
    /// Assigned locally for an optimistic entry; never sent to the server.
    Local(u64),
    /// Durable identity issued by the server.
    Server(String),
}

/// A message as held by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: EntryId,
    pub role: Role,
    pub content: String,
    pub content_type: ContentKind,
    /// RFC 3339 timestamp once known; empty for optimistic entries.
    pub created_at: String,
    /// True while this assistant entry is still receiving deltas. In-memory
    /// only; never serialized.
    pub is_streaming: bool,
}

/// A chat as held by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub id: EntryId,
    pub title: String,
    /// RFC 3339 timestamp once known; empty for optimistic entries.
    pub created_at: String,
    pub messages: Vec<ChatMessage>,
}

/// The optimistic entries belonging to the turn in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingTurn {
    chat: EntryId,
    user_message: EntryId,
    placeholder: EntryId,
    /// The chat itself was created optimistically and must go away on
    /// rollback.
    created_chat: bool,
}

/// Events driving the reducer.
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// The user submitted input; apply both optimistic entries.
    SendStarted {
        content: String,
        content_type: ContentKind,
    },
    /// A delta arrived; `text` is the cumulative assistant text so far, so a
    /// lost update heals on the next event.
    DeltaReceived { text: String },
    /// The stream ended naturally.
    TurnCompleted { chat_id: Option<String> },
    /// The turn failed; remove both optimistic entries.
    TurnFailed,
    /// Fresh chat list from the backing store; replaces all identities.
    ChatsLoaded(Vec<ChatPayload>),
}

/// Chat-list state with newest chats first, mirroring the server's ordering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationState {
    pub chats: Vec<ChatEntry>,
    pub active: Option<EntryId>,
    pending: Option<PendingTurn>,
    next_local_id: u64,
}

/// Title rule shared with the server: leading characters of the first
/// message.
const TITLE_PREFIX_CHARS: usize = 50;

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when input would actually start a turn: non-empty and nothing in
    /// flight (single-flight per client).
    pub fn can_send(&self, content: &str) -> bool {
        !content.trim().is_empty() && self.pending.is_none()
    }

    /// A turn is currently streaming.
    pub fn is_sending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn active_chat(&self) -> Option<&ChatEntry> {
        let id = self.active.as_ref()?;
        self.chats.iter().find(|c| &c.id == id)
    }

    /// Server id of the active chat, if it has one yet. `None` means the
    /// next send must go through the new-chat route.
    pub fn active_server_chat_id(&self) -> Option<&str> {
        match &self.active_chat()?.id {
            EntryId::Server(id) => Some(id),
            EntryId::Local(_) => None,
        }
    }

    pub fn set_active(&mut self, id: EntryId) {
        if self.chats.iter().any(|c| c.id == id) {
            self.active = Some(id);
        }
    }

    /// Apply one event. Every transition is atomic: observers never see a
    /// half-applied update.
    pub fn apply(&mut self, event: StateEvent) {
        match event {
            StateEvent::SendStarted {
                content,
                content_type,
            } => self.send_started(content, content_type),
            StateEvent::DeltaReceived { text } => self.delta_received(text),
            StateEvent::TurnCompleted { chat_id } => self.turn_completed(chat_id),
            StateEvent::TurnFailed => self.turn_failed(),
            StateEvent::ChatsLoaded(payloads) => self.chats_loaded(payloads),
        }
    }

    /// Snapshot for local persistence, in the wire shape. Streaming flags
    /// are transient and never make it into the snapshot.
    pub fn snapshot(&self) -> Vec<ChatPayload> {
        self.chats
            .iter()
            .map(|chat| ChatPayload {
                id: id_string(&chat.id),
                title: chat.title.clone(),
                created_at: chat.created_at.clone(),
                messages: chat
                    .messages
                    .iter()
                    .map(|m| freeseek_types::MessagePayload {
                        id: id_string(&m.id),
                        chat_id: id_string(&chat.id),
                        role: m.role,
                        content: m.content.clone(),
                        content_type: m.content_type,
                        created_at: m.created_at.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    // ── transitions ─────────────────────────────────────────────────────────

    fn send_started(&mut self, content: String, content_type: ContentKind) {
        if !self.can_send(&content) {
            return;
        }

        let mut created_chat = false;
        if self.active_chat().is_none() {
            let chat_id = self.alloc_id();
            let title = match content_type {
                ContentKind::Text => content.chars().take(TITLE_PREFIX_CHARS).collect(),
                ContentKind::Image => "New Chat".to_owned(),
            };
            self.chats.insert(
                0,
                ChatEntry {
                    id: chat_id.clone(),
                    title,
                    created_at: String::new(),
                    messages: Vec::new(),
                },
            );
            self.active = Some(chat_id);
            created_chat = true;
        }

        let chat_id = self.active.clone().expect("active chat just ensured");
        let user_id = self.alloc_id();
        let placeholder_id = self.alloc_id();

        let chat = self
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .expect("active chat exists");
        chat.messages.push(ChatMessage {
            id: user_id.clone(),
            role: Role::User,
            content,
            content_type,
            created_at: String::new(),
            is_streaming: false,
        });
        chat.messages.push(ChatMessage {
            id: placeholder_id.clone(),
            role: Role::Assistant,
            content: String::new(),
            content_type: ContentKind::Text,
            created_at: String::new(),
            is_streaming: true,
        });

        self.pending = Some(PendingTurn {
            chat: chat_id,
            user_message: user_id,
            placeholder: placeholder_id,
            created_chat,
        });
    }

    fn delta_received(&mut self, text: String) {
        let Some(pending) = self.pending.clone() else {
            return;
        };
        if let Some(placeholder) = self.find_message_mut(&pending.chat, &pending.placeholder) {
            // Full replacement with the cumulative text, never an append.
            placeholder.content = text;
        }
    }

    fn turn_completed(&mut self, chat_id: Option<String>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if let Some(placeholder) = self.find_message_mut(&pending.chat, &pending.placeholder) {
            placeholder.is_streaming = false;
        }
        // Adopt the server id for an optimistically-created chat so the
        // post-turn reload can keep it active.
        if let (true, Some(server_id)) = (pending.created_chat, chat_id) {
            if let Some(chat) = self.chats.iter_mut().find(|c| c.id == pending.chat) {
                chat.id = EntryId::Server(server_id.clone());
                if self.active == Some(pending.chat) {
                    self.active = Some(EntryId::Server(server_id));
                }
            }
        }
    }

    fn turn_failed(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if pending.created_chat {
            // The whole chat was optimistic; drop it and deactivate.
            self.chats.retain(|c| c.id != pending.chat);
            if self.active == Some(pending.chat) {
                self.active = None;
            }
            return;
        }
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == pending.chat) {
            chat.messages
                .retain(|m| m.id != pending.user_message && m.id != pending.placeholder);
        }
    }

    fn chats_loaded(&mut self, payloads: Vec<ChatPayload>) {
        self.chats = payloads
            .into_iter()
            .map(|chat| ChatEntry {
                id: EntryId::Server(chat.id.clone()),
                title: chat.title,
                created_at: chat.created_at,
                messages: chat
                    .messages
                    .into_iter()
                    .map(|m| ChatMessage {
                        id: EntryId::Server(m.id),
                        role: m.role,
                        content: m.content,
                        content_type: m.content_type,
                        created_at: m.created_at,
                        is_streaming: false,
                    })
                    .collect(),
            })
            .collect();

        // Keep the active selection when it survived the reload.
        let active_gone = self
            .active
            .as_ref()
            .is_some_and(|active| !self.chats.iter().any(|c| &c.id == active));
        if active_gone {
            self.active = self.chats.first().map(|c| c.id.clone());
        }
    }

    // ── helpers ─────────────────────────────────────────────────────────────

    fn alloc_id(&mut self) -> EntryId {
        let id = self.next_local_id;
        self.next_local_id += 1;
        EntryId::Local(id)
    }

    fn find_message_mut(&mut self, chat: &EntryId, message: &EntryId) -> Option<&mut ChatMessage> {
        self.chats
            .iter_mut()
            .find(|c| &c.id == chat)?
            .messages
            .iter_mut()
            .find(|m| &m.id == message)
    }
}

fn id_string(id: &EntryId) -> String {
    match id {
        EntryId::Local(n) => format!("local-{n}"),
        EntryId::Server(s) => s.clone(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
