mod chat;
mod message;
mod user;

pub use chat::{ChatRecord, ChatWithMessages};
pub use message::MessageRecord;
pub use user::UserRecord;
