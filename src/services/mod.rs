//! External collaborator seams: alerts, chat replies, message history.

pub mod chat;
pub mod message_store;
pub mod notifier;

pub use chat::{ChatBackend, ChatError, DisabledChatBackend, CHAT_APOLOGY};
pub use message_store::{InMemoryMessageStore, MessageStore, StoredMessage};
pub use notifier::{LogNotifier, Notifier, NotifyError, WebhookNotifier};
