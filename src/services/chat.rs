//! Conversational backend for non-slash messages.
//!
//! The assistant proper is an external collaborator; the engine only
//! needs a `reply` seam and a canned apology when it fails.

use async_trait::async_trait;
use thiserror::Error;

use super::message_store::StoredMessage;

/// Emitted through the session when the backend fails.
pub const CHAT_APOLOGY: &str =
    "I apologize, but I'm having trouble processing your request right now. Please try again.";

const COMMAND_GUIDANCE: &str = "I can only assist with trading commands: /price, /signal, \
/buy_smart, /sell_smart, /buy_smart_auto, /sell_smart_auto, /status_orders, /cancel_order, \
/cancel_all_orders. Type /help for the full syntax.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat backend error: {0}")]
    Backend(String),
}

/// Reply seam for free-form messages.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn reply(
        &self,
        user_message: &str,
        history: &[StoredMessage],
        file_context: Option<&str>,
    ) -> Result<String, ChatError>;
}

/// Default backend when no assistant is wired up: steer the user to the
/// command set instead of guessing at market answers.
pub struct DisabledChatBackend;

#[async_trait]
impl ChatBackend for DisabledChatBackend {
    async fn reply(
        &self,
        _user_message: &str,
        _history: &[StoredMessage],
        _file_context: Option<&str>,
    ) -> Result<String, ChatError> {
        Ok(COMMAND_GUIDANCE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_backend_guides_to_commands() {
        let backend = DisabledChatBackend;
        let reply = backend.reply("what is the market doing?", &[], None).await.unwrap();
        assert!(reply.contains("/status_orders"));
        assert!(reply.contains("/buy_smart_auto"));
    }
}
