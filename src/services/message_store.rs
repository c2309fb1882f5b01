//! Append-only chat message log, keyed by user.
//!
//! The engine only ever appends and reads back a small recent window for
//! chat-backend context. There is no transactional coupling to monitors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::types::Role;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("message store write failed: {0}")]
    Write(String),
}

/// One persisted chat message.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn now(user_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: StoredMessage) -> Result<(), StoreError>;

    /// Most recent `limit` messages for a user, oldest first.
    async fn recent(&self, user_id: &str, limit: usize) -> Vec<StoredMessage>;
}

/// In-memory store; real persistence lives behind the same trait.
#[derive(Default)]
pub struct InMemoryMessageStore {
    data: DashMap<String, Vec<StoredMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: StoredMessage) -> Result<(), StoreError> {
        self.data
            .entry(message.user_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Vec<StoredMessage> {
        match self.data.get(user_id) {
            Some(messages) => {
                let start = messages.len().saturating_sub(limit);
                messages[start..].to_vec()
            }
            None => Vec::new(),
        }
    }
}
