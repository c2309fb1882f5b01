//! WebSocket frame types for the session transport.
//!
//! Both directions are framed JSON with an internal `type` tag. The
//! write pump owns the socket sink; everything user-visible (echo,
//! typing indicator, system notices, errors) is a single frame.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Message author role carried on chat frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Incoming frame from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Chat {
        content: String,
        #[serde(default)]
        file_id: Option<i64>,
    },
    /// Client-side typing indicator; echoed back for multi-device UIs.
    Typing {
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    /// Protocol-level keep-alive (distinct from WebSocket ping frames).
    Ping,
}

/// Payload attached to outbound chat frames.
#[derive(Debug, Clone, Serialize)]
pub struct ChatData {
    pub role: Role,
    /// UTC ISO-8601.
    pub created_at: String,
    /// Verdict of a one-shot signal check, when this frame reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_met: Option<bool>,
    /// Indicator readouts backing the verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicator_values: Option<BTreeMap<String, f64>>,
}

/// Payload for typing indicator frames.
#[derive(Debug, Clone, Serialize)]
pub struct TypingData {
    pub is_typing: bool,
}

/// Payload for error frames.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorData {
    pub message: String,
}

/// Outgoing frame to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Chat { content: String, data: ChatData },
    Typing { data: TypingData },
    Pong,
    Error { data: ErrorData },
}

impl ServerFrame {
    /// A chat frame stamped with the current UTC time.
    pub fn chat(role: Role, content: impl Into<String>) -> Self {
        ServerFrame::Chat {
            content: content.into(),
            data: ChatData {
                role,
                created_at: Utc::now().to_rfc3339(),
                signal_met: None,
                indicator_values: None,
            },
        }
    }

    /// A chat frame carrying a one-shot signal verdict.
    pub fn signal_result(
        content: impl Into<String>,
        met: bool,
        values: BTreeMap<String, f64>,
    ) -> Self {
        ServerFrame::Chat {
            content: content.into(),
            data: ChatData {
                role: Role::Assistant,
                created_at: Utc::now().to_rfc3339(),
                signal_met: Some(met),
                indicator_values: Some(values),
            },
        }
    }

    pub fn typing(is_typing: bool) -> Self {
        ServerFrame::Typing {
            data: TypingData { is_typing },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            data: ErrorData {
                message: message.into(),
            },
        }
    }
}
