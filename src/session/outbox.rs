//! Serialized outbound channel for one session.
//!
//! Every user-visible emission is a single frame enqueued here; the write
//! pump in the handler is the only task that touches the socket. Workers
//! never hold the transport, only a clone of this.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::{Role, ServerFrame};

#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl Outbox {
    pub fn new(tx: mpsc::UnboundedSender<ServerFrame>) -> Self {
        Self { tx }
    }

    /// Create an outbox plus its draining receiver (tests, write pump).
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, frame: ServerFrame) {
        // A closed channel means the session is gone; frames from
        // still-draining workers are dropped.
        if self.tx.send(frame).is_err() {
            debug!("outbox closed; dropping frame");
        }
    }

    /// Echo of the user's own message.
    pub fn user_echo(&self, content: &str) {
        self.send(ServerFrame::chat(Role::User, content));
    }

    pub fn assistant(&self, content: impl Into<String>) {
        self.send(ServerFrame::chat(Role::Assistant, content));
    }

    /// System notices: monitor lifecycle, executions, expiries.
    pub fn system(&self, content: impl Into<String>) {
        self.send(ServerFrame::chat(Role::System, content));
    }

    /// One-shot signal verdict with its structured readout.
    pub fn signal_result(&self, content: impl Into<String>, met: bool, values: BTreeMap<String, f64>) {
        self.send(ServerFrame::signal_result(content, met, values));
    }

    pub fn typing(&self, is_typing: bool) {
        self.send(ServerFrame::typing(is_typing));
    }

    pub fn pong(&self) {
        self.send(ServerFrame::Pong);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(ServerFrame::error(message));
    }
}
