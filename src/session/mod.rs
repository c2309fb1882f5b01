//! Per-user session: transport handler, outbox and command dispatcher.

pub mod commands;
pub mod dispatcher;
pub mod handler;
pub mod outbox;

pub use commands::{Command, Validity};
pub use dispatcher::Dispatcher;
pub use handler::{ws_handler, MAX_FRAME_BYTES, PING_PERIOD, PONG_TIMEOUT};
pub use outbox::Outbox;
