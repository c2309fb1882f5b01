//! vigil - per-user trading assistant with a conditional auto-order engine.
//!
//! Sessions arrive over a WebSocket, slash commands arm predicate
//! monitors, and each monitor ticks against broker OHLC history until its
//! predicate holds, an order is placed, or it is cancelled or expires.

pub mod api;
pub mod broker;
pub mod config;
pub mod engine;
pub mod error;
pub mod predicate;
pub mod services;
pub mod session;
pub mod types;

use std::sync::Arc;

use broker::MarketGateway;
use config::Config;
use services::{ChatBackend, MessageStore, Notifier};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<dyn MarketGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub chat: Arc<dyn ChatBackend>,
    pub message_store: Arc<dyn MessageStore>,
}
