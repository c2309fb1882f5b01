//! Broker HTTP gateway.
//!
//! The only module that speaks the broker protocol. Callers depend on the
//! [`MarketGateway`] trait so the engine can be driven by fakes in tests.

pub mod client;

pub use client::BrokerClient;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{Candle, Interval, OrderAck, OrderStatusSnapshot, Quote, SmartOrderRequest};

/// Gateway error taxonomy. No retries happen at this layer; the caller
/// decides what is worth retrying via [`BrokerError::is_transient`].
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Connection/read failure before a response body was obtained.
    #[error("broker transport error: {0}")]
    Transport(String),

    /// The body arrived but could not be decoded as the expected JSON.
    #[error("failed to decode broker response: {0}")]
    Decode(String),

    /// The endpoint answered with an HTML page: a routing problem, not a
    /// broker-side rejection.
    #[error("broker endpoint not found (received HTML response)")]
    EndpointNotFound,

    /// Envelope status was not "success" on a data endpoint. Carries the
    /// remote's message verbatim.
    #[error("broker api error: {0}")]
    Api(String),

    /// The order endpoint reported non-success with a message.
    #[error("{0}")]
    RejectedByBroker(String),

    /// HTTP 400; the broker's own message is surfaced verbatim and
    /// nothing else.
    #[error("{0}")]
    BadRequest(String),

    /// Any other non-200 status.
    #[error("broker api failure ({code}): {body}")]
    ApiFailure { code: u16, body: String },

    /// No API key configured; every call would be rejected remotely.
    #[error("broker API key not configured")]
    MissingApiKey,
}

impl BrokerError {
    /// Whether a monitor loop should log this error and keep ticking.
    pub fn is_transient(&self) -> bool {
        match self {
            BrokerError::Transport(_) | BrokerError::Decode(_) | BrokerError::EndpointNotFound => {
                true
            }
            BrokerError::ApiFailure { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

/// Typed access to the broker: quotes, OHLC history, smart orders and
/// order-status polling.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    async fn fetch_quote(&self, symbol: &str, exchange: &str) -> Result<Quote, BrokerError>;

    /// Inclusive date range, `YYYY-MM-DD`. An empty series is a success.
    async fn fetch_history(
        &self,
        symbol: &str,
        exchange: &str,
        interval: Interval,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Candle>, BrokerError>;

    async fn place_smart_order(&self, req: &SmartOrderRequest) -> Result<OrderAck, BrokerError>;

    async fn fetch_order_status(
        &self,
        order_id: &str,
    ) -> Result<OrderStatusSnapshot, BrokerError>;
}
