//! Production broker client over HTTP/JSON.
//!
//! All four endpoints are JSON POST with a `{status, data, ...}` envelope.
//! An envelope whose `status` is not `"success"` is an error even at
//! HTTP 200, carrying the remote's message verbatim.

use chrono::NaiveDate;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{BrokerError, MarketGateway};
use crate::types::{Candle, Interval, OrderAck, OrderStatusSnapshot, Quote, SmartOrderRequest};

use async_trait::async_trait;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct QuoteRequest<'a> {
    apikey: &'a str,
    symbol: &'a str,
    exchange: &'a str,
}

#[derive(Serialize)]
struct HistoryRequest<'a> {
    apikey: &'a str,
    symbol: &'a str,
    exchange: &'a str,
    interval: &'a str,
    start_date: String,
    end_date: String,
}

#[derive(Serialize)]
struct SmartOrderWireRequest<'a> {
    apikey: &'a str,
    strategy: &'a str,
    symbol: &'a str,
    exchange: &'a str,
    action: &'a str,
    pricetype: &'a str,
    product: &'a str,
    quantity: u32,
    position_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<f64>,
}

#[derive(Serialize)]
struct OrderStatusRequest<'a> {
    apikey: &'a str,
    strategy: &'a str,
    orderid: &'a str,
}

/// Shared response envelope. `message` and `error` are both seen in the
/// wild depending on the endpoint.
#[derive(Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn remote_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| format!("api reported status: {}", self.status))
    }
}

#[derive(Deserialize)]
struct OrderIdData {
    orderid: String,
}

/// HTTP client for the broker API. Holds one reqwest `Client`, safe for
/// concurrent use across workers.
pub struct BrokerClient {
    base_url: String,
    api_key: Option<String>,
    strategy_tag: String,
    client: Client,
}

impl BrokerClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, strategy_tag: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            strategy_tag: strategy_tag.into(),
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    fn api_key(&self) -> Result<&str, BrokerError> {
        self.api_key.as_deref().ok_or(BrokerError::MissingApiKey)
    }

    /// POST a JSON body and return the raw body text after the shared
    /// status-code and content-type checks.
    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, BrokerError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "broker request");

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;

        let status = resp.status();
        let html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("html"))
            .unwrap_or(false);

        let text = resp
            .text()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;

        if html {
            return Err(BrokerError::EndpointNotFound);
        }

        if status == StatusCode::BAD_REQUEST {
            // Surface only the broker's own message for 400s.
            let msg = serde_json::from_str::<Envelope<serde_json::Value>>(&text)
                .ok()
                .map(|e| e.remote_message())
                .unwrap_or(text);
            return Err(BrokerError::BadRequest(msg));
        }

        if !status.is_success() {
            return Err(BrokerError::ApiFailure {
                code: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    fn decode<T: serde::de::DeserializeOwned>(text: &str) -> Result<Envelope<T>, BrokerError> {
        serde_json::from_str(text).map_err(|e| BrokerError::Decode(format!("{}: {}", e, text)))
    }
}

#[async_trait]
impl MarketGateway for BrokerClient {
    async fn fetch_quote(&self, symbol: &str, exchange: &str) -> Result<Quote, BrokerError> {
        let body = QuoteRequest {
            apikey: self.api_key()?,
            symbol,
            exchange,
        };

        let text = self.post("/api/v1/quotes", &body).await?;
        let envelope: Envelope<Quote> = Self::decode(&text)?;

        if envelope.status != "success" {
            return Err(BrokerError::Api(envelope.remote_message()));
        }

        envelope
            .data
            .ok_or_else(|| BrokerError::Decode(format!("quote envelope missing data: {}", text)))
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        exchange: &str,
        interval: Interval,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Candle>, BrokerError> {
        let body = HistoryRequest {
            apikey: self.api_key()?,
            symbol,
            exchange,
            interval: interval.as_str(),
            start_date: start_date.format("%Y-%m-%d").to_string(),
            end_date: end_date.format("%Y-%m-%d").to_string(),
        };

        let text = self.post("/api/v1/history", &body).await?;
        let envelope: Envelope<Vec<Candle>> = Self::decode(&text)?;

        if envelope.status != "success" {
            return Err(BrokerError::Api(envelope.remote_message()));
        }

        // Null/absent data is an empty series, not an error.
        Ok(envelope.data.unwrap_or_default())
    }

    async fn place_smart_order(&self, req: &SmartOrderRequest) -> Result<OrderAck, BrokerError> {
        let body = SmartOrderWireRequest {
            apikey: self.api_key()?,
            strategy: &self.strategy_tag,
            symbol: &req.symbol,
            exchange: &req.exchange,
            action: req.action.as_str(),
            pricetype: req.price_type.as_str(),
            product: req.product.as_str(),
            quantity: req.quantity,
            position_size: req.quantity,
            price: req.price,
        };

        let text = self.post("/api/v1/placesmartorder", &body).await?;
        let envelope: Envelope<OrderIdData> = Self::decode(&text)?;

        if envelope.status != "success" {
            return Err(BrokerError::RejectedByBroker(envelope.remote_message()));
        }

        let data = envelope
            .data
            .ok_or_else(|| BrokerError::Decode(format!("order envelope missing data: {}", text)))?;

        Ok(OrderAck {
            order_id: data.orderid,
            status: "success".to_string(),
        })
    }

    async fn fetch_order_status(
        &self,
        order_id: &str,
    ) -> Result<OrderStatusSnapshot, BrokerError> {
        let body = OrderStatusRequest {
            apikey: self.api_key()?,
            strategy: &self.strategy_tag,
            orderid: order_id,
        };

        let text = self.post("/api/v1/orderstatus", &body).await?;
        let envelope: Envelope<OrderStatusSnapshot> = Self::decode(&text)?;

        if envelope.status != "success" {
            return Err(BrokerError::Api(envelope.remote_message()));
        }

        let mut snapshot = envelope.data.ok_or_else(|| {
            BrokerError::Decode(format!("order status envelope missing data: {}", text))
        })?;

        // Broker vocabulary varies in case; normalize once here.
        snapshot.order_status = snapshot.order_status.to_lowercase();
        Ok(snapshot)
    }
}
