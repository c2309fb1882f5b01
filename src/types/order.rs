//! Order and monitor record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Interval;

/// Broker product segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Product {
    /// Intraday (margin intraday square-off).
    Mis,
    /// Overnight futures/options.
    Nrml,
    /// Cash and carry (delivery).
    Cnc,
}

impl Product {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MIS" => Some(Product::Mis),
            "NRML" => Some(Product::Nrml),
            "CNC" => Some(Product::Cnc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Mis => "MIS",
            Product::Nrml => "NRML",
            Product::Cnc => "CNC",
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Buy => "BUY",
            OrderAction::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Price type for smart orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriceType {
    Market,
    Limit,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Market => "MARKET",
            PriceType::Limit => "LIMIT",
        }
    }
}

/// Lifecycle status of an auto-order monitor.
///
/// Terminal statuses are sticky; a monitor is observable via the registry
/// only while non-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    Running,
    Executed,
    Cancelled,
    Expired,
    Failed,
}

impl MonitorStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MonitorStatus::Running)
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MonitorStatus::Running => "running",
            MonitorStatus::Executed => "executed",
            MonitorStatus::Cancelled => "cancelled",
            MonitorStatus::Expired => "expired",
            MonitorStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A running background conditional order (one monitor record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoOrder {
    /// Opaque id, stable for the session. Issued by the registry.
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub exchange: String,
    pub product: Product,
    pub action: OrderAction,
    pub quantity: u32,
    pub interval: Interval,
    /// Predicate text as the user wrote it.
    pub predicate: String,
    pub status: MonitorStatus,
    pub created_at: DateTime<Utc>,
    /// Monitoring stops at this instant. Always after `created_at`.
    pub expires_at: DateTime<Utc>,
}

/// Broker-neutral smart order request. The gateway injects the API key
/// and strategy tag on the wire; callers never see either.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartOrderRequest {
    pub symbol: String,
    pub exchange: String,
    pub action: OrderAction,
    pub price_type: PriceType,
    pub product: Product,
    pub quantity: u32,
    /// Limit price; only meaningful with `PriceType::Limit`.
    pub price: Option<f64>,
}

/// Broker acknowledgement of an accepted smart order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: String,
    /// Envelope status as reported by the broker (normally "success").
    pub status: String,
}

/// Broker-side order status snapshot from the status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusSnapshot {
    #[serde(rename = "orderid")]
    pub order_id: String,
    /// Broker vocabulary, e.g. "complete", "open", "rejected",
    /// "trigger pending". Normalized to lowercase by the gateway.
    #[serde(rename = "order_status")]
    pub order_status: String,
    #[serde(rename = "average_price", default)]
    pub average_price: f64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub timestamp: String,
}

impl OrderStatusSnapshot {
    /// Terminal success.
    pub fn is_complete(&self) -> bool {
        self.order_status == "complete"
    }

    /// Terminal failure (order will never fill).
    pub fn is_dead(&self) -> bool {
        matches!(self.order_status.as_str(), "rejected" | "cancelled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_parse_is_case_insensitive() {
        assert_eq!(Product::parse("mis"), Some(Product::Mis));
        assert_eq!(Product::parse("NRML"), Some(Product::Nrml));
        assert_eq!(Product::parse("CnC"), Some(Product::Cnc));
        assert_eq!(Product::parse("BO"), None);
    }

    #[test]
    fn test_monitor_status_terminal() {
        assert!(!MonitorStatus::Running.is_terminal());
        assert!(MonitorStatus::Executed.is_terminal());
        assert!(MonitorStatus::Cancelled.is_terminal());
        assert!(MonitorStatus::Expired.is_terminal());
        assert!(MonitorStatus::Failed.is_terminal());
    }

    #[test]
    fn test_order_status_snapshot_classification() {
        let snap = |s: &str| OrderStatusSnapshot {
            order_id: "X1".to_string(),
            order_status: s.to_string(),
            average_price: 0.0,
            quantity: 0,
            timestamp: String::new(),
        };

        assert!(snap("complete").is_complete());
        assert!(snap("rejected").is_dead());
        assert!(snap("cancelled").is_dead());
        // Unknown vocabulary is non-terminal for polling purposes.
        assert!(!snap("trigger pending").is_complete());
        assert!(!snap("trigger pending").is_dead());
        assert!(!snap("validation pending").is_dead());
    }

    #[test]
    fn test_order_status_snapshot_deserialization() {
        let json = r#"{
            "orderid": "240719000001",
            "order_status": "complete",
            "average_price": 2450.25,
            "quantity": 10,
            "timestamp": "2024-07-19 10:15:00"
        }"#;

        let snap: OrderStatusSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.order_id, "240719000001");
        assert!(snap.is_complete());
        assert_eq!(snap.average_price, 2450.25);
    }

    #[test]
    fn test_action_wire_values() {
        assert_eq!(serde_json::to_string(&OrderAction::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&Product::Nrml).unwrap(), "\"NRML\"");
    }
}
