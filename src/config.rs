use std::env;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Broker API base URL.
    pub broker_url: String,
    /// Broker API key, injected into every request by the gateway.
    pub broker_api_key: Option<String>,
    /// Strategy tag stamped on every smart order.
    pub strategy_tag: String,
    /// Recipient for order/monitor alert e-mails.
    pub alert_email: Option<String>,
    /// Webhook endpoint for the HTTP notifier; unset means log-only.
    pub alert_webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            broker_url: env::var("BROKER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string()),
            broker_api_key: env::var("BROKER_API_KEY").ok(),
            strategy_tag: env::var("STRATEGY_TAG").unwrap_or_else(|_| "assistant".to_string()),
            alert_email: env::var("ALERT_EMAIL").ok(),
            alert_webhook_url: env::var("ALERT_WEBHOOK_URL").ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
