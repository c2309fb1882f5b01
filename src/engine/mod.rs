//! Conditional auto-order engine: registry, monitor workers and the
//! order-status poller.

pub mod monitor;
pub mod poller;
pub mod registry;

pub use monitor::{spawn_monitor, WorkerSettings};
pub use registry::AutoOrderRegistry;

use std::sync::Arc;

use crate::broker::MarketGateway;
use crate::services::Notifier;
use crate::session::Outbox;

/// Shared dependencies handed to every worker and poller of a session.
#[derive(Clone)]
pub struct MonitorContext {
    pub registry: Arc<AutoOrderRegistry>,
    pub gateway: Arc<dyn MarketGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub outbox: Outbox,
    /// Recipient for alert mails; unset disables them silently.
    pub alert_email: Option<String>,
}

impl MonitorContext {
    /// Fire-and-forget alert; delivery failure is logged by the notifier
    /// implementation and never bubbles into monitor control flow.
    pub async fn alert(&self, subject: &str, body_html: &str) {
        if let Some(recipient) = &self.alert_email {
            if let Err(e) = self.notifier.send(recipient, subject, body_html).await {
                tracing::warn!(subject, error = %e, "alert delivery failed");
            }
        }
    }
}
