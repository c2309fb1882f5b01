//! Session command dispatcher.
//!
//! Owns one user's command stream: echoes their message, toggles the
//! typing indicator, routes slash commands into the engine and forwards
//! everything else to the chat backend. All output goes through the
//! session outbox; the dispatcher never touches the socket.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::commands::{self, Command, Validity};
use super::Outbox;
use crate::broker::{BrokerError, MarketGateway};
use crate::config::Config;
use crate::engine::{spawn_monitor, AutoOrderRegistry, MonitorContext, WorkerSettings};
use crate::predicate::{self, scan};
use crate::services::{ChatBackend, MessageStore, Notifier, StoredMessage, CHAT_APOLOGY};
use crate::types::{
    AutoOrder, ClientFrame, Interval, MonitorStatus, OrderAction, PriceType, Product, Role,
    SmartOrderRequest,
};

const HELP_TEXT: &str = "Available commands:\n\
/price <SYMBOL> [EXCHANGE]\n\
/signal <SYMBOL> <INTERVAL> \"<PREDICATE>\" [EXCHANGE]\n\
/buy_smart <SYMBOL> <QTY> [EXCHANGE] [PRODUCT]\n\
/sell_smart <SYMBOL> <QTY> [EXCHANGE] [PRODUCT]\n\
/buy_smart_auto <SYMBOL> <QTY> <EXCHANGE> <PRODUCT> <INTERVAL> <VALIDITY> \"<PREDICATE>\"\n\
/sell_smart_auto <SYMBOL> <QTY> <EXCHANGE> <PRODUCT> <INTERVAL> <VALIDITY> \"<PREDICATE>\"\n\
/status_orders\n\
/cancel_order <ID>\n\
/cancel_all_orders\n\
Intervals: 5m, 15m, 1h. Validity: forever or <n>s/m/h/d (max 30d).\n\
Predicates: RSI14, EMA50, SMA200, ROC10, LinRegSlope20, MACD, CLOSE, \
sma(close,N), ema(close,N), rsi(close,N) with < > <= >= == != && || ! ( )";

/// Per-session dispatcher. Cheap to clone; everything shared is an Arc.
#[derive(Clone)]
pub struct Dispatcher {
    user_id: String,
    config: Arc<Config>,
    registry: Arc<AutoOrderRegistry>,
    gateway: Arc<dyn MarketGateway>,
    notifier: Arc<dyn Notifier>,
    chat: Arc<dyn ChatBackend>,
    store: Arc<dyn MessageStore>,
    outbox: Outbox,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        config: Arc<Config>,
        registry: Arc<AutoOrderRegistry>,
        gateway: Arc<dyn MarketGateway>,
        notifier: Arc<dyn Notifier>,
        chat: Arc<dyn ChatBackend>,
        store: Arc<dyn MessageStore>,
        outbox: Outbox,
    ) -> Self {
        Self {
            user_id,
            config,
            registry,
            gateway,
            notifier,
            chat,
            store,
            outbox,
        }
    }

    pub fn registry(&self) -> &Arc<AutoOrderRegistry> {
        &self.registry
    }

    fn monitor_context(&self) -> MonitorContext {
        MonitorContext {
            registry: self.registry.clone(),
            gateway: self.gateway.clone(),
            notifier: self.notifier.clone(),
            outbox: self.outbox.clone(),
            alert_email: self.config.alert_email.clone(),
        }
    }

    /// Route one inbound frame.
    pub async fn handle_frame(&self, frame: ClientFrame) {
        match frame {
            ClientFrame::Chat { content, file_id } => self.handle_chat(content, file_id).await,
            ClientFrame::Typing { .. } => {
                // Echo for multi-device clients.
                self.outbox.typing(true);
            }
            ClientFrame::Ping => self.outbox.pong(),
        }
    }

    async fn handle_chat(&self, content: String, _file_id: Option<i64>) {
        if let Err(e) = self
            .store
            .append(StoredMessage::now(&self.user_id, Role::User, &content))
            .await
        {
            warn!(user = %self.user_id, error = %e, "failed to persist user message");
        }

        // Echo before the typing indicator, which precedes any response.
        self.outbox.user_echo(&content);
        self.outbox.typing(true);

        let trimmed = content.trim().to_string();
        if trimmed.starts_with('/') {
            self.handle_command(&trimmed).await;
            self.outbox.typing(false);
        } else {
            // Free-form chat can be slow; answer off the read path like
            // any other worker, closing the typing indicator when done.
            let dispatcher = self.clone();
            tokio::spawn(async move {
                dispatcher.handle_freeform(&trimmed).await;
                dispatcher.outbox.typing(false);
            });
        }
    }

    /// Reply with assistant text, persisting it alongside the user line.
    async fn reply(&self, text: impl Into<String>) {
        let text = text.into();
        if let Err(e) = self
            .store
            .append(StoredMessage::now(&self.user_id, Role::Assistant, &text))
            .await
        {
            warn!(user = %self.user_id, error = %e, "failed to persist reply");
        }
        self.outbox.assistant(text);
    }

    async fn handle_freeform(&self, content: &str) {
        let history = self.store.recent(&self.user_id, 10).await;
        match self.chat.reply(content, &history, None).await {
            Ok(text) => self.reply(text).await,
            Err(e) => {
                warn!(user = %self.user_id, error = %e, "chat backend failed");
                self.reply(CHAT_APOLOGY).await;
            }
        }
    }

    async fn handle_command(&self, line: &str) {
        debug!(user = %self.user_id, command = line, "dispatching command");

        let command = match commands::parse(line) {
            Ok(c) => c,
            Err(msg) => {
                self.outbox.error(msg);
                return;
            }
        };

        match command {
            Command::Help => self.reply(HELP_TEXT).await,
            Command::Price { symbol, exchange } => self.cmd_price(&symbol, &exchange).await,
            Command::Signal {
                symbol,
                interval,
                predicate,
                exchange,
            } => self.cmd_signal(&symbol, interval, &predicate, &exchange).await,
            Command::SmartOrder {
                action,
                symbol,
                quantity,
                exchange,
                product,
            } => {
                self.cmd_smart_order(action, &symbol, quantity, &exchange, product)
                    .await
            }
            Command::SmartAuto {
                action,
                symbol,
                quantity,
                exchange,
                product,
                interval,
                validity,
                predicate,
            } => {
                self.cmd_smart_auto(
                    action, symbol, quantity, exchange, product, interval, validity, predicate,
                )
                .await
            }
            Command::StatusOrders => self.cmd_status_orders().await,
            Command::CancelOrder { id } => self.cmd_cancel_order(&id).await,
            Command::CancelAllOrders => self.cmd_cancel_all().await,
        }
    }

    async fn cmd_price(&self, symbol: &str, exchange: &str) {
        match self.gateway.fetch_quote(symbol, exchange).await {
            Ok(quote) => {
                let sign = if quote.change >= 0.0 { "+" } else { "" };
                self.reply(format!(
                    "📈 {} ({}): LTP {:.2} ({}{:.2}, {}{:.2}%) | O {:.2} H {:.2} L {:.2} | Prev close {:.2}",
                    symbol,
                    exchange,
                    quote.ltp,
                    sign,
                    quote.change,
                    sign,
                    quote.change_percent,
                    quote.open,
                    quote.high,
                    quote.low,
                    quote.previous_close
                ))
                .await;
            }
            Err(e) => self.outbox.error(format!("Failed to fetch {}: {}", symbol, e)),
        }
    }

    async fn fetch_closes(
        &self,
        symbol: &str,
        exchange: &str,
        interval: Interval,
    ) -> Result<Vec<f64>, BrokerError> {
        let end = Utc::now().date_naive();
        let start = end - chrono::Duration::days(interval.lookback_days());
        let candles = self
            .gateway
            .fetch_history(symbol, exchange, interval, start, end)
            .await?;
        Ok(candles.iter().map(|c| c.close).collect())
    }

    async fn cmd_signal(&self, symbol: &str, interval: Interval, predicate: &str, exchange: &str) {
        let closes = match self.fetch_closes(symbol, exchange, interval).await {
            Ok(closes) => closes,
            Err(e) => {
                self.outbox
                    .error(format!("Failed to fetch history for {}: {}", symbol, e));
                return;
            }
        };

        if closes.is_empty() {
            self.outbox
                .error(format!("No history available for {} on {}", symbol, exchange));
            return;
        }

        match predicate::evaluate(predicate, &closes) {
            Ok(eval) => {
                let verdict = if eval.met { "Signal Met" } else { "Signal Not Met" };
                let icon = if eval.met { "🔔" } else { "🔕" };
                let text = format!(
                    "{} {} for {} ({}): \"{}\" → {}. Values: {}",
                    icon,
                    verdict,
                    symbol,
                    interval,
                    predicate,
                    eval.met,
                    eval.values_summary()
                );

                if let Err(e) = self
                    .store
                    .append(StoredMessage::now(&self.user_id, Role::Assistant, &text))
                    .await
                {
                    warn!(user = %self.user_id, error = %e, "failed to persist reply");
                }
                self.outbox.signal_result(text, eval.met, eval.values);
            }
            Err(e) => self.outbox.error(format!("Invalid predicate: {}", e)),
        }
    }

    async fn cmd_smart_order(
        &self,
        action: OrderAction,
        symbol: &str,
        quantity: u32,
        exchange: &str,
        product: Product,
    ) {
        let req = SmartOrderRequest {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            action,
            price_type: PriceType::Market,
            product,
            quantity,
            price: None,
        };

        match self.gateway.place_smart_order(&req).await {
            Ok(ack) => {
                info!(user = %self.user_id, order = %ack.order_id, "smart order placed");
                self.reply(format!(
                    "✅ Order placed: {} {} x{} @ MARKET ({}), order {}",
                    action, symbol, quantity, product, ack.order_id
                ))
                .await;
            }
            Err(e) => self.outbox.error(format!("❌ Order failed: {}", e)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn cmd_smart_auto(
        &self,
        action: OrderAction,
        symbol: String,
        quantity: u32,
        exchange: String,
        product: Product,
        interval: Interval,
        validity: Validity,
        predicate: String,
    ) {
        // Reject statically-broken predicates before registering anything.
        if let Err(e) = scan::collect(&predicate) {
            self.outbox.error(format!("Invalid predicate: {}", e));
            return;
        }

        let now = Utc::now();
        let order = AutoOrder {
            id: String::new(), // issued by the registry
            user_id: self.user_id.clone(),
            symbol: symbol.clone(),
            exchange: exchange.clone(),
            product,
            action,
            quantity,
            interval,
            predicate: predicate.clone(),
            status: MonitorStatus::Running,
            created_at: now,
            expires_at: validity.expires_at(now),
        };

        let (registered, cancel_rx) = self.registry.add(order);
        let id = registered.id.clone();

        spawn_monitor(
            self.monitor_context(),
            registered.clone(),
            cancel_rx,
            WorkerSettings::for_interval(interval),
        );

        // Best-effort initial readout; registration stands either way.
        let readout = match self.fetch_closes(&symbol, &exchange, interval).await {
            Ok(closes) if !closes.is_empty() => match predicate::evaluate(&predicate, &closes) {
                Ok(eval) => format!("Current: {}", eval.values_summary()),
                Err(e) => format!("Initial readout unavailable: {}", e),
            },
            _ => "Initial readout unavailable".to_string(),
        };

        let until = match validity {
            Validity::Forever => "forever (rolling 30d)".to_string(),
            Validity::Until(_) => registered
                .expires_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        };

        self.reply(format!(
            "🤖 Auto-order {} armed: {} {} x{} ({}) on {} every {}, until {}.\nPredicate: \"{}\". {}",
            id, action, symbol, quantity, product, exchange, interval, until, predicate, readout
        ))
        .await;
    }

    async fn cmd_status_orders(&self) {
        let monitors = self.registry.list(&self.user_id);
        if monitors.is_empty() {
            self.reply("No active auto-orders.").await;
            return;
        }

        let mut lines = vec![format!("Active auto-orders ({}):", monitors.len())];
        for m in monitors {
            lines.push(format!(
                "• {}: {} {} x{} ({}) every {}, {} until {}, predicate \"{}\"",
                m.id,
                m.action,
                m.symbol,
                m.quantity,
                m.product,
                m.interval,
                m.status,
                m.expires_at.format("%Y-%m-%d %H:%M UTC"),
                m.predicate
            ));
        }
        self.reply(lines.join("\n")).await;
    }

    async fn cmd_cancel_order(&self, id: &str) {
        // Ownership check without leaking other sessions' monitors.
        let owned = self
            .registry
            .get(id)
            .map(|m| m.user_id == self.user_id)
            .unwrap_or(false);

        if !owned {
            self.outbox
                .error(format!("Auto-order {} not found.", id));
            return;
        }

        self.registry.signal_cancel(id);
        self.registry.remove(id);
        // The worker observes the signal and emits the cancel notice.
    }

    async fn cmd_cancel_all(&self) {
        let ids = self.registry.cancel_all(&self.user_id);
        if ids.is_empty() {
            self.reply("No active auto-orders to cancel.").await;
        } else {
            self.reply(format!("Cancelling {} auto-order(s).", ids.len()))
                .await;
        }
    }

    /// Session teardown: every worker of this session is cancelled.
    pub fn teardown(&self) {
        let ids = self.registry.cancel_all(&self.user_id);
        if !ids.is_empty() {
            info!(user = %self.user_id, count = ids.len(), "session closed; monitors cancelled");
        }
    }
}
