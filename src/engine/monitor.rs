//! Monitor worker: one long-lived task per auto-order.
//!
//! The loop waits on cancel / expiry / tick (in that priority), evaluates
//! the predicate on each tick and places a smart order on the first tick
//! where it holds. A supervisor wraps the loop so a panicking tick
//! restarts monitoring instead of silently killing it, bounded by the
//! monitor's expiry.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{poller, MonitorContext};
use crate::predicate::{self, Evaluation, PredicateError};
use crate::types::{AutoOrder, MonitorStatus, PriceType, SmartOrderRequest};

/// Ticks never fire faster than this, whatever the interval says.
pub const MIN_TICK_PERIOD: Duration = Duration::from_secs(5);

/// Expiry timers are capped here even for "forever" monitors.
pub const MAX_MONITOR_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_POLL_ATTEMPTS: u32 = 5;

/// Timing knobs for one worker. Production values come from
/// [`WorkerSettings::for_interval`]; tests construct shorter ones.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub tick_period: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
}

impl WorkerSettings {
    pub fn for_interval(interval: crate::types::Interval) -> Self {
        Self {
            tick_period: interval.duration().max(MIN_TICK_PERIOD),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

/// Why the run loop ended.
enum LoopExit {
    Cancelled,
    Expired,
    InvalidPredicate(PredicateError),
}

/// Start the supervised worker for a registered monitor.
pub fn spawn_monitor(
    ctx: MonitorContext,
    order: AutoOrder,
    cancel_rx: mpsc::Receiver<()>,
    settings: WorkerSettings,
) -> JoinHandle<()> {
    tokio::spawn(supervise(ctx, order, cancel_rx, settings))
}

async fn supervise(
    ctx: MonitorContext,
    order: AutoOrder,
    cancel_rx: mpsc::Receiver<()>,
    settings: WorkerSettings,
) {
    info!(monitor = %order.id, symbol = %order.symbol, "monitor started");
    let mut cancel_rx = cancel_rx;

    loop {
        let worker = Worker {
            ctx: ctx.clone(),
            order: order.clone(),
            settings,
        };

        // The loop body runs in its own task so a panic is contained in
        // a JoinError instead of tearing down the session.
        let handle = tokio::spawn(worker.run(cancel_rx));

        match handle.await {
            Ok(exit) => {
                finish(&ctx, &order, exit).await;
                return;
            }
            Err(join_err) if join_err.is_panic() => {
                error!(monitor = %order.id, "monitor worker panicked");
                ctx.outbox.error(format!(
                    "Auto-order {} hit an internal error; the monitor is being restarted.",
                    order.id
                ));
                ctx.alert(
                    &format!("Auto-order {} worker crashed", order.id),
                    &format!(
                        "<p>The monitor for {} {} x{} crashed and was restarted.</p>",
                        order.action, order.symbol, order.quantity
                    ),
                )
                .await;

                if Utc::now() >= order.expires_at {
                    finish(&ctx, &order, LoopExit::Expired).await;
                    return;
                }

                // The receiver died inside the panicked task; re-arm the
                // signal under the registry's latch before restarting.
                match ctx.registry.rearm(&order.id) {
                    Some(fresh_rx) => {
                        cancel_rx = fresh_rx;
                        info!(monitor = %order.id, "monitor worker restarted");
                    }
                    None => {
                        // Removed while we were crashing: treat as cancel.
                        finish(&ctx, &order, LoopExit::Cancelled).await;
                        return;
                    }
                }
            }
            Err(_) => return,
        }
    }
}

/// Terminal bookkeeping: sticky status, exactly-once registry cleanup,
/// one user-facing message.
async fn finish(ctx: &MonitorContext, order: &AutoOrder, exit: LoopExit) {
    match exit {
        LoopExit::Cancelled => {
            ctx.registry.set_status(&order.id, MonitorStatus::Cancelled);
            ctx.registry.remove(&order.id);
            info!(monitor = %order.id, "monitor cancelled");
            ctx.outbox.system(format!(
                "🛑 Auto-order {} ({} {} x{}) cancelled.",
                order.id, order.action, order.symbol, order.quantity
            ));
        }
        LoopExit::Expired => {
            ctx.registry.set_status(&order.id, MonitorStatus::Expired);
            ctx.registry.remove(&order.id);
            info!(monitor = %order.id, "monitor expired");
            ctx.outbox.system(format!(
                "⏰ Auto-order {} ({} {} x{}) expired; monitoring stopped.",
                order.id, order.action, order.symbol, order.quantity
            ));
        }
        LoopExit::InvalidPredicate(e) => {
            ctx.registry.set_status(&order.id, MonitorStatus::Failed);
            ctx.registry.remove(&order.id);
            warn!(monitor = %order.id, error = %e, "monitor stopped on invalid predicate");
            ctx.outbox.error(format!(
                "Auto-order {} stopped, the predicate is invalid: {}",
                order.id, e
            ));
        }
    }
}

struct Worker {
    ctx: MonitorContext,
    order: AutoOrder,
    settings: WorkerSettings,
}

impl Worker {
    async fn run(self, mut cancel_rx: mpsc::Receiver<()>) -> LoopExit {
        let period = self.settings.tick_period;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let remaining = (self.order.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(MAX_MONITOR_LIFETIME);
        let expiry = sleep(remaining);
        tokio::pin!(expiry);

        loop {
            // biased: cancellation wins over expiry wins over ticks when
            // several are ready in the same cycle.
            tokio::select! {
                biased;

                // Some(()) is an explicit signal; None means the registry
                // dropped the sender. Closed means cancelled either way.
                _ = cancel_rx.recv() => return LoopExit::Cancelled,

                _ = &mut expiry => return LoopExit::Expired,

                _ = ticker.tick() => {
                    if let Some(exit) = self.tick().await {
                        return exit;
                    }
                }
            }
        }
    }

    /// One evaluation cycle. `None` keeps monitoring; `Some` ends the loop.
    async fn tick(&self) -> Option<LoopExit> {
        let end = Utc::now().date_naive();
        let start = end - chrono::Duration::days(self.order.interval.lookback_days());

        let candles = match self
            .ctx
            .gateway
            .fetch_history(
                &self.order.symbol,
                &self.order.exchange,
                self.order.interval,
                start,
                end,
            )
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(monitor = %self.order.id, error = %e, "history fetch failed; will retry");
                return None;
            }
        };

        if candles.is_empty() {
            debug!(monitor = %self.order.id, "empty history; staying in monitoring");
            return None;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let eval = match predicate::evaluate(&self.order.predicate, &closes) {
            Ok(eval) => eval,
            Err(e) => return Some(LoopExit::InvalidPredicate(e)),
        };

        debug!(
            monitor = %self.order.id,
            met = eval.met,
            values = %eval.values_summary(),
            "predicate evaluated"
        );

        if eval.met {
            self.place_order(&eval).await;
        }

        None
    }

    /// Place the smart order for a met predicate. At most one in-flight
    /// placement exists per monitor because ticks are serialized.
    async fn place_order(&self, eval: &Evaluation) {
        let req = SmartOrderRequest {
            symbol: self.order.symbol.clone(),
            exchange: self.order.exchange.clone(),
            action: self.order.action,
            price_type: PriceType::Market,
            product: self.order.product,
            quantity: self.order.quantity,
            price: None,
        };

        match self.ctx.gateway.place_smart_order(&req).await {
            Ok(ack) => {
                info!(
                    monitor = %self.order.id,
                    broker_order = %ack.order_id,
                    "auto-order executed"
                );
                self.ctx.outbox.system(format!(
                    "✅ AUTO-ORDER EXECUTED: {} {} x{} @ MARKET (order {}). Signal: {}. Monitoring continues.",
                    self.order.action,
                    self.order.symbol,
                    self.order.quantity,
                    ack.order_id,
                    eval.values_summary()
                ));
                self.ctx
                    .alert(
                        &format!("Auto-order {} executed", self.order.id),
                        &format!(
                            "<p>{} {} x{} placed as order {}.</p><p>Signal: {}</p>",
                            self.order.action,
                            self.order.symbol,
                            self.order.quantity,
                            ack.order_id,
                            eval.values_summary()
                        ),
                    )
                    .await;

                poller::spawn_status_poll(
                    self.ctx.clone(),
                    self.order.id.clone(),
                    ack.order_id,
                    self.settings,
                );
            }
            Err(e) if !e.is_transient() => {
                // Broker said no. One-off conditions (margin, bans) may
                // clear, so monitoring continues.
                warn!(monitor = %self.order.id, error = %e, "order rejected");
                self.ctx
                    .outbox
                    .error(format!("❌ Auto-order {}: {}", self.order.id, e));
                self.ctx
                    .alert(
                        &format!("Auto-order {} rejected", self.order.id),
                        &format!(
                            "<p>{} {} x{} was rejected: {}</p>",
                            self.order.action, self.order.symbol, self.order.quantity, e
                        ),
                    )
                    .await;
            }
            Err(e) => {
                // Transport-level failure: the order may simply be
                // retried on the next matching tick.
                warn!(monitor = %self.order.id, error = %e, "order placement failed; will retry");
            }
        }
    }
}
