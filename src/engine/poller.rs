//! Broker order-status poller.
//!
//! One ephemeral task per placed order. `complete` ends the chain
//! silently; a dead order tells the user; running out of attempts asks
//! them to verify manually. Unknown broker vocabulary is non-terminal.

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::monitor::WorkerSettings;
use super::MonitorContext;

pub fn spawn_status_poll(
    ctx: MonitorContext,
    monitor_id: String,
    broker_order_id: String,
    settings: WorkerSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for attempt in 1..=settings.poll_attempts {
            sleep(settings.poll_interval).await;

            // The parent monitor may have been cancelled or expired while
            // we slept; a removed monitor ends the chain.
            if ctx.registry.get(&monitor_id).is_none() {
                debug!(monitor = %monitor_id, "monitor removed; stopping status poll");
                return;
            }

            match ctx.gateway.fetch_order_status(&broker_order_id).await {
                Ok(snapshot) if snapshot.is_complete() => {
                    debug!(
                        order = %broker_order_id,
                        attempt,
                        avg_price = snapshot.average_price,
                        "order complete"
                    );
                    return;
                }
                Ok(snapshot) if snapshot.is_dead() => {
                    warn!(
                        order = %broker_order_id,
                        status = %snapshot.order_status,
                        "order did not fill"
                    );
                    ctx.outbox.error(format!(
                        "❌ Order {} was {}: verify your positions.",
                        broker_order_id, snapshot.order_status
                    ));
                    ctx.alert(
                        &format!("Order {} {}", broker_order_id, snapshot.order_status),
                        &format!(
                            "<p>Order {} for monitor {} ended as {}.</p>",
                            broker_order_id, monitor_id, snapshot.order_status
                        ),
                    )
                    .await;
                    return;
                }
                Ok(snapshot) => {
                    debug!(
                        order = %broker_order_id,
                        status = %snapshot.order_status,
                        attempt,
                        "order not terminal yet"
                    );
                }
                Err(e) => {
                    warn!(order = %broker_order_id, attempt, error = %e, "status poll failed");
                }
            }
        }

        ctx.outbox.system(format!(
            "⚠️ Order {} is still unresolved after {} checks; please verify manually.",
            broker_order_id, settings.poll_attempts
        ));
        ctx.alert(
            &format!("Order {} unresolved", broker_order_id),
            &format!(
                "<p>Order {} for monitor {} did not reach a terminal status within the polling window.</p>",
                broker_order_id, monitor_id
            ),
        )
        .await;
    })
}
