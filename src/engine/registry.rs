//! Per-session auto-order registry.
//!
//! Owns every monitor record of one session together with its
//! cancellation signal. The map is guarded by a single mutex with short
//! critical sections; extraction of an entry under the lock is the
//! exactly-once cleanup latch.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::{AutoOrder, MonitorStatus};

struct MonitorEntry {
    order: AutoOrder,
    /// Unary cancellation signal. The registry owns the sender; workers
    /// only ever hold the receiver. Dropping the sender on `remove`
    /// closes the channel, and closed means cancelled.
    cancel_tx: mpsc::Sender<()>,
}

/// Registry of running monitors for one session.
#[derive(Default)]
pub struct AutoOrderRegistry {
    monitors: Mutex<HashMap<String, MonitorEntry>>,
}

impl AutoOrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id() -> String {
        let raw = Uuid::new_v4().simple().to_string();
        format!("AO-{}", &raw[..8])
    }

    /// Insert a record, issue its id and create its cancellation signal.
    /// Returns the registered record and the receiver for its worker.
    pub fn add(&self, mut order: AutoOrder) -> (AutoOrder, mpsc::Receiver<()>) {
        let id = Self::next_id();
        order.id = id.clone();
        order.status = MonitorStatus::Running;

        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        let mut monitors = self.monitors.lock().unwrap();
        let _prior = monitors.insert(
            id,
            MonitorEntry {
                order: order.clone(),
                cancel_tx,
            },
        );
        debug_assert!(_prior.is_none(), "registry issued a duplicate id");

        (order, cancel_rx)
    }

    pub fn get(&self, id: &str) -> Option<AutoOrder> {
        self.monitors.lock().unwrap().get(id).map(|e| e.order.clone())
    }

    /// All monitors owned by a user, newest first.
    pub fn list(&self, user_id: &str) -> Vec<AutoOrder> {
        let monitors = self.monitors.lock().unwrap();
        let mut owned: Vec<AutoOrder> = monitors
            .values()
            .filter(|e| e.order.user_id == user_id)
            .map(|e| e.order.clone())
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned
    }

    pub fn ids_for(&self, user_id: &str) -> Vec<String> {
        self.monitors
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.order.user_id == user_id)
            .map(|e| e.order.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.monitors.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Update a record's status in place. No-op once the entry is gone.
    pub fn set_status(&self, id: &str, status: MonitorStatus) -> bool {
        let mut monitors = self.monitors.lock().unwrap();
        match monitors.get_mut(id) {
            Some(entry) => {
                entry.order.status = status;
                true
            }
            None => false,
        }
    }

    /// Non-blocking cancellation signal. Returns whether the signal was
    /// accepted; duplicates while one is pending are absorbed.
    pub fn signal_cancel(&self, id: &str) -> bool {
        let monitors = self.monitors.lock().unwrap();
        match monitors.get(id) {
            Some(entry) => entry.cancel_tx.try_send(()).is_ok(),
            None => false,
        }
    }

    /// Remove an entry and close its cancellation signal.
    ///
    /// Exactly-once: only the caller that wins the map extraction drops
    /// the sender; a second `remove` observes `None` and does nothing,
    /// so concurrent cancel and natural-exit cleanup cannot double-close.
    pub fn remove(&self, id: &str) -> Option<AutoOrder> {
        self.monitors
            .lock()
            .unwrap()
            .remove(id)
            .map(|entry| entry.order)
    }

    /// Replace the cancel channel of a still-registered monitor and hand
    /// back the fresh receiver. Used by the panic supervisor, whose
    /// restarted worker lost its receiver with the crashed task.
    pub fn rearm(&self, id: &str) -> Option<mpsc::Receiver<()>> {
        let mut monitors = self.monitors.lock().unwrap();
        let entry = monitors.get_mut(id)?;
        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        entry.cancel_tx = cancel_tx;
        Some(cancel_rx)
    }

    /// Signal and remove every monitor a user owns; returns the ids.
    /// Used by `/cancel_all_orders` and session teardown.
    pub fn cancel_all(&self, user_id: &str) -> Vec<String> {
        let ids = self.ids_for(user_id);
        for id in &ids {
            self.signal_cancel(id);
            self.remove(id);
        }
        ids
    }
}
