//! Per-session open-order set.
//!
//! Orders keep insertion order (fills resolve ties by it) and the book
//! emits an activity event whenever its size crosses the 0↔1 boundary.
//! That event gates the session's candle pump: no open orders, no replay.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ExchangeError;
use crate::models::{Order, OrderStatus};

/// Emitted on empty→non-empty (`On`) and non-empty→empty (`Off`)
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    On,
    Off,
}

#[derive(Debug)]
pub struct OrderBook {
    active: Vec<Order>,
    signal: mpsc::UnboundedSender<Activity>,
}

impl OrderBook {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Activity>) {
        let (signal, rx) = mpsc::unbounded_channel();
        (
            Self {
                active: Vec::new(),
                signal,
            },
            rx,
        )
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Appends an open order. The caller guarantees the id is unique; see
    /// [`crate::exchange::session::Session::create_order`].
    pub fn add(&mut self, order: Order) -> Order {
        let was_empty = self.active.is_empty();
        debug!(order = %order.id, symbol = %order.symbol, ts = order.transact_time, "order added");
        self.active.push(order);
        if was_empty {
            self.emit(Activity::On);
        }
        self.active[self.active.len() - 1].clone()
    }

    pub fn get(&self, id: &str) -> Option<&Order> {
        self.active.iter().find(|o| o.id == id)
    }

    /// Removes the order and returns it with status `CANCELED`.
    pub fn cancel(&mut self, id: &str) -> Result<Order, ExchangeError> {
        let idx = self
            .active
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| ExchangeError::not_found(format!("order {id}")))?;
        let mut order = self.active.remove(idx);
        order.status = OrderStatus::Canceled;
        debug!(order = %order.id, symbol = %order.symbol, "order canceled");
        if self.active.is_empty() {
            self.emit(Activity::Off);
        }
        Ok(order)
    }

    /// Removes every id in one pass, so a tick that fills several orders
    /// produces at most one activity event.
    pub fn bulk_remove(&mut self, ids: &[String]) {
        if ids.is_empty() || self.active.is_empty() {
            return;
        }
        self.active.retain(|o| !ids.contains(&o.id));
        if self.active.is_empty() {
            self.emit(Activity::Off);
        }
    }

    /// Consistent view for one tick iteration; the session loop never
    /// mutates the book while walking the snapshot.
    pub fn snapshot(&self) -> Vec<Order> {
        self.active.clone()
    }

    fn emit(&self, activity: Activity) {
        // The receiver lives in the session loop; if it is gone the session
        // is shutting down and the signal no longer matters.
        let _ = self.signal.send(activity);
    }
}
