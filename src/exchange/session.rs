//! Per-user session: the single task that owns one user's balances, open
//! orders and current candle.
//!
//! All mutation goes through this loop. Command handlers submit opaque
//! actions (closures) and block until the loop has run them, which gives
//! single-writer semantics without locks. The candle pump is gated on the
//! order book's activity signal: while no order is open, the replay is
//! paused, not drained.
//!
//! Every action bumps the current candle timestamp by one millisecond so
//! that orders created inside one real tick still get strictly increasing
//! transact times.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ExchangeError;
use crate::exchange::balance::BalanceSheet;
use crate::exchange::book::{Activity, OrderBook};
use crate::exchange::handle::SessionHandle;
use crate::exchange::matching;
use crate::feed::{CandleSource, ReplayDriver};
use crate::models::{Balance, CandleTick, Order, OrderStatus};
use crate::server::conn::{Frame, UserConn};
use crate::server::wire;

pub type Action = Box<dyn FnOnce(&mut Session) + Send + 'static>;

/// Everything a session needs from the process config.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Commission as a fraction in `[0, 1)`.
    pub commission: Decimal,
    pub kline_file: PathBuf,
    pub listener_delay: Duration,
    pub offset: i64,
}

/// Snapshot pushed to a notifications subscriber when the session ends.
#[derive(Debug, Clone, Serialize)]
pub struct FinalSnapshot {
    pub user: String,
    pub price: Option<Decimal>,
    pub balances: Vec<Balance>,
    pub open_orders: Vec<Order>,
}

/// The state owned by one session loop. Only that loop ever touches it.
pub struct Session {
    user_id: String,
    balances: BalanceSheet,
    book: OrderBook,
    current: Option<CandleTick>,
    running: bool,
    exhausted: bool,
    /// Ticks below this timestamp are observed but neither pushed nor
    /// matched (set by the `exchange_offset` command).
    offset: i64,
    order_seq: u64,
    commission: Decimal,
    order_conn: Option<UserConn>,
    price_conn: Option<UserConn>,
    final_notify: Option<oneshot::Sender<FinalSnapshot>>,
    cancel: CancellationToken,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Close of the most recent candle. `symbol` is only validated — a
    /// session replays a single pair.
    pub fn price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        if symbol.is_empty() {
            return Err(ExchangeError::invalid("empty symbol"));
        }
        let tick = self.current.as_ref().ok_or(ExchangeError::NoData)?;
        debug!(user = %self.user_id, symbol, price = %tick.close, "get price");
        Ok(tick.close)
    }

    pub fn balances_list(&self) -> Vec<Balance> {
        self.balances.list()
    }

    pub fn balances_set(&mut self, balances: Vec<Balance>) {
        self.balances.set(balances);
        debug!(user = %self.user_id, "balances set");
    }

    pub fn create_order(&mut self, mut order: Order) -> Result<Order, ExchangeError> {
        if order.id.is_empty() {
            return Err(ExchangeError::invalid("empty order id"));
        }
        if order.price <= Decimal::ZERO || order.quantity <= Decimal::ZERO {
            return Err(ExchangeError::invalid(
                "price and quantity must be positive",
            ));
        }
        if self.book.get(&order.id).is_some() {
            return Err(ExchangeError::invalid(format!(
                "order {} already exists",
                order.id
            )));
        }
        let ts = self.now()?;

        self.order_seq += 1;
        order.order_id = self.order_seq;
        order.user_id = self.user_id.clone();
        order.symbol = order.symbol.to_uppercase();
        order.status = OrderStatus::New;
        order.transact_time = ts;
        order.total = order.price * order.quantity;

        // Reserve funds first: if that fails the order was never accepted.
        self.balances.apply(&order, self.commission)?;
        let stored = self.book.add(order);
        info!(
            user = %self.user_id,
            order = %stored.id,
            symbol = %stored.symbol,
            side = stored.side.as_str(),
            "order created"
        );
        Ok(stored)
    }

    /// Each order of the batch gets its own +1 ms so ids and timestamps
    /// stay unique inside one action. A failure aborts the rest of the
    /// batch; already-created orders stand.
    pub fn create_orders(&mut self, orders: Vec<Order>) -> Result<Vec<Order>, ExchangeError> {
        let mut created = Vec::with_capacity(orders.len());
        for order in orders {
            self.bump_clock();
            created.push(self.create_order(order)?);
        }
        Ok(created)
    }

    /// Cancels `cancel_id` (tolerating an already-gone target, as a
    /// replace that races its own fill must) and creates the replacement.
    pub fn replace_order(
        &mut self,
        cancel_id: &str,
        order: Order,
    ) -> Result<Order, ExchangeError> {
        match self.cancel_order(cancel_id) {
            Ok(_) | Err(ExchangeError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        self.create_order(order)
    }

    pub fn get_order(&self, id: &str) -> Result<Order, ExchangeError> {
        self.book
            .get(id)
            .cloned()
            .ok_or_else(|| ExchangeError::not_found(format!("order {id}")))
    }

    pub fn cancel_order(&mut self, id: &str) -> Result<Order, ExchangeError> {
        let order = self.book.cancel(id)?;
        self.balances.apply(&order, self.commission)?;
        info!(user = %self.user_id, order = %order.id, "order canceled");
        Ok(order)
    }

    pub fn cancel_orders(&mut self, ids: &[String]) -> Result<(), ExchangeError> {
        for id in ids {
            self.cancel_order(id)?;
        }
        Ok(())
    }

    /// Manual override of the order-book gate (`exchange_start` /
    /// `exchange_stop`).
    pub fn set_running(&mut self, running: bool) {
        if self.running != running {
            debug!(user = %self.user_id, running, "replay gate set");
        }
        self.running = running;
    }

    pub fn set_offset(&mut self, offset: i64) {
        debug!(user = %self.user_id, offset, "replay offset set");
        self.offset = offset;
    }

    /// Binds (or replaces) the order-update push connection.
    pub fn set_order_conn(&mut self, conn: UserConn) {
        if let Some(old) = self.order_conn.replace(conn) {
            old.close();
        }
    }

    /// Binds (or replaces) the price push connection.
    pub fn set_price_conn(&mut self, conn: UserConn) {
        if let Some(old) = self.price_conn.replace(conn) {
            old.close();
        }
    }

    /// Registers the notifications subscriber that receives the final
    /// snapshot on shutdown. A newer subscription replaces the old one.
    pub fn set_final_notify(&mut self, tx: oneshot::Sender<FinalSnapshot>) {
        self.final_notify = Some(tx);
    }

    fn now(&self) -> Result<i64, ExchangeError> {
        self.current
            .as_ref()
            .map(|t| t.unix)
            .ok_or(ExchangeError::NoData)
    }

    fn bump_clock(&mut self) {
        if let Some(tick) = &mut self.current {
            tick.unix += 1;
        }
    }

    fn final_snapshot(&self) -> FinalSnapshot {
        FinalSnapshot {
            user: self.user_id.clone(),
            price: self.current.as_ref().map(|t| t.close),
            balances: self.balances.list(),
            open_orders: self.book.snapshot(),
        }
    }

    /// Handles one candle: publish the price, fill every crossing order in
    /// insertion order, then drop the filled set from the book in one bulk
    /// operation. Errors returned here are session-fatal.
    async fn on_tick(&mut self, tick: CandleTick) -> Result<(), ExchangeError> {
        self.current = Some(tick.clone());
        if tick.unix < self.offset {
            return Ok(());
        }

        if let Some(conn) = &self.price_conn {
            conn.send(Frame::Text(serde_json::to_string(&tick)?)).await?;
        }

        let mut filled: Vec<String> = Vec::new();
        for mut order in self.book.snapshot() {
            if !matching::crosses(&order, &tick) {
                continue;
            }
            matching::check_volume(&order, &tick)?;

            order.status = OrderStatus::Filled;
            if let Err(err) = self.balances.apply(&order, self.commission) {
                error!(
                    user = %self.user_id,
                    order = %order.id,
                    error = %err,
                    "fill skipped: balance update failed"
                );
                continue;
            }
            info!(
                user = %self.user_id,
                order = %order.id,
                symbol = %order.symbol,
                side = order.side.as_str(),
                ts = tick.unix,
                "order filled"
            );
            filled.push(order.id.clone());

            if let Some(conn) = &self.order_conn {
                conn.send(Frame::Binary(wire::encode_order_update(&order)))
                    .await?;
            }
        }
        if !filled.is_empty() {
            self.book.bulk_remove(&filled);
        }
        Ok(())
    }

    /// Best-effort error frame on the order stream before a fatal close.
    async fn push_error(&self, err: &ExchangeError) {
        if let Some(conn) = &self.order_conn {
            let frame = serde_json::json!({ "code": err.kind(), "error": err.to_string() });
            let _ = conn.send(Frame::Text(frame.to_string())).await;
        }
    }
}

/// Opens the user's own replay of the kline file and starts the loop.
pub(crate) fn spawn(
    user_id: String,
    settings: &SessionSettings,
    cancel: CancellationToken,
    reaped: mpsc::UnboundedSender<String>,
) -> Result<SessionHandle, ExchangeError> {
    let source = CandleSource::open(&settings.kline_file, settings.offset)?;
    let replay = ReplayDriver::spawn(source, settings.listener_delay);

    let (actions_tx, actions_rx) = mpsc::channel::<Action>(100);
    let (book, activity) = OrderBook::new();

    let state = Session {
        user_id: user_id.clone(),
        balances: BalanceSheet::new(),
        book,
        current: None,
        running: false,
        exhausted: false,
        offset: 0,
        order_seq: 0,
        commission: settings.commission,
        order_conn: None,
        price_conn: None,
        final_notify: None,
        cancel: cancel.clone(),
    };

    let runtime = SessionRuntime {
        actions: actions_rx,
        activity,
        replay,
        state,
        reaped,
    };
    tokio::spawn(runtime.run());

    Ok(SessionHandle::new(user_id, actions_tx, cancel))
}

struct SessionRuntime {
    actions: mpsc::Receiver<Action>,
    activity: mpsc::UnboundedReceiver<Activity>,
    replay: ReplayDriver,
    state: Session,
    reaped: mpsc::UnboundedSender<String>,
}

impl SessionRuntime {
    async fn run(mut self) {
        let user = self.state.user_id.clone();

        // Pull the first candle before serving anything so early actions
        // observe a price; the driver emits it eagerly.
        tokio::select! {
            _ = self.state.cancel.cancelled() => {
                self.shutdown().await;
                return;
            }
            first = self.replay.recv() => match first {
                Some(tick) => self.state.current = Some(tick),
                None => {
                    self.state.exhausted = true;
                    warn!(user = %user, "kline stream empty at session start");
                }
            }
        }

        loop {
            let order_closed = self.state.order_conn.as_ref().map(|c| c.closed());
            let price_closed = self.state.price_conn.as_ref().map(|c| c.closed());

            tokio::select! {
                _ = self.state.cancel.cancelled() => break,
                _ = closed(order_closed) => {
                    debug!(user = %user, "order connection closed");
                    break;
                }
                _ = closed(price_closed) => {
                    debug!(user = %user, "price connection closed");
                    break;
                }
                act = self.actions.recv() => {
                    let Some(act) = act else { break };
                    self.state.bump_clock();
                    act(&mut self.state);
                    // Drain whatever queued behind it inside this tick.
                    while let Ok(act) = self.actions.try_recv() {
                        self.state.bump_clock();
                        act(&mut self.state);
                    }
                }
                sig = self.activity.recv() => {
                    if let Some(sig) = sig {
                        self.state.set_running(matches!(sig, Activity::On));
                    }
                }
                tick = self.replay.recv(), if self.state.running && !self.state.exhausted => {
                    match tick {
                        None => {
                            // Keep serving commands against the last candle.
                            self.state.exhausted = true;
                            warn!(user = %user, "kline stream exhausted");
                        }
                        Some(tick) => {
                            if let Err(err) = self.state.on_tick(tick).await {
                                error!(user = %user, error = %err, "session failed on tick");
                                self.state.push_error(&err).await;
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// At-most-once by construction: the loop exits exactly once.
    async fn shutdown(mut self) {
        self.actions.close();
        self.replay.close();

        if let Some(tx) = self.state.final_notify.take() {
            let _ = tx.send(self.state.final_snapshot());
        }
        if let Some(conn) = self.state.order_conn.take() {
            conn.close();
        }
        if let Some(conn) = self.state.price_conn.take() {
            conn.close();
        }
        self.state.cancel.cancel();
        let _ = self.reaped.send(self.state.user_id.clone());
        info!(user = %self.state.user_id, "session closed");
    }
}

async fn closed(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled_owned().await,
        None => std::future::pending().await,
    }
}
