//! Typed command surface over a session's action queue.
//!
//! Each method submits a closure to the session loop and blocks until it
//! ran, so a caller observes its command fully applied before the reply.
//! Submissions against a finished session fail with `TransportClosed`.

use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::ExchangeError;
use crate::exchange::session::{Action, FinalSnapshot, Session};
use crate::models::{Balance, Order};
use crate::server::conn::UserConn;

#[derive(Clone)]
pub struct SessionHandle {
    user_id: String,
    actions: mpsc::Sender<Action>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub(crate) fn new(
        user_id: String,
        actions: mpsc::Sender<Action>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            user_id,
            actions,
            cancel,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.actions.is_closed()
    }

    /// Runs `f` on the session loop and returns its result. Executed
    /// exactly once, or not at all if the session is gone.
    pub async fn submit<T, F>(&self, f: F) -> Result<T, ExchangeError>
    where
        F: FnOnce(&mut Session) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let action: Action = Box::new(move |session| {
            let _ = tx.send(f(session));
        });
        self.actions
            .send(action)
            .await
            .map_err(|_| ExchangeError::TransportClosed)?;
        rx.await.map_err(|_| ExchangeError::TransportClosed)
    }

    pub async fn price(&self, symbol: String) -> Result<Decimal, ExchangeError> {
        self.submit(move |s| s.price(&symbol)).await?
    }

    pub async fn balances(&self) -> Result<Vec<Balance>, ExchangeError> {
        self.submit(|s| s.balances_list()).await
    }

    pub async fn set_balances(&self, balances: Vec<Balance>) -> Result<(), ExchangeError> {
        self.submit(move |s| s.balances_set(balances)).await
    }

    pub async fn create_order(&self, order: Order) -> Result<Order, ExchangeError> {
        self.submit(move |s| s.create_order(order)).await?
    }

    pub async fn create_orders(&self, orders: Vec<Order>) -> Result<Vec<Order>, ExchangeError> {
        self.submit(move |s| s.create_orders(orders)).await?
    }

    pub async fn replace_order(
        &self,
        cancel_id: String,
        order: Order,
    ) -> Result<Order, ExchangeError> {
        self.submit(move |s| s.replace_order(&cancel_id, order))
            .await?
    }

    pub async fn get_order(&self, id: String) -> Result<Order, ExchangeError> {
        self.submit(move |s| s.get_order(&id)).await?
    }

    pub async fn cancel_order(&self, id: String) -> Result<Order, ExchangeError> {
        self.submit(move |s| s.cancel_order(&id)).await?
    }

    pub async fn cancel_orders(&self, ids: Vec<String>) -> Result<(), ExchangeError> {
        self.submit(move |s| s.cancel_orders(&ids)).await?
    }

    pub async fn start(&self) -> Result<(), ExchangeError> {
        self.submit(|s| s.set_running(true)).await
    }

    pub async fn stop(&self) -> Result<(), ExchangeError> {
        self.submit(|s| s.set_running(false)).await
    }

    pub async fn set_offset(&self, offset: i64) -> Result<(), ExchangeError> {
        self.submit(move |s| s.set_offset(offset)).await
    }

    pub async fn set_order_conn(&self, conn: UserConn) -> Result<(), ExchangeError> {
        self.submit(move |s| s.set_order_conn(conn)).await
    }

    pub async fn set_price_conn(&self, conn: UserConn) -> Result<(), ExchangeError> {
        self.submit(move |s| s.set_price_conn(conn)).await
    }

    pub async fn subscribe_final(
        &self,
        tx: oneshot::Sender<FinalSnapshot>,
    ) -> Result<(), ExchangeError> {
        self.submit(move |s| s.set_final_notify(tx)).await
    }
}
