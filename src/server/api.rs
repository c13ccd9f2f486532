//! Command WebSocket: one JSON frame in, one JSON frame out.
//!
//! The envelope is `{"op": "<name>", ...}` with the command's fields
//! flattened alongside. Errors come back as
//! `{"code":"<kind>","error":"<detail>"}` frames; the connection stays up.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::ExchangeError;
use crate::exchange::{Registry, SessionHandle};
use crate::models::{Balance, Order};
use crate::server::{auth, error_frame, info};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub disable_auth: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(command_socket))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn command_socket(
    ws: WebSocketUpgrade,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let user = auth::user_from_parts(query.as_deref(), &headers);
    let user = match user {
        Ok(user) => Some(user),
        Err(err) if state.disable_auth => {
            debug!("command connection admitted without user metadata: {err}");
            None
        }
        Err(err) => return (StatusCode::UNAUTHORIZED, error_frame(&err)).into_response(),
    };
    ws.on_upgrade(move |socket| handle_commands(socket, state, user))
}

async fn handle_commands(mut socket: WebSocket, state: AppState, user: Option<String>) {
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let reply = dispatch(&state, user.as_deref(), &text).await;
                if socket.send(Message::Text(reply)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Command vocabulary of the WebSocket transport. This is adapter surface:
/// the exchange core only ever sees the resulting session calls.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
    ExchangeInfo,
    Price {
        symbol: String,
    },
    BalanceGet,
    BalanceSet {
        balances: Vec<Balance>,
    },
    OrderCreate {
        #[serde(flatten)]
        order: Order,
    },
    OrdersCreate {
        orders: Vec<Order>,
    },
    OrderReplace {
        #[serde(rename = "cancelId")]
        cancel_id: String,
        #[serde(flatten)]
        order: Order,
    },
    OrderGet {
        #[serde(rename = "clientOrderId")]
        id: String,
    },
    OrderCancel {
        #[serde(rename = "clientOrderId")]
        id: String,
    },
    OrdersCancel {
        ids: Vec<String>,
    },
    ExchangeStart,
    ExchangeStop,
    ExchangeOffset {
        offset: i64,
    },
}

pub(crate) async fn dispatch(state: &AppState, user: Option<&str>, raw: &str) -> String {
    trace!(user = user.unwrap_or("-"), raw, "command");
    match run_command(state, user, raw).await {
        Ok(reply) => reply,
        Err(err) => error_frame(&err),
    }
}

fn bound_session(state: &AppState, user: Option<&str>) -> Result<SessionHandle, ExchangeError> {
    let user = match user {
        Some(user) if !user.is_empty() => user,
        _ => return Err(ExchangeError::Unauthenticated),
    };
    state.registry.get_or_create(user)
}

async fn run_command(
    state: &AppState,
    user: Option<&str>,
    raw: &str,
) -> Result<String, ExchangeError> {
    let cmd: Command =
        serde_json::from_str(raw).map_err(|e| ExchangeError::invalid(e.to_string()))?;

    let ok = || serde_json::json!({ "ok": true });
    let reply = match cmd {
        // Served verbatim, no session needed.
        Command::ExchangeInfo => return Ok(info::get()?.to_string()),
        Command::Price { symbol } => {
            let session = bound_session(state, user)?;
            let price = session.price(symbol.clone()).await?;
            serde_json::json!({ "symbol": symbol, "price": price })
        }
        Command::BalanceGet => {
            let session = bound_session(state, user)?;
            serde_json::to_value(session.balances().await?)?
        }
        Command::BalanceSet { balances } => {
            let session = bound_session(state, user)?;
            session.set_balances(balances).await?;
            ok()
        }
        Command::OrderCreate { order } => {
            let session = bound_session(state, user)?;
            serde_json::to_value(session.create_order(order).await?)?
        }
        Command::OrdersCreate { orders } => {
            let session = bound_session(state, user)?;
            serde_json::to_value(session.create_orders(orders).await?)?
        }
        Command::OrderReplace { cancel_id, order } => {
            let session = bound_session(state, user)?;
            serde_json::to_value(session.replace_order(cancel_id, order).await?)?
        }
        Command::OrderGet { id } => {
            let session = bound_session(state, user)?;
            serde_json::to_value(session.get_order(id).await?)?
        }
        Command::OrderCancel { id } => {
            let session = bound_session(state, user)?;
            session.cancel_order(id).await?;
            ok()
        }
        Command::OrdersCancel { ids } => {
            let session = bound_session(state, user)?;
            session.cancel_orders(ids).await?;
            ok()
        }
        Command::ExchangeStart => {
            let session = bound_session(state, user)?;
            session.start().await?;
            ok()
        }
        Command::ExchangeStop => {
            let session = bound_session(state, user)?;
            session.stop().await?;
            ok()
        }
        Command::ExchangeOffset { offset } => {
            let session = bound_session(state, user)?;
            session.set_offset(offset).await?;
            ok()
        }
    };
    Ok(reply.to_string())
}
