//! Push-stream listeners: order updates and prices.
//!
//! Each connection binds a [`UserConn`] into the user's session (creating
//! the session on first contact) and then pumps frames from the session to
//! the socket. Either side closing tears the binding down, which the
//! session observes as a shutdown trigger.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::debug;

use crate::server::api::AppState;
use crate::server::conn::{Frame, UserConn};
use crate::server::{auth, error_frame};

/// Which session slot this listener feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Orders,
    Prices,
}

#[derive(Clone)]
struct StreamState {
    app: AppState,
    kind: StreamKind,
}

pub fn router(app: AppState, kind: StreamKind) -> Router {
    Router::new()
        .route("/", get(stream_socket))
        .route("/ws", get(stream_socket))
        .with_state(StreamState { app, kind })
}

async fn stream_socket(
    ws: WebSocketUpgrade,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    State(state): State<StreamState>,
) -> Response {
    let user = match auth::user_from_parts(query.as_deref(), &headers) {
        Ok(user) => user,
        Err(err) => return (StatusCode::UNAUTHORIZED, error_frame(&err)).into_response(),
    };
    ws.on_upgrade(move |socket| bind_stream(socket, state, user))
}

async fn bind_stream(mut socket: WebSocket, state: StreamState, user: String) {
    let handle = match state.app.registry.get_or_create(&user) {
        Ok(handle) => handle,
        Err(err) => {
            let _ = socket.send(Message::Text(error_frame(&err))).await;
            return;
        }
    };

    let (conn, mut frames) = UserConn::new(user.clone(), 64);
    let bound = match state.kind {
        StreamKind::Orders => handle.set_order_conn(conn.clone()).await,
        StreamKind::Prices => handle.set_price_conn(conn.clone()).await,
    };
    if let Err(err) = bound {
        let _ = socket.send(Message::Text(error_frame(&err))).await;
        return;
    }
    debug!(user, kind = ?state.kind, "stream bound");

    let closed = conn.closed();
    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let msg = match frame {
                    Frame::Text(text) => Message::Text(text),
                    Frame::Binary(bytes) => Message::Binary(bytes),
                };
                if socket.send(msg).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    // Push streams ignore client chatter.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    conn.close();
    debug!(user, kind = ?state.kind, "stream connection closed");
}
