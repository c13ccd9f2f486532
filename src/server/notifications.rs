//! Final-snapshot subscriptions.
//!
//! A subscriber asks for a user's end-of-session state; when that session
//! shuts down it emits one JSON snapshot (last price, balances, open
//! orders) and the subscription completes. Only already-known users can be
//! subscribed to.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::oneshot;
use tracing::info;

use crate::server::api::AppState;
use crate::server::{auth, error_frame};

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/", get(notify_socket))
        .route("/ws", get(notify_socket))
        .with_state(app)
}

async fn notify_socket(
    ws: WebSocketUpgrade,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let user = match auth::user_from_parts(query.as_deref(), &headers) {
        Ok(user) => user,
        Err(err) => return (StatusCode::UNAUTHORIZED, error_frame(&err)).into_response(),
    };
    ws.on_upgrade(move |socket| subscribe(socket, state, user))
}

async fn subscribe(mut socket: WebSocket, state: AppState, user: String) {
    let handle = match state.registry.get(&user) {
        Ok(handle) => handle,
        Err(err) => {
            let _ = socket.send(Message::Text(error_frame(&err))).await;
            return;
        }
    };

    let (tx, rx) = oneshot::channel();
    if let Err(err) = handle.subscribe_final(tx).await {
        let _ = socket.send(Message::Text(error_frame(&err))).await;
        return;
    }
    info!(user, "notification subscribe");

    tokio::select! {
        snapshot = rx => {
            if let Ok(snapshot) = snapshot {
                if let Ok(json) = serde_json::to_string(&snapshot) {
                    let _ = socket.send(Message::Text(json)).await;
                }
            }
        }
        _ = wait_close(&mut socket) => {}
    }
}

async fn wait_close(socket: &mut WebSocket) {
    loop {
        match socket.recv().await {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
            Some(Ok(_)) => {}
        }
    }
}
