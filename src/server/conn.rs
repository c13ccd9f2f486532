//! Outbound connection handle shared between a session and its transport.
//!
//! The session only knows "something it can push frames to and whose close
//! it can observe"; the WebSocket glue lives in the stream handlers. Close
//! is idempotent and visible to both sides through the cancellation token.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ExchangeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct UserConn {
    user_id: String,
    tx: mpsc::Sender<Frame>,
    closed: CancellationToken,
}

impl UserConn {
    /// Returns the connection handle plus the receiver the transport task
    /// drains into the socket.
    pub fn new(user_id: impl Into<String>, buffer: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            Self {
                user_id: user_id.into(),
                tx,
                closed: CancellationToken::new(),
            },
            rx,
        )
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Blocks on transport backpressure; fails once the connection closed.
    pub async fn send(&self, frame: Frame) -> Result<(), ExchangeError> {
        if self.closed.is_cancelled() {
            return Err(ExchangeError::TransportClosed);
        }
        self.tx
            .send(frame)
            .await
            .map_err(|_| ExchangeError::TransportClosed)
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token observers can await to learn about the close.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }
}
