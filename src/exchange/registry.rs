//! Process-wide user → session mapping.
//!
//! Sessions are created on the first inbound binding for a user and torn
//! down by their own loop; a background reaper (1-second poll) consumes
//! shutdown notifications and drops the dead entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ExchangeError;
use crate::exchange::handle::SessionHandle;
use crate::exchange::session::{self, SessionSettings};

pub struct Registry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    settings: SessionSettings,
    cancel: CancellationToken,
    reaped_tx: mpsc::UnboundedSender<String>,
}

impl Registry {
    /// `cancel` is the process root token: cancelling it closes every
    /// session and stops the reaper.
    pub fn new(settings: SessionSettings, cancel: CancellationToken) -> Arc<Self> {
        let (reaped_tx, reaped_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            settings,
            cancel,
            reaped_tx,
        });
        tokio::spawn(reap(registry.clone(), reaped_rx));
        registry
    }

    pub fn get(&self, user: &str) -> Result<SessionHandle, ExchangeError> {
        self.sessions
            .read()
            .get(user)
            .cloned()
            .ok_or_else(|| ExchangeError::not_found(format!("user {user}")))
    }

    /// At most one live session per user; concurrent callers race on the
    /// write lock and the loser reuses the winner's session.
    pub fn get_or_create(&self, user: &str) -> Result<SessionHandle, ExchangeError> {
        if let Some(handle) = self.sessions.read().get(user) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let mut sessions = self.sessions.write();
        if let Some(handle) = sessions.get(user) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }
        let handle = session::spawn(
            user.to_string(),
            &self.settings,
            self.cancel.child_token(),
            self.reaped_tx.clone(),
        )?;
        info!(user, "new exchange session");
        sessions.insert(user.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

async fn reap(registry: Arc<Registry>, mut reaped_rx: mpsc::UnboundedReceiver<String>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = registry.cancel.cancelled() => break,
            _ = interval.tick() => {
                while let Ok(user) = reaped_rx.try_recv() {
                    let mut sessions = registry.sessions.write();
                    // A fresh session may already have replaced the dead one.
                    if sessions.get(&user).is_some_and(|h| h.is_closed()) {
                        sessions.remove(&user);
                        debug!(user, "session reaped");
                    }
                }
            }
        }
    }
}
