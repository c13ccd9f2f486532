//! Error kinds shared across the emulator.
//!
//! Command-level failures are returned to the caller on its reply channel;
//! session-level failures close the session that produced them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The `user` metadata entry is missing or empty.
    #[error("unauthenticated: user id is required")]
    Unauthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A balance mutation would make `free` or `locked` negative. The
    /// mutation is rolled back and the triggering command fails.
    #[error("balance is negative")]
    NegativeBalance,

    /// The session has not observed a candle yet (or its source was empty).
    #[error("no data")]
    NoData,

    /// A candle was too small to absorb an order in full; partial fills are
    /// unsupported, so the session terminates.
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// An outbound push or action submission hit a closed transport.
    #[error("transport closed")]
    TransportClosed,

    #[error("config: {0}")]
    Config(String),

    #[error("malformed candle row: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ExchangeError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidInput(what.into())
    }

    /// Stable machine-readable tag, used as the prefix of wire error frames.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::NegativeBalance => "negative_balance",
            Self::NoData => "no_data",
            Self::DataIntegrity(_) => "data_integrity",
            Self::TransportClosed => "transport_closed",
            Self::Config(_) => "config",
            Self::Parse(_) => "parse",
            Self::Io(_) => "io",
            Self::Csv(_) => "csv",
            Self::Json(_) => "json",
        }
    }

    /// Session-fatal errors tear the owning session down instead of being
    /// reported to a single caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DataIntegrity(_) | Self::TransportClosed)
    }
}
