//! Spot exchange emulator over historical OHLCV data.
//!
//! Serves many simulated users at once. Each user gets an independent
//! replay of the kline CSV, an independent balance sheet and order set,
//! and a pair of push streams (prices, order updates) next to the command
//! WebSocket. Every observable outcome is a pure function of the candle
//! sequence and the interleaving of that user's commands: a single task
//! owns all of a user's state and serializes everything that touches it.

pub mod config;
pub mod error;
pub mod exchange;
pub mod feed;
pub mod logging;
pub mod models;
pub mod server;

pub use config::Config;
pub use error::ExchangeError;
