//! Process configuration, loaded once at startup from a TOML file.
//!
//! Every section has working defaults so a minimal file (or an empty one)
//! still yields a runnable config. Durations are integer milliseconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ExchangeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long shutdown may take before the process exits non-zero.
    pub graceful_shutdown_delay_ms: u64,
    pub exchange: ExchangeConfig,
    pub parser: ParserConfig,
    pub api: ApiConfig,
    pub ws: WsConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graceful_shutdown_delay_ms: 30_000,
            exchange: ExchangeConfig::default(),
            parser: ParserConfig::default(),
            api: ApiConfig::default(),
            ws: WsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// JSON blob served verbatim by the `exchange_info` command.
    pub info_file: PathBuf,
    /// Commission in percent: `0.1` means 0.1%.
    pub commission: f64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            info_file: PathBuf::from("./data/exchange.json"),
            commission: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Historical kline CSV replayed to every session.
    pub file: PathBuf,
    /// Pacing between candle emissions (wall clock, not candle time).
    pub listener_delay_ms: u64,
    /// Candles with `unix` below this are dropped at the source.
    pub offset: i64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("./data/klines.csv"),
            listener_delay_ms: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Command WebSocket + health listener.
    pub addr: String,
    /// Final-snapshot subscription listener.
    pub notifications_addr: String,
    /// Admit command connections without user metadata (the commands that
    /// need a session still fail `Unauthenticated`).
    pub disable_auth: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".into(),
            notifications_addr: "0.0.0.0:8081".into(),
            disable_auth: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    pub orders_addr: String,
    pub prices_addr: String,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            orders_addr: "0.0.0.0:8082".into(),
            prices_addr: "0.0.0.0:8083".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub with_caller: bool,
    pub disable_console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "debug".into(),
            with_caller: true,
            disable_console: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ExchangeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ExchangeError::Config(format!("read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| ExchangeError::Config(e.to_string()))
    }

    /// Commission as the fraction the ledger multiplies with (percent / 100).
    pub fn commission_rate(&self) -> Result<Decimal, ExchangeError> {
        let pct = Decimal::from_f64(self.exchange.commission).ok_or_else(|| {
            ExchangeError::Config(format!(
                "commission {} is not a valid decimal",
                self.exchange.commission
            ))
        })?;
        let rate = pct / Decimal::ONE_HUNDRED;
        if rate.is_sign_negative() || rate >= Decimal::ONE {
            return Err(ExchangeError::Config(format!(
                "commission {}% is outside [0, 100)",
                self.exchange.commission
            )));
        }
        Ok(rate)
    }

    pub fn graceful_shutdown_delay(&self) -> Duration {
        Duration::from_millis(self.graceful_shutdown_delay_ms)
    }

    pub fn listener_delay(&self) -> Duration {
        Duration::from_millis(self.parser.listener_delay_ms)
    }
}
