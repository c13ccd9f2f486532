//! Core data model: candles, orders, balances.
//!
//! Decimal fields are `rust_decimal::Decimal` and serialize as strings, so
//! values round-trip losslessly over the wire.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ExchangeError;

/// One immutable OHLCV bar of the replayed kline stream.
///
/// The serialized form is exactly the price-stream frame:
/// `{"open":"…","high":"…","low":"…","close":"…","unix":N}` — symbol and
/// volumes stay server-side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleTick {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Milliseconds since epoch.
    pub unix: i64,
    #[serde(skip_serializing)]
    pub symbol: String,
    #[serde(skip_serializing)]
    pub base_volume: Decimal,
    #[serde(skip_serializing)]
    pub quote_volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[default]
    New,
    Filled,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    /// Wire byte used by the binary order-update record.
    pub fn as_u8(&self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Filled => 1,
            OrderStatus::Canceled => 2,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(OrderStatus::New),
            1 => Some(OrderStatus::Filled),
            2 => Some(OrderStatus::Canceled),
            _ => None,
        }
    }
}

/// A limit order. `id` is the client-supplied identifier, unique within a
/// user; `order_id` is the session-internal monotonic sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "clientOrderId")]
    pub id: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    pub symbol: String,
    #[serde(rename = "type", default)]
    pub order_type: String,
    pub side: OrderSide,
    #[serde(default)]
    pub status: OrderStatus,
    pub price: Decimal,
    #[serde(rename = "origQty")]
    pub quantity: Decimal,
    /// `price × quantity`, assigned at creation.
    #[serde(default)]
    pub total: Decimal,
    #[serde(rename = "orderId", default)]
    pub order_id: u64,
    #[serde(rename = "transactTime", default)]
    pub transact_time: i64,
}

impl Order {
    /// Splits the symbol into the pay-from and receive-into assets.
    ///
    /// The first three characters are one asset and the remainder the
    /// other; which side pays from which flips with the order side
    /// (`ETHUSDT` BUY pays from `USDT`, SELL pays from `ETH`).
    pub fn assets(&self) -> Result<(&str, &str), ExchangeError> {
        if !self.symbol.is_ascii() || self.symbol.len() <= 3 {
            return Err(ExchangeError::invalid(format!(
                "symbol {:?} is too short",
                self.symbol
            )));
        }
        let (head, tail) = self.symbol.split_at(3);
        Ok(match self.side {
            OrderSide::Buy => (tail, head),
            OrderSide::Sell => (head, tail),
        })
    }

    /// Amount reserved on the pay-from asset while the order is open.
    pub fn reserved(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => self.total,
            OrderSide::Sell => self.quantity,
        }
    }

    /// Amount credited (pre-commission) to the receive-into asset on fill.
    pub fn received(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => self.quantity,
            OrderSide::Sell => self.total,
        }
    }
}

/// One asset row of a user's balance sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    #[serde(default, deserialize_with = "decimal_or_zero")]
    pub free: Decimal,
    #[serde(default, deserialize_with = "decimal_or_zero")]
    pub locked: Decimal,
}

impl Balance {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            free: Decimal::ZERO,
            locked: Decimal::ZERO,
        }
    }
}

/// Balance amounts arrive as decimal strings; an empty string means zero.
fn decimal_or_zero<'de, D>(de: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(de)?;
    if s.is_empty() {
        return Ok(Decimal::ZERO);
    }
    s.parse::<Decimal>().map_err(serde::de::Error::custom)
}
