//! Binary order-update record pushed on the order stream.
//!
//! Layout (big-endian):
//! ```text
//! Offset  Size  Field
//! 0       8     transact_time (u64)
//! 8       1     status (0 NEW, 1 FILLED, 2 CANCELED)
//! 9       N     client order id (UTF-8)
//! ```
//! A 20-character id yields the 29-byte record clients expect.

use crate::error::ExchangeError;
use crate::models::{Order, OrderStatus};

/// Bytes before the variable-length id.
pub const ORDER_UPDATE_HEADER: usize = 9;

pub fn encode_order_update(order: &Order) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ORDER_UPDATE_HEADER + order.id.len());
    buf.extend_from_slice(&(order.transact_time.max(0) as u64).to_be_bytes());
    buf.push(order.status.as_u8());
    buf.extend_from_slice(order.id.as_bytes());
    buf
}

/// Inverse of [`encode_order_update`]; used by tests and client tooling.
pub fn decode_order_update(buf: &[u8]) -> Result<(u64, OrderStatus, String), ExchangeError> {
    if buf.len() < ORDER_UPDATE_HEADER {
        return Err(ExchangeError::Parse(format!(
            "order update record too short: {} bytes",
            buf.len()
        )));
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&buf[..8]);
    let status = OrderStatus::from_u8(buf[8])
        .ok_or_else(|| ExchangeError::Parse(format!("unknown order status byte {}", buf[8])))?;
    let id = std::str::from_utf8(&buf[ORDER_UPDATE_HEADER..])
        .map_err(|e| ExchangeError::Parse(format!("order id is not UTF-8: {e}")))?
        .to_string();
    Ok((u64::from_be_bytes(ts), status, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderSide;
    use rust_decimal_macros::dec;

    fn order(id: &str, ts: i64, status: OrderStatus) -> Order {
        Order {
            id: id.into(),
            user_id: "u1".into(),
            symbol: "ETHUSDT".into(),
            order_type: "LIMIT".into(),
            side: OrderSide::Buy,
            status,
            price: dec!(10),
            quantity: dec!(1),
            total: dec!(10),
            order_id: 1,
            transact_time: ts,
        }
    }

    #[test]
    fn round_trip() {
        let o = order("abc-123", 1640995440000, OrderStatus::Filled);
        let buf = encode_order_update(&o);
        let (ts, status, id) = decode_order_update(&buf).unwrap();
        assert_eq!(ts, 1640995440000);
        assert_eq!(status, OrderStatus::Filled);
        assert_eq!(id, "abc-123");
    }

    #[test]
    fn twenty_char_id_is_29_bytes() {
        let o = order("01234567890123456789", 1000, OrderStatus::Filled);
        assert_eq!(encode_order_update(&o).len(), 29);
    }

    #[test]
    fn rejects_short_or_garbled_records() {
        assert!(decode_order_update(&[0; 5]).is_err());
        let mut buf = encode_order_update(&order("A", 1, OrderStatus::New));
        buf[8] = 77;
        assert!(decode_order_update(&buf).is_err());
    }
}
