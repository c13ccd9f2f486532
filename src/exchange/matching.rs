//! Order-matching rule against a single OHLCV bar.
//!
//! An order either fills completely inside one candle or not at all; the
//! volume check guards that assumption and is a data-integrity failure,
//! not a matching miss.

use crate::error::ExchangeError;
use crate::models::{CandleTick, Order, OrderSide};

/// A BUY crosses when its limit is at or above the candle low; a SELL when
/// its limit is at or below the candle high.
pub fn crosses(order: &Order, tick: &CandleTick) -> bool {
    match order.side {
        OrderSide::Buy => order.price >= tick.low,
        OrderSide::Sell => order.price <= tick.high,
    }
}

/// The candle must carry enough volume on the paying side to absorb the
/// order in full. Failure terminates the session (partial fills are out of
/// scope).
pub fn check_volume(order: &Order, tick: &CandleTick) -> Result<(), ExchangeError> {
    let available = match order.side {
        OrderSide::Buy => tick.quote_volume,
        OrderSide::Sell => tick.base_volume,
    };
    if order.total > available {
        return Err(ExchangeError::DataIntegrity(format!(
            "order {} ({} total {}) exceeds candle volume {} at ts {}; \
             cannot fill in one kline without partial fills",
            order.id,
            order.side.as_str(),
            order.total,
            available,
            tick.unix,
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn tick(low: Decimal, high: Decimal) -> CandleTick {
        CandleTick {
            open: low,
            high,
            low,
            close: high,
            unix: 1000,
            symbol: "ETHUSDT".into(),
            base_volume: dec!(1000000),
            quote_volume: dec!(1000000),
        }
    }

    fn order(side: OrderSide, price: Decimal) -> Order {
        Order {
            id: "A".into(),
            user_id: "u1".into(),
            symbol: "ETHUSDT".into(),
            order_type: "LIMIT".into(),
            side,
            status: OrderStatus::New,
            price,
            quantity: dec!(1),
            total: price,
            order_id: 1,
            transact_time: 1000,
        }
    }

    #[test]
    fn buy_crosses_at_or_above_low() {
        let t = tick(dec!(9), dec!(11));
        assert!(crosses(&order(OrderSide::Buy, dec!(9)), &t));
        assert!(crosses(&order(OrderSide::Buy, dec!(10)), &t));
        assert!(!crosses(&order(OrderSide::Buy, dec!(8.99)), &t));
    }

    #[test]
    fn sell_crosses_at_or_below_high() {
        let t = tick(dec!(9), dec!(11));
        assert!(crosses(&order(OrderSide::Sell, dec!(11)), &t));
        assert!(crosses(&order(OrderSide::Sell, dec!(10)), &t));
        assert!(!crosses(&order(OrderSide::Sell, dec!(11.01)), &t));
    }

    #[test]
    fn volume_check_uses_the_paying_side() {
        let mut t = tick(dec!(9), dec!(11));
        t.quote_volume = dec!(5);
        t.base_volume = dec!(50);

        let mut buy = order(OrderSide::Buy, dec!(10));
        buy.total = dec!(10);
        assert!(matches!(
            check_volume(&buy, &t),
            Err(ExchangeError::DataIntegrity(_))
        ));

        let mut sell = order(OrderSide::Sell, dec!(10));
        sell.total = dec!(10);
        assert!(check_volume(&sell, &t).is_ok());
    }

    #[test]
    fn exact_volume_is_enough() {
        let mut t = tick(dec!(9), dec!(11));
        t.quote_volume = dec!(10);
        let mut buy = order(OrderSide::Buy, dec!(10));
        buy.total = dec!(10);
        assert!(check_volume(&buy, &t).is_ok());
    }
}
