//! Per-user balance sheet: asset rows with free/locked accounting.
//!
//! Every order transition maps to one mutation here. A mutation that would
//! leave `free` or `locked` negative is rejected as a whole; the sheet is
//! never left half-applied.
//!
//! Pair ETHUSDT, commission aside:
//!   NEW    BUY:  USDT free−total,    USDT locked+total
//!   NEW    SELL: ETH  free−quantity, ETH  locked+quantity
//!   CANCEL BUY:  USDT locked−total,  USDT free+total
//!   CANCEL SELL: ETH  locked−quantity, ETH free+quantity
//!   FILL   BUY:  USDT locked−total,  ETH  free+quantity·(1−c)
//!   FILL   SELL: ETH  locked−quantity, USDT free+total·(1−c)

use rust_decimal::Decimal;
use tracing::trace;

use crate::error::ExchangeError;
use crate::models::{Balance, Order, OrderStatus};

/// Ordered collection of asset rows, unique by upper-cased asset name.
/// Rows are created lazily on first reference and kept for the session
/// lifetime.
#[derive(Debug, Default)]
pub struct BalanceSheet {
    rows: Vec<Balance>,
}

impl BalanceSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole sheet. Assets are upper-cased; a repeated asset
    /// keeps the last row given for it.
    pub fn set(&mut self, balances: Vec<Balance>) {
        self.rows.clear();
        for mut b in balances {
            b.asset = b.asset.to_uppercase();
            match self.rows.iter_mut().find(|r| r.asset == b.asset) {
                Some(row) => *row = b,
                None => self.rows.push(b),
            }
        }
    }

    pub fn list(&self) -> Vec<Balance> {
        self.rows.clone()
    }

    pub fn get(&self, asset: &str) -> Option<&Balance> {
        self.rows.iter().find(|r| r.asset == asset)
    }

    fn row_index(&mut self, asset: &str) -> usize {
        match self.rows.iter().position(|r| r.asset == asset) {
            Some(i) => i,
            None => {
                self.rows.push(Balance::new(asset));
                self.rows.len() - 1
            }
        }
    }

    /// Applies the mutation for `order`'s current status. `commission` is a
    /// fraction in `[0, 1)` and only touches the credited side of a fill.
    pub fn apply(&mut self, order: &Order, commission: Decimal) -> Result<(), ExchangeError> {
        let (base, quote) = order.assets()?;
        let (base, quote) = (base.to_string(), quote.to_string());
        let reserve = order.reserved();

        match order.status {
            OrderStatus::New => {
                let i = self.row_index(&base);
                let row = &mut self.rows[i];
                let free = row.free - reserve;
                if free.is_sign_negative() {
                    return Err(ExchangeError::NegativeBalance);
                }
                row.free = free;
                row.locked += reserve;
            }
            OrderStatus::Canceled => {
                let i = self.row_index(&base);
                let row = &mut self.rows[i];
                let locked = row.locked - reserve;
                if locked.is_sign_negative() {
                    return Err(ExchangeError::NegativeBalance);
                }
                row.locked = locked;
                row.free += reserve;
            }
            OrderStatus::Filled => {
                let i = self.row_index(&base);
                let row = &mut self.rows[i];
                let locked = row.locked - reserve;
                if locked.is_sign_negative() {
                    return Err(ExchangeError::NegativeBalance);
                }
                row.locked = locked;

                let credit = order.received();
                let credit = credit - credit * commission;
                let i = self.row_index(&quote);
                self.rows[i].free += credit;
            }
        }

        trace!(
            user = %order.user_id,
            order = %order.id,
            status = order.status.as_str(),
            base = %base,
            quote = %quote,
            "balance updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderSide;
    use rust_decimal_macros::dec;

    fn sheet(rows: &[(&str, Decimal, Decimal)]) -> BalanceSheet {
        let mut s = BalanceSheet::new();
        s.set(
            rows.iter()
                .map(|(asset, free, locked)| Balance {
                    asset: (*asset).into(),
                    free: *free,
                    locked: *locked,
                })
                .collect(),
        );
        s
    }

    fn order(side: OrderSide, status: OrderStatus, price: Decimal, qty: Decimal) -> Order {
        Order {
            id: "A".into(),
            user_id: "u1".into(),
            symbol: "ETHUSDT".into(),
            order_type: "LIMIT".into(),
            side,
            status,
            price,
            quantity: qty,
            total: price * qty,
            order_id: 1,
            transact_time: 1000,
        }
    }

    #[test]
    fn buy_reservation_moves_free_to_locked() {
        let mut s = sheet(&[("USDT", dec!(100), dec!(0))]);
        s.apply(
            &order(OrderSide::Buy, OrderStatus::New, dec!(10), dec!(5)),
            Decimal::ZERO,
        )
        .unwrap();
        let usdt = s.get("USDT").unwrap();
        assert_eq!(usdt.free, dec!(50));
        assert_eq!(usdt.locked, dec!(50));
    }

    #[test]
    fn sell_reservation_locks_quantity() {
        let mut s = sheet(&[("ETH", dec!(2), dec!(0))]);
        s.apply(
            &order(OrderSide::Sell, OrderStatus::New, dec!(10), dec!(1)),
            Decimal::ZERO,
        )
        .unwrap();
        let eth = s.get("ETH").unwrap();
        assert_eq!(eth.free, dec!(1));
        assert_eq!(eth.locked, dec!(1));
    }

    #[test]
    fn insufficient_free_rejects_and_preserves_state() {
        let mut s = sheet(&[("USDT", dec!(40), dec!(7))]);
        let err = s
            .apply(
                &order(OrderSide::Buy, OrderStatus::New, dec!(10), dec!(5)),
                Decimal::ZERO,
            )
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NegativeBalance));
        let usdt = s.get("USDT").unwrap();
        assert_eq!(usdt.free, dec!(40));
        assert_eq!(usdt.locked, dec!(7));
    }

    #[test]
    fn new_then_cancel_restores_exactly() {
        let mut s = sheet(&[("USDT", dec!(100), dec!(0))]);
        let o = order(OrderSide::Buy, OrderStatus::New, dec!(10), dec!(3));
        s.apply(&o, dec!(0.001)).unwrap();
        let mut canceled = o.clone();
        canceled.status = OrderStatus::Canceled;
        // no commission on cancel
        s.apply(&canceled, dec!(0.001)).unwrap();
        let usdt = s.get("USDT").unwrap();
        assert_eq!(usdt.free, dec!(100));
        assert_eq!(usdt.locked, dec!(0));
    }

    #[test]
    fn buy_fill_credits_quantity_minus_commission() {
        let mut s = sheet(&[("USDT", dec!(100), dec!(0))]);
        let mut o = order(OrderSide::Buy, OrderStatus::New, dec!(10), dec!(5));
        s.apply(&o, Decimal::ZERO).unwrap();
        o.status = OrderStatus::Filled;
        s.apply(&o, Decimal::ZERO).unwrap();

        let usdt = s.get("USDT").unwrap();
        assert_eq!(usdt.free, dec!(50));
        assert_eq!(usdt.locked, dec!(0));
        let eth = s.get("ETH").unwrap();
        assert_eq!(eth.free, dec!(5));
        assert_eq!(eth.locked, dec!(0));
    }

    #[test]
    fn sell_fill_credits_total_minus_commission() {
        let mut s = sheet(&[("ETH", dec!(2), dec!(0))]);
        let mut o = order(OrderSide::Sell, OrderStatus::New, dec!(10), dec!(1));
        s.apply(&o, dec!(0.001)).unwrap();
        o.status = OrderStatus::Filled;
        s.apply(&o, dec!(0.001)).unwrap();

        let eth = s.get("ETH").unwrap();
        assert_eq!(eth.free, dec!(1));
        assert_eq!(eth.locked, dec!(0));
        let usdt = s.get("USDT").unwrap();
        assert_eq!(usdt.free, dec!(9.99));
    }

    #[test]
    fn assets_are_created_lazily_at_zero() {
        let mut s = sheet(&[("ETH", dec!(5), dec!(0))]);
        let mut o = order(OrderSide::Sell, OrderStatus::New, dec!(2), dec!(1));
        s.apply(&o, Decimal::ZERO).unwrap();
        assert!(s.get("USDT").is_none());
        o.status = OrderStatus::Filled;
        s.apply(&o, Decimal::ZERO).unwrap();
        assert_eq!(s.get("USDT").unwrap().free, dec!(2));
    }

    #[test]
    fn set_normalizes_assets() {
        let mut s = BalanceSheet::new();
        s.set(vec![
            Balance {
                asset: "usdt".into(),
                free: dec!(1),
                locked: dec!(0),
            },
            Balance {
                asset: "USDT".into(),
                free: dec!(2),
                locked: dec!(0),
            },
        ]);
        let rows = s.list();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asset, "USDT");
        assert_eq!(rows[0].free, dec!(2));
    }
}
