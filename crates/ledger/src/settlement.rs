//! Cost-basis settlement of a selected lot against a closing order.
//!
//! Which lot is closed is decided by the position queue (FIFO or LIFO);
//! the arithmetic here is the same for both.

use lotbook_core::{Error, Lot, Order, RealizedRecord, Result, Side, VOLUME_EPSILON};
use tracing::debug;

use crate::summary::AggregateSummary;

/// Close `lot` in full against `order`.
///
/// Lots are never split: an order smaller than the lot is rejected with
/// `PartialFill` instead of being rounded.
pub fn settle(lot: &Lot, order: &Order, summary: &AggregateSummary) -> Result<RealizedRecord> {
    if order.side != Side::Sell {
        return Err(Error::mismatch(format!(
            "closing order for {} must be a sell",
            lot.symbol
        )));
    }
    if order.symbol != lot.symbol || summary.symbol() != lot.symbol {
        return Err(Error::mismatch(format!(
            "order for {} cannot close a {} lot",
            order.symbol, lot.symbol
        )));
    }
    if order.volume + VOLUME_EPSILON < lot.volume {
        return Err(Error::PartialFill {
            lot_volume: lot.volume,
            order_volume: order.volume,
        });
    }

    debug!(
        symbol = %lot.symbol,
        lot = lot.id.0,
        volume = lot.volume,
        buy = lot.price,
        sell = order.price,
        held = summary.total_volume(),
        "lot settled"
    );

    Ok(RealizedRecord {
        lot_id: lot.id,
        symbol: lot.symbol.clone(),
        volume: lot.volume,
        buy_price: lot.price,
        sell_price: order.price,
        opened_at: lot.acquired_at,
        closed_at: order.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};
    use lotbook_core::{LotId, Timestamp};

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn make_lot(volume: f64, price: f64) -> Lot {
        Lot::new("AAPL", volume, price, ts(0)).with_id(LotId(7))
    }

    #[test]
    fn test_full_lot_settlement() {
        let lot = make_lot(10.0, 100.0);
        let order = Order::sell("AAPL", 110.0, 10.0, ts(60));

        let record = settle(&lot, &order, &AggregateSummary::new("AAPL")).unwrap();

        assert_eq!(record.lot_id, LotId(7));
        assert_eq!(record.symbol, "AAPL");
        assert_relative_eq!(record.volume, 10.0);
        assert_relative_eq!(record.buy_price, 100.0);
        assert_relative_eq!(record.sell_price, 110.0);
        assert_eq!(record.opened_at, ts(0));
        assert_eq!(record.closed_at, ts(60));
        assert_relative_eq!(record.pnl(), 100.0);
    }

    #[test]
    fn test_larger_order_transacts_lot_volume_only() {
        let lot = make_lot(4.0, 50.0);
        let order = Order::sell("AAPL", 55.0, 10.0, ts(5));

        let record = settle(&lot, &order, &AggregateSummary::new("AAPL")).unwrap();
        assert_relative_eq!(record.volume, 4.0);
    }

    #[test]
    fn test_partial_fill_is_unsupported() {
        let lot = make_lot(10.0, 100.0);
        let order = Order::sell("AAPL", 110.0, 4.0, ts(60));

        match settle(&lot, &order, &AggregateSummary::new("AAPL")) {
            Err(Error::PartialFill {
                lot_volume,
                order_volume,
            }) => {
                assert_relative_eq!(lot_volume, 10.0);
                assert_relative_eq!(order_volume, 4.0);
            }
            other => panic!("expected PartialFill, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_buy_and_foreign_symbol() {
        let lot = make_lot(1.0, 100.0);
        let summary = AggregateSummary::new("AAPL");

        let buy = Order::buy("AAPL", 100.0, 1.0, ts(1));
        assert!(matches!(settle(&lot, &buy, &summary), Err(Error::Mismatch(_))));

        let other = Order::sell("MSFT", 100.0, 1.0, ts(1));
        assert!(matches!(settle(&lot, &other, &summary), Err(Error::Mismatch(_))));
    }
}
