//! Strategy interface and a reference threshold strategy.

use lotbook_core::config::StrategyConfig;
use lotbook_core::{Order, Tick};

use crate::portfolio::Portfolio;

/// Trading decisions, consulted once per tick.
pub trait Strategy {
    /// Optionally open a position on `tick`. Only buy orders are accepted.
    fn evaluate_entry(&mut self, portfolio: &Portfolio, tick: &Tick) -> Option<Order>;

    /// Optionally close `open` on `tick` with a sell order.
    fn evaluate_exit(&mut self, portfolio: &Portfolio, open: &Order, tick: &Tick) -> Option<Order>;
}

/// Enters on a tight, thin book and exits on a fixed percentage move.
///
/// Entry buys `order_volume` at the ask when the symbol is watched, the
/// spread is at most `max_spread_pct` of the ask and the ask size is at most
/// `max_ask_size`. Exit sells the open volume at the bid once the bid has
/// moved `exit_move_pct` from the entry price in either direction.
#[derive(Debug, Clone)]
pub struct ThresholdStrategy {
    config: StrategyConfig,
}

impl ThresholdStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    fn watches(&self, symbol: &str) -> bool {
        self.config.symbols.is_empty() || self.config.symbols.iter().any(|s| s == symbol)
    }
}

impl Strategy for ThresholdStrategy {
    fn evaluate_entry(&mut self, _portfolio: &Portfolio, tick: &Tick) -> Option<Order> {
        if !self.watches(&tick.symbol) || tick.ask <= 0.0 {
            return None;
        }
        let spread_pct = tick.spread() / tick.ask * 100.0;
        if spread_pct > self.config.max_spread_pct || tick.ask_size > self.config.max_ask_size {
            return None;
        }
        Some(Order::buy(
            tick.symbol.clone(),
            tick.ask,
            self.config.order_volume,
            tick.timestamp,
        ))
    }

    fn evaluate_exit(&mut self, _portfolio: &Portfolio, open: &Order, tick: &Tick) -> Option<Order> {
        if open.price <= 0.0 {
            return None;
        }
        let moved_pct = (tick.bid - open.price) / open.price * 100.0;
        if moved_pct.abs() < self.config.exit_move_pct {
            return None;
        }
        Some(Order::sell(
            tick.symbol.clone(),
            tick.bid,
            open.volume,
            tick.timestamp,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use lotbook_core::Side;

    fn make_tick(symbol: &str, bid: f64, ask: f64, ask_size: f64) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            bid,
            ask,
            bid_size: 100.0,
            ask_size,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn make_strategy() -> ThresholdStrategy {
        ThresholdStrategy::new(StrategyConfig::default())
    }

    #[test]
    fn test_entry_conditions() {
        let mut strategy = make_strategy();
        let portfolio = Portfolio::new(100_000.0);

        let order = strategy
            .evaluate_entry(&portfolio, &make_tick("AAPL", 99.0, 100.0, 40.0))
            .unwrap();
        assert_eq!(order.side, Side::Buy);
        assert_relative_eq!(order.price, 100.0);
        assert_relative_eq!(order.volume, 50.0);

        // Unwatched symbol, wide spread, deep ask.
        assert!(strategy.evaluate_entry(&portfolio, &make_tick("MSFT", 99.0, 100.0, 40.0)).is_none());
        assert!(strategy.evaluate_entry(&portfolio, &make_tick("AAPL", 95.0, 100.0, 40.0)).is_none());
        assert!(strategy.evaluate_entry(&portfolio, &make_tick("AAPL", 99.0, 100.0, 60.0)).is_none());
    }

    #[test]
    fn test_exit_on_move_either_way() {
        let mut strategy = make_strategy();
        let portfolio = Portfolio::new(100_000.0);
        let open = Order::buy("AAPL", 100.0, 50.0, Utc.timestamp_opt(1_700_000_000, 0).unwrap());

        assert!(strategy.evaluate_exit(&portfolio, &open, &make_tick("AAPL", 102.0, 102.1, 10.0)).is_none());

        let up = strategy
            .evaluate_exit(&portfolio, &open, &make_tick("AAPL", 103.0, 103.1, 10.0))
            .unwrap();
        assert_eq!(up.side, Side::Sell);
        assert_relative_eq!(up.price, 103.0);
        assert_relative_eq!(up.volume, 50.0);

        assert!(strategy.evaluate_exit(&portfolio, &open, &make_tick("AAPL", 96.5, 96.6, 10.0)).is_some());
    }

    #[test]
    fn test_empty_watch_list_watches_everything() {
        let mut strategy = ThresholdStrategy::new(StrategyConfig {
            symbols: Vec::new(),
            ..StrategyConfig::default()
        });
        let portfolio = Portfolio::new(100_000.0);
        assert!(strategy.evaluate_entry(&portfolio, &make_tick("MSFT", 99.0, 100.0, 40.0)).is_some());
    }
}
