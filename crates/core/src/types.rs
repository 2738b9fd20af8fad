//! Core data types for the lotbook system.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Absolute point in time (UTC).
pub type Timestamp = DateTime<Utc>;

/// Price, volume and cash amounts.
pub type Amount = f64;

/// Volumes closer than this are treated as equal.
pub const VOLUME_EPSILON: Amount = 1e-10;

/// Anything carrying a tradeable or quoted quantity.
pub trait HasVolume {
    /// Quantity held, ordered or quoted.
    fn volume(&self) -> Amount;
}

/// A normalized quote update for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument identifier.
    pub symbol: String,
    /// Best bid price.
    pub bid: Amount,
    /// Best ask price.
    pub ask: Amount,
    /// Best bid size.
    pub bid_size: Amount,
    /// Best ask size.
    pub ask_size: Amount,
    /// Absolute timestamp.
    pub timestamp: Timestamp,
}

impl Tick {
    /// Calculate mid price.
    #[inline]
    pub fn mid(&self) -> Amount {
        (self.bid + self.ask) / 2.0
    }

    /// Calculate spread.
    #[inline]
    pub fn spread(&self) -> Amount {
        self.ask - self.bid
    }

    /// Total quoted size on both sides.
    #[inline]
    pub fn depth(&self) -> Amount {
        self.bid_size + self.ask_size
    }
}

impl HasVolume for Tick {
    fn volume(&self) -> Amount {
        self.depth()
    }
}

/// Unit of the per-record timestamp offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ns")]
    Nanos,
    #[serde(rename = "us")]
    Micros,
    #[default]
    #[serde(rename = "ms")]
    Millis,
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl TimeUnit {
    /// Nanoseconds in one unit.
    pub fn nanos(self) -> f64 {
        match self {
            TimeUnit::Nanos => 1.0,
            TimeUnit::Micros => 1e3,
            TimeUnit::Millis => 1e6,
            TimeUnit::Seconds => 1e9,
            TimeUnit::Minutes => 60.0 * 1e9,
            TimeUnit::Hours => 3600.0 * 1e9,
        }
    }

    /// Convert a (possibly fractional) offset to a duration.
    ///
    /// Returns None when the result does not fit in an i64 nanosecond count.
    pub fn to_duration(self, offset: f64) -> Option<Duration> {
        let nanos = (offset * self.nanos()).round();
        if !nanos.is_finite() || nanos.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Duration::nanoseconds(nanos as i64))
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get sign of the cash flow: -1 for buys, +1 for sells.
    pub fn cash_sign(self) -> f64 {
        match self {
            Side::Buy => -1.0,
            Side::Sell => 1.0,
        }
    }
}

/// Which open lot a closing order settles first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostMethod {
    /// Earliest-acquired lot first.
    #[default]
    Fifo,
    /// Most-recently-acquired lot first.
    Lifo,
}

/// Identity of a lot, unique for the lifetime of a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct LotId(pub u64);

/// Identity of an order, assigned by order management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct OrderId(pub u64);

/// A single acquired quantity of an instrument, held until fully closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// Ledger-assigned identity.
    pub id: LotId,
    /// Instrument identifier.
    pub symbol: String,
    /// Held quantity.
    pub volume: Amount,
    /// Acquisition price.
    pub price: Amount,
    /// Acquisition time.
    pub acquired_at: Timestamp,
    /// Ticks observed since acquisition.
    pub ticks: u32,
}

impl Lot {
    /// Create an unassigned lot. The ledger gives it an identity on insert.
    pub fn new(symbol: impl Into<String>, volume: Amount, price: Amount, acquired_at: Timestamp) -> Self {
        Self {
            id: LotId::default(),
            symbol: symbol.into(),
            volume,
            price,
            acquired_at,
            ticks: 0,
        }
    }

    /// Set the identity.
    pub fn with_id(mut self, id: LotId) -> Self {
        self.id = id;
        self
    }

    /// Cost of the lot at its acquisition price.
    pub fn cost(&self) -> Amount {
        self.price * self.volume
    }
}

impl HasVolume for Lot {
    fn volume(&self) -> Amount {
        self.volume
    }
}

/// External handle to a lot held in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LotRef {
    pub symbol: String,
    pub id: LotId,
}

/// An order produced by strategy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Assigned on registration; zero until then.
    pub id: OrderId,
    pub side: Side,
    pub symbol: String,
    pub price: Amount,
    pub volume: Amount,
    pub timestamp: Timestamp,
}

impl Order {
    /// Create a buy order.
    pub fn buy(symbol: impl Into<String>, price: Amount, volume: Amount, timestamp: Timestamp) -> Self {
        Self {
            id: OrderId::default(),
            side: Side::Buy,
            symbol: symbol.into(),
            price,
            volume,
            timestamp,
        }
    }

    /// Create a sell order.
    pub fn sell(symbol: impl Into<String>, price: Amount, volume: Amount, timestamp: Timestamp) -> Self {
        Self {
            side: Side::Sell,
            ..Self::buy(symbol, price, volume, timestamp)
        }
    }

    /// Price times volume.
    pub fn notional(&self) -> Amount {
        self.price * self.volume
    }

    /// Same order with a different volume.
    pub fn with_volume(&self, volume: Amount) -> Self {
        Self {
            volume,
            ..self.clone()
        }
    }

    /// The lot a filled buy order creates.
    pub fn to_lot(&self) -> Lot {
        Lot::new(self.symbol.clone(), self.volume, self.price, self.timestamp)
    }
}

impl HasVolume for Order {
    fn volume(&self) -> Amount {
        self.volume
    }
}

/// Outcome of closing one lot against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedRecord {
    pub lot_id: LotId,
    pub symbol: String,
    /// Volume transacted (always the full lot volume).
    pub volume: Amount,
    pub buy_price: Amount,
    pub sell_price: Amount,
    pub opened_at: Timestamp,
    pub closed_at: Timestamp,
}

impl RealizedRecord {
    /// Realized profit or loss.
    pub fn pnl(&self) -> Amount {
        (self.sell_price - self.buy_price) * self.volume
    }

    /// Return relative to the acquisition price, in percent.
    pub fn return_pct(&self) -> f64 {
        if self.buy_price > 0.0 {
            (self.sell_price - self.buy_price) / self.buy_price * 100.0
        } else {
            0.0
        }
    }

    /// Time between acquisition and close.
    pub fn holding_period(&self) -> Duration {
        self.closed_at - self.opened_at
    }
}

/// An amount observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedMetric {
    pub amount: Amount,
    pub date: Timestamp,
}

impl DatedMetric {
    pub fn new(amount: Amount, date: Timestamp) -> Self {
        Self { amount, date }
    }
}

/// Running statistics over the ticks of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    /// Number of ticks folded in.
    pub n_ticks: u64,
    /// Average mid price.
    pub avg_price: Amount,
    /// Average quoted depth.
    pub avg_volume: Amount,
    pub last_price: DatedMetric,
    pub max_price: DatedMetric,
    pub min_price: DatedMetric,
    pub max_volume: DatedMetric,
    pub min_volume: DatedMetric,
}

impl MarketStats {
    /// Seed statistics from a first tick.
    pub fn new(tick: &Tick) -> Self {
        let price = DatedMetric::new(tick.mid(), tick.timestamp);
        let volume = DatedMetric::new(tick.depth(), tick.timestamp);
        Self {
            n_ticks: 1,
            avg_price: price.amount,
            avg_volume: volume.amount,
            last_price: price,
            max_price: price,
            min_price: price,
            max_volume: volume,
            min_volume: volume,
        }
    }

    /// Fold a new tick into the statistics.
    pub fn update(&mut self, tick: &Tick) {
        let price = tick.mid();
        let volume = tick.depth();
        let n = self.n_ticks as f64;

        self.avg_price = (self.avg_price * n + price) / (n + 1.0);
        self.avg_volume = (self.avg_volume * n + volume) / (n + 1.0);
        self.last_price = DatedMetric::new(price, tick.timestamp);
        self.n_ticks += 1;

        if price >= self.max_price.amount {
            self.max_price = DatedMetric::new(price, tick.timestamp);
        }
        if price <= self.min_price.amount {
            self.min_price = DatedMetric::new(price, tick.timestamp);
        }
        if volume >= self.max_volume.amount {
            self.max_volume = DatedMetric::new(volume, tick.timestamp);
        }
        if volume <= self.min_volume.amount {
            self.min_volume = DatedMetric::new(volume, tick.timestamp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_tick(bid: f64, ask: f64, bid_size: f64, ask_size: f64, secs: i64) -> Tick {
        Tick {
            symbol: "AAPL".to_string(),
            bid,
            ask,
            bid_size,
            ask_size,
            timestamp: ts(secs),
        }
    }

    #[test]
    fn test_tick_mid_spread_depth() {
        let tick = make_tick(99.5, 100.5, 30.0, 20.0, 0);
        assert_relative_eq!(tick.mid(), 100.0);
        assert_relative_eq!(tick.spread(), 1.0);
        assert_relative_eq!(tick.depth(), 50.0);
        assert_relative_eq!(HasVolume::volume(&tick), 50.0);
    }

    #[test]
    fn test_time_unit_to_duration() {
        assert_eq!(TimeUnit::Millis.to_duration(1500.0), Some(Duration::milliseconds(1500)));
        assert_eq!(TimeUnit::Seconds.to_duration(1.5), Some(Duration::milliseconds(1500)));
        assert_eq!(TimeUnit::Hours.to_duration(2.0), Some(Duration::hours(2)));
        assert_eq!(TimeUnit::Nanos.to_duration(f64::NAN), None);
        assert_eq!(TimeUnit::Hours.to_duration(1e12), None);
    }

    #[test]
    fn test_order_to_lot() {
        let order = Order::buy("MSFT", 310.0, 5.0, ts(10));
        let lot = order.to_lot();
        assert_eq!(lot.symbol, "MSFT");
        assert_eq!(lot.id, LotId(0));
        assert_relative_eq!(lot.cost(), 1550.0);
        assert_eq!(lot.acquired_at, ts(10));

        let sell = Order::sell("MSFT", 320.0, 5.0, ts(20));
        assert_eq!(sell.side, Side::Sell);
        assert_relative_eq!(sell.with_volume(2.0).notional(), 640.0);
    }

    #[test]
    fn test_realized_record_pnl() {
        let record = RealizedRecord {
            lot_id: LotId(1),
            symbol: "AAPL".to_string(),
            volume: 10.0,
            buy_price: 100.0,
            sell_price: 110.0,
            opened_at: ts(0),
            closed_at: ts(120),
        };
        assert_relative_eq!(record.pnl(), 100.0);
        assert_relative_eq!(record.return_pct(), 10.0);
        assert_eq!(record.holding_period(), Duration::seconds(120));
    }

    #[test]
    fn test_market_stats_tracks_extremes_independently() {
        let mut stats = MarketStats::new(&make_tick(99.0, 101.0, 10.0, 10.0, 0));

        // New max price and new min volume on the same tick.
        stats.update(&make_tick(104.0, 106.0, 2.0, 3.0, 1));
        assert_relative_eq!(stats.max_price.amount, 105.0);
        assert_eq!(stats.max_price.date, ts(1));
        assert_relative_eq!(stats.min_volume.amount, 5.0);
        assert_eq!(stats.min_volume.date, ts(1));

        stats.update(&make_tick(94.0, 96.0, 50.0, 50.0, 2));
        assert_relative_eq!(stats.min_price.amount, 95.0);
        assert_relative_eq!(stats.max_volume.amount, 100.0);
        assert_relative_eq!(stats.last_price.amount, 95.0);

        assert_eq!(stats.n_ticks, 3);
        assert_relative_eq!(stats.avg_price, (100.0 + 105.0 + 95.0) / 3.0);
        assert_relative_eq!(stats.avg_volume, (20.0 + 5.0 + 100.0) / 3.0);
    }
}
