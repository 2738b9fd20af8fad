//! Per-instrument aggregate of open lots.

use lotbook_core::{Amount, HasVolume, MarketStats, Tick, VOLUME_EPSILON};
use serde::Serialize;

/// Running totals for one position queue.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSummary {
    symbol: String,
    total_volume: Amount,
    stats: Option<MarketStats>,
}

impl AggregateSummary {
    /// Create an empty summary.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            total_volume: 0.0,
            stats: None,
        }
    }

    /// Instrument identifier.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Sum of the volumes of every lot held.
    pub fn total_volume(&self) -> Amount {
        self.total_volume
    }

    /// Market statistics since the queue was created, if any tick was applied.
    pub fn stats(&self) -> Option<&MarketStats> {
        self.stats.as_ref()
    }

    /// Last observed mid price.
    pub fn last_price(&self) -> Option<Amount> {
        self.stats.as_ref().map(|s| s.last_price.amount)
    }

    pub(crate) fn add(&mut self, item: &impl HasVolume) {
        self.total_volume += item.volume();
    }

    pub(crate) fn remove(&mut self, item: &impl HasVolume) {
        self.total_volume -= item.volume();
        // Absorb float residue so an empty queue reports exactly zero.
        if self.total_volume.abs() < VOLUME_EPSILON {
            self.total_volume = 0.0;
        }
    }

    /// Refresh average, last and extreme metrics from a tick.
    pub fn update(&mut self, tick: &Tick) {
        match &mut self.stats {
            Some(stats) => stats.update(tick),
            None => self.stats = Some(MarketStats::new(tick)),
        }
    }
}
