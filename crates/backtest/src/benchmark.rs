//! Buy-and-watch benchmark over every observed symbol.

use std::collections::BTreeMap;

use lotbook_core::{DatedMetric, Error, MarketStats, Result, Tick};
use serde::Serialize;

/// One benchmark security.
#[derive(Debug, Clone, Serialize)]
pub struct Security {
    /// Mid price of the first tick seen.
    pub first_price: DatedMetric,
    pub stats: MarketStats,
}

impl Security {
    fn new(tick: &Tick) -> Self {
        Self {
            first_price: DatedMetric::new(tick.mid(), tick.timestamp),
            stats: MarketStats::new(tick),
        }
    }

    /// Percent change from the first to the last mid price.
    pub fn return_pct(&self) -> f64 {
        let first = self.first_price.amount;
        if first > 0.0 {
            (self.stats.last_price.amount - first) / first * 100.0
        } else {
            0.0
        }
    }
}

/// Market statistics per symbol, independent of any position.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Benchmark {
    securities: BTreeMap<String, Security>,
}

impl Benchmark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `tick` into a known symbol.
    pub fn update(&mut self, tick: &Tick) -> Result<()> {
        let security = self
            .securities
            .get_mut(&tick.symbol)
            .ok_or_else(|| Error::not_found(format!("no benchmark security {}", tick.symbol)))?;
        security.stats.update(tick);
        Ok(())
    }

    /// Start tracking the symbol of `tick`, seeded from it.
    pub fn add_new(&mut self, tick: &Tick) {
        self.securities
            .insert(tick.symbol.clone(), Security::new(tick));
    }

    /// Update the symbol, adding it first if unseen.
    pub fn observe(&mut self, tick: &Tick) {
        match self.securities.get_mut(&tick.symbol) {
            Some(security) => security.stats.update(tick),
            None => self.add_new(tick),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&Security> {
        self.securities.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.securities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Security)> {
        self.securities.iter()
    }
}
