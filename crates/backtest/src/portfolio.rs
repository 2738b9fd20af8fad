//! Cash plus open holdings.

use lotbook_core::{Amount, CostMethod, Error, Lot, LotRef, Order, RealizedRecord, Result, Tick, VOLUME_EPSILON};
use lotbook_ledger::HoldingLedger;
use tracing::debug;

/// Lots closed by one exit order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Closing {
    pub records: Vec<RealizedRecord>,
    /// Exit volume left over because the next lot was larger than the rest.
    pub unfilled: Amount,
}

impl Closing {
    /// Volume actually transacted.
    pub fn settled_volume(&self) -> Amount {
        self.records.iter().map(|r| r.volume).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Simulated trading account.
#[derive(Debug)]
pub struct Portfolio {
    cash: Amount,
    holdings: HoldingLedger,
}

impl Portfolio {
    /// Create a portfolio holding only cash.
    pub fn new(cash: Amount) -> Self {
        Self {
            cash,
            holdings: HoldingLedger::new(),
        }
    }

    pub fn cash(&self) -> Amount {
        self.cash
    }

    pub fn holdings(&self) -> &HoldingLedger {
        &self.holdings
    }

    /// Add a signed cash amount.
    pub fn apply_delta(&mut self, delta: Amount) {
        self.cash += delta;
    }

    /// Whether `cost` can be paid from cash.
    pub fn can_afford(&self, cost: Amount) -> bool {
        cost.is_finite() && cost <= self.cash
    }

    /// Whether any lot of `symbol` is held.
    pub fn holds(&self, symbol: &str) -> bool {
        self.holdings.contains(symbol)
    }

    /// Hold a newly bought lot and apply the tick it was bought on.
    pub fn add_holding(&mut self, lot: Lot, tick: &Tick) -> Result<LotRef> {
        self.holdings.insert_and_update(lot, tick)
    }

    /// Refresh the holding of `tick.symbol`.
    pub fn update(&mut self, tick: &Tick) -> Result<()> {
        self.holdings.update(tick)
    }

    /// Settle lots against `exit` until its volume is consumed.
    ///
    /// A lot larger than the remaining volume stops the loop: the lots closed
    /// so far are returned with the remainder as `unfilled`. If not even the
    /// first lot fits, the `PartialFill` error is returned and nothing changes.
    /// Cash is left to the caller.
    pub fn close(&mut self, exit: &Order, method: CostMethod) -> Result<Closing> {
        let mut closing = Closing {
            records: Vec::new(),
            unfilled: exit.volume,
        };

        while closing.unfilled > VOLUME_EPSILON {
            let order = exit.with_volume(closing.unfilled);
            match self.holdings.settle(&exit.symbol, method, &order) {
                Ok(Some(record)) => {
                    closing.unfilled -= record.volume;
                    closing.records.push(record);
                }
                Ok(None) => break,
                Err(Error::PartialFill { .. }) if !closing.records.is_empty() => break,
                Err(e) => return Err(e),
            }
        }

        closing.unfilled = closing.unfilled.max(0.0);
        debug!(
            symbol = %exit.symbol,
            lots = closing.records.len(),
            unfilled = closing.unfilled,
            "exit settled"
        );
        Ok(closing)
    }

    /// Held volume valued at each symbol's last mid price.
    pub fn market_value(&self) -> Amount {
        self.holdings
            .iter()
            .map(|queue| {
                let summary = queue.summary();
                summary.total_volume() * summary.last_price().unwrap_or(0.0)
            })
            .sum()
    }

    /// Cash plus market value.
    pub fn equity(&self) -> Amount {
        self.cash + self.market_value()
    }
}
