//! Record of everything the simulation closed.

use lotbook_core::{Amount, Order, RealizedRecord};
use serde::Serialize;

/// Closed lots and closed orders, in closing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceLog {
    closed_lots: Vec<RealizedRecord>,
    closed_orders: Vec<Order>,
}

impl PerformanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_closed_lot(&mut self, record: RealizedRecord) {
        self.closed_lots.push(record);
    }

    pub fn record_closed_order(&mut self, order: Order) {
        self.closed_orders.push(order);
    }

    pub fn closed_lots(&self) -> &[RealizedRecord] {
        &self.closed_lots
    }

    pub fn closed_orders(&self) -> &[Order] {
        &self.closed_orders
    }

    /// Sum of realized P&L over every closed lot, before commission.
    pub fn realized_pnl(&self) -> Amount {
        self.closed_lots.iter().map(RealizedRecord::pnl).sum()
    }
}
