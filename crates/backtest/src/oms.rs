//! Order management.
//!
//! Assigns order identities, tracks buy orders that are still open and
//! prices every transaction as a signed cash amount.

use lotbook_core::{Amount, Error, Order, OrderId, Result, Side};
use tracing::debug;

/// Open and closed orders of one simulation.
#[derive(Debug, Clone)]
pub struct OrderManager {
    /// Flat commission charged per order.
    commission: Amount,
    next_id: u64,
    open: Vec<Order>,
    closed: Vec<Order>,
}

impl OrderManager {
    /// Create an order manager charging `commission` per order.
    pub fn new(commission: Amount) -> Self {
        Self {
            commission,
            next_id: 1,
            open: Vec::new(),
            closed: Vec::new(),
        }
    }

    pub fn commission(&self) -> Amount {
        self.commission
    }

    /// Accept an order, assign its identity and return it with its cash delta.
    ///
    /// Buys become open and cost `-notional - commission`. A sell is only
    /// accepted while a buy for the same symbol is open; it is recorded as
    /// closed and yields `notional - commission`.
    pub fn register(&mut self, order: Order) -> Result<(Order, Amount)> {
        validate(&order)?;

        if order.side == Side::Sell && !self.open.iter().any(|o| o.symbol == order.symbol) {
            return Err(Error::rejected(format!(
                "sell for {} without an open order",
                order.symbol
            )));
        }

        let order = self.assign_id(order);
        let delta = self.cash_delta(&order);
        match order.side {
            Side::Buy => self.open.push(order.clone()),
            Side::Sell => self.closed.push(order.clone()),
        }
        debug!(id = order.id.0, symbol = %order.symbol, side = ?order.side, delta, "order registered");
        Ok((order, delta))
    }

    /// Open orders for `symbol`, oldest first.
    pub fn find_open(&self, symbol: &str) -> Vec<Order> {
        self.open
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect()
    }

    /// Close the open order `open_id` with a sell.
    ///
    /// Both orders move to the closed list. Returns the registered closing
    /// order and `notional - commission`.
    pub fn close(&mut self, open_id: OrderId, closing: Order) -> Result<(Order, Amount)> {
        let pos = self.check_close(open_id, &closing)?;

        let opened = self.open.remove(pos);
        let closing = self.assign_id(closing);
        let delta = self.cash_delta(&closing);
        debug!(open = opened.id.0, close = closing.id.0, symbol = %closing.symbol, delta, "order closed");

        self.closed.push(opened);
        self.closed.push(closing.clone());
        Ok((closing, delta))
    }

    /// Check that `closing` would be accepted by [`close`](Self::close)
    /// without changing anything. Returns the open order's position.
    pub fn check_close(&self, open_id: OrderId, closing: &Order) -> Result<usize> {
        validate(closing)?;

        let pos = self
            .open
            .iter()
            .position(|o| o.id == open_id)
            .ok_or_else(|| Error::not_found(format!("open order {}", open_id.0)))?;
        if closing.side != Side::Sell || closing.symbol != self.open[pos].symbol {
            return Err(Error::mismatch(format!(
                "order {} cannot be closed by a {:?} for {}",
                open_id.0, closing.side, closing.symbol
            )));
        }
        Ok(pos)
    }

    /// Number of open orders.
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    pub fn open(&self) -> &[Order] {
        &self.open
    }

    /// Every closed order, in closing order.
    pub fn closed(&self) -> &[Order] {
        &self.closed
    }

    fn assign_id(&mut self, mut order: Order) -> Order {
        order.id = OrderId(self.next_id);
        self.next_id += 1;
        order
    }

    fn cash_delta(&self, order: &Order) -> Amount {
        order.side.cash_sign() * order.notional() - self.commission
    }
}

fn validate(order: &Order) -> Result<()> {
    if !order.price.is_finite() || order.price <= 0.0 {
        return Err(Error::rejected(format!("invalid price {}", order.price)));
    }
    if !order.volume.is_finite() || order.volume <= 0.0 {
        return Err(Error::rejected(format!("invalid volume {}", order.volume)));
    }
    Ok(())
}
