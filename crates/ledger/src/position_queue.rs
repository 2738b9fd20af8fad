//! Ordered open lots of one instrument.
//!
//! Lots live in an index arena linked front to back, so a lot can be
//! unlinked from the middle without shifting its neighbours. Vacated arena
//! cells are reused by later pushes.

use lotbook_core::{CostMethod, Error, Lot, LotId, Order, RealizedRecord, Result, Tick};

use crate::settlement;
use crate::summary::AggregateSummary;

/// Result of removing a specific lot.
#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    /// Lots remain in the queue.
    Remaining(Lot),
    /// The removed lot was the last one; the owning slot can be reclaimed.
    BecameEmpty(Lot),
}

impl Removal {
    /// The removed lot.
    pub fn into_lot(self) -> Lot {
        match self {
            Removal::Remaining(lot) | Removal::BecameEmpty(lot) => lot,
        }
    }

    pub fn became_empty(&self) -> bool {
        matches!(self, Removal::BecameEmpty(_))
    }
}

#[derive(Debug, Clone)]
struct Node {
    lot: Lot,
    prev: Option<usize>,
    next: Option<usize>,
}

/// FIFO/LIFO queue of open lots plus their aggregate summary.
#[derive(Debug, Clone)]
pub struct PositionQueue {
    nodes: Vec<Option<Node>>,
    vacant: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    summary: AggregateSummary,
}

impl PositionQueue {
    /// Create an empty queue.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            vacant: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            summary: AggregateSummary::new(symbol),
        }
    }

    /// Create a queue holding `lot`.
    pub fn seeded(lot: Lot) -> Self {
        let mut queue = Self::new(lot.symbol.clone());
        queue.push(lot);
        queue
    }

    /// Instrument identifier.
    pub fn symbol(&self) -> &str {
        self.summary.symbol()
    }

    pub fn summary(&self) -> &AggregateSummary {
        &self.summary
    }

    /// Number of lots held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lots from earliest to most recent.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            queue: self,
            cursor: self.head,
        }
    }

    /// Append a lot at the tail.
    pub fn push(&mut self, lot: Lot) {
        self.summary.add(&lot);

        let node = Node {
            lot,
            prev: self.tail,
            next: None,
        };
        let idx = match self.vacant.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };

        self.link(self.tail, Some(idx));
        self.tail = Some(idx);
        self.len += 1;
    }

    /// Remove the earliest (FIFO) or most recent (LIFO) lot.
    pub fn pop(&mut self, method: CostMethod) -> Option<Lot> {
        let idx = self.end(method)?;
        self.unlink(idx)
    }

    /// The lot `pop` would remove.
    pub fn peek(&self, method: CostMethod) -> Option<&Lot> {
        self.end(method)
            .and_then(|idx| self.node(idx))
            .map(|node| &node.lot)
    }

    /// Remove a specific lot by identity.
    pub fn remove_by_identity(&mut self, id: LotId) -> Result<Removal> {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let Some(node) = self.node(idx) else { break };
            if node.lot.id == id {
                break;
            }
            cursor = node.next;
        }

        if let Some(lot) = cursor.and_then(|idx| self.unlink(idx)) {
            return Ok(if self.is_empty() {
                Removal::BecameEmpty(lot)
            } else {
                Removal::Remaining(lot)
            });
        }
        Err(Error::not_found(format!(
            "lot {} not held for {}",
            id.0,
            self.symbol()
        )))
    }

    /// Settle the lot selected by `method` against `order` and remove it.
    ///
    /// Returns `Ok(None)` when there is nothing to settle. The lot stays in
    /// the queue if settlement fails.
    pub fn pop_to_settlement(
        &mut self,
        method: CostMethod,
        order: &Order,
    ) -> Result<Option<RealizedRecord>> {
        let Some(record) = self.peek_to_settlement(method, order)? else {
            return Ok(None);
        };
        self.pop(method);
        Ok(Some(record))
    }

    /// Settle the lot selected by `method` against `order` without removing it.
    pub fn peek_to_settlement(
        &self,
        method: CostMethod,
        order: &Order,
    ) -> Result<Option<RealizedRecord>> {
        match self.peek(method) {
            Some(lot) => settlement::settle(lot, order, &self.summary).map(Some),
            None => Ok(None),
        }
    }

    /// Apply a tick to the summary and count it against every held lot.
    pub fn update(&mut self, tick: &Tick) {
        self.summary.update(tick);
        for node in self.nodes.iter_mut().flatten() {
            node.lot.ticks = node.lot.ticks.saturating_add(1);
        }
    }

    fn end(&self, method: CostMethod) -> Option<usize> {
        match method {
            CostMethod::Fifo => self.head,
            CostMethod::Lifo => self.tail,
        }
    }

    fn unlink(&mut self, idx: usize) -> Option<Lot> {
        let node = self.nodes.get_mut(idx)?.take()?;
        self.link(node.prev, node.next);

        self.len -= 1;
        self.summary.remove(&node.lot);

        if self.len == 0 {
            self.nodes.clear();
            self.vacant.clear();
        } else {
            self.vacant.push(idx);
        }
        Some(node.lot)
    }

    /// Join `from -> to`, moving head or tail when either side is absent.
    fn link(&mut self, from: Option<usize>, to: Option<usize>) {
        match from.and_then(|idx| self.node_mut(idx)) {
            Some(node) => node.next = to,
            None => self.head = to,
        }
        match to.and_then(|idx| self.node_mut(idx)) {
            Some(node) => node.prev = from,
            None => self.tail = from,
        }
    }

    fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)?.as_ref()
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node> {
        self.nodes.get_mut(idx)?.as_mut()
    }
}

/// Front-to-back iterator over a queue's lots.
pub struct Iter<'a> {
    queue: &'a PositionQueue,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Lot;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.node(self.cursor?)?;
        self.cursor = node.next;
        Some(&node.lot)
    }
}
