//! Indexed collection of position queues, one per held instrument.
//!
//! The slot cache maps each symbol to a dense index into `slots`. Storage
//! grows to `(slot + 1) * 2` when a new slot lands past the end, so existing
//! queues never move between indices. A queue's slot is reclaimed as soon as
//! its last lot leaves.

use lotbook_core::{Amount, CostMethod, Error, Lot, LotId, LotRef, Order, RealizedRecord, Result, Tick};
use tracing::debug;

use crate::position_queue::PositionQueue;
use crate::slot_cache::{Slot, SlotCache};

#[derive(Debug, Clone, Default)]
enum LedgerSlot {
    /// Never handed out.
    #[default]
    Unallocated,
    /// Freed after its queue emptied.
    Vacant,
    Occupied(PositionQueue),
}

impl LedgerSlot {
    fn queue(&self) -> Option<&PositionQueue> {
        match self {
            LedgerSlot::Occupied(queue) => Some(queue),
            _ => None,
        }
    }

    fn queue_mut(&mut self) -> Option<&mut PositionQueue> {
        match self {
            LedgerSlot::Occupied(queue) => Some(queue),
            _ => None,
        }
    }
}

/// All open lots, grouped by instrument.
#[derive(Debug)]
pub struct HoldingLedger {
    cache: SlotCache,
    slots: Vec<LedgerSlot>,
    next_lot_id: u64,
}

impl Default for HoldingLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldingLedger {
    /// Create an empty ledger with room for one instrument.
    pub fn new() -> Self {
        Self {
            cache: SlotCache::new(),
            slots: vec![LedgerSlot::Unallocated],
            next_lot_id: 1,
        }
    }

    /// Hold a new lot and return its handle.
    ///
    /// The lot's identity is replaced by a fresh ledger-wide one.
    pub fn insert(&mut self, lot: Lot) -> Result<LotRef> {
        let lot = lot.with_id(LotId(self.next_lot_id));
        let handle = LotRef {
            symbol: lot.symbol.clone(),
            id: lot.id,
        };

        match self.cache.put(&lot.symbol) {
            Ok(slot) => {
                let idx = usize::from(slot);
                if idx >= self.slots.len() {
                    let grown = (idx + 1) * 2;
                    debug!(slot, from = self.slots.len(), to = grown, "ledger storage grown");
                    self.slots.resize(grown, LedgerSlot::Unallocated);
                }
                self.slots[idx] = LedgerSlot::Occupied(PositionQueue::seeded(lot));
            }
            Err(Error::AlreadyExists { slot, .. }) => {
                self.queue_at_mut(slot)?.push(lot);
            }
            Err(e) => return Err(e),
        }

        self.next_lot_id += 1;
        Ok(handle)
    }

    /// Insert a lot, then fold `tick` into its queue's summary.
    pub fn insert_and_update(&mut self, lot: Lot, tick: &Tick) -> Result<LotRef> {
        let handle = self.insert(lot)?;
        self.update(tick)?;
        Ok(handle)
    }

    /// Apply a tick to the queue of `tick.symbol`.
    pub fn update(&mut self, tick: &Tick) -> Result<()> {
        self.get_mut(&tick.symbol)?.update(tick);
        Ok(())
    }

    /// Queue held for `symbol`.
    pub fn get(&self, symbol: &str) -> Result<&PositionQueue> {
        let slot = self.cache.get(symbol)?;
        self.get_by_slot(slot)
            .ok_or_else(|| Error::not_found(format!("no queue for {symbol}")))
    }

    fn get_mut(&mut self, symbol: &str) -> Result<&mut PositionQueue> {
        let slot = self.cache.get(symbol)?;
        self.queue_at_mut(slot)
    }

    /// Queue stored at `slot`, if the slot is occupied.
    pub fn get_by_slot(&self, slot: Slot) -> Option<&PositionQueue> {
        self.slots.get(usize::from(slot)).and_then(LedgerSlot::queue)
    }

    fn queue_at_mut(&mut self, slot: Slot) -> Result<&mut PositionQueue> {
        self.slots
            .get_mut(usize::from(slot))
            .and_then(LedgerSlot::queue_mut)
            .ok_or_else(|| Error::not_found(format!("no queue at slot {slot}")))
    }

    /// Slot currently assigned to `symbol`.
    pub fn slot_of(&self, symbol: &str) -> Result<Slot> {
        self.cache.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.cache.contains(symbol)
    }

    /// Number of instruments with open lots.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Allocated storage length.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Open volume for `symbol`, zero when nothing is held.
    pub fn total_volume(&self, symbol: &str) -> Amount {
        self.get(symbol)
            .map(|queue| queue.summary().total_volume())
            .unwrap_or(0.0)
    }

    /// Live queues in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &PositionQueue> {
        self.slots.iter().filter_map(LedgerSlot::queue)
    }

    /// Drop the queue for `symbol` and reclaim its slot.
    ///
    /// Rejected with `QueueNotEmpty` while the queue still holds lots.
    pub fn delete(&mut self, symbol: &str) -> Result<()> {
        let slot = self.cache.get(symbol)?;
        let queue = self.queue_at_mut(slot)?;
        if !queue.is_empty() {
            return Err(Error::QueueNotEmpty {
                symbol: symbol.to_string(),
                lots: queue.len(),
            });
        }

        self.slots[usize::from(slot)] = LedgerSlot::Vacant;
        self.cache.delete(symbol)?;
        debug!(symbol, slot, "queue reclaimed");
        Ok(())
    }

    /// Remove one lot by identity, reclaiming the queue if it empties.
    pub fn remove_lot(&mut self, lot: &LotRef) -> Result<Lot> {
        let removal = self.get_mut(&lot.symbol)?.remove_by_identity(lot.id)?;
        if removal.became_empty() {
            self.delete(&lot.symbol)?;
        }
        Ok(removal.into_lot())
    }

    /// Close the lot `method` selects for `symbol` against `order`.
    ///
    /// `Ok(None)` when nothing is held for `symbol`. An emptied queue is
    /// reclaimed before returning.
    pub fn settle(
        &mut self,
        symbol: &str,
        method: CostMethod,
        order: &Order,
    ) -> Result<Option<RealizedRecord>> {
        let Ok(slot) = self.cache.get(symbol) else {
            return Ok(None);
        };
        let queue = self.queue_at_mut(slot)?;
        let record = queue.pop_to_settlement(method, order)?;
        if queue.is_empty() {
            self.delete(symbol)?;
        }
        Ok(record)
    }

    /// Open lots for `symbol`, front to back.
    pub fn lots(&self, symbol: &str) -> Vec<&Lot> {
        match self.get(symbol) {
            Ok(queue) => queue.iter().collect(),
            Err(_) => Vec::new(),
        }
    }
}
