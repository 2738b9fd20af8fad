//! Identifier to slot index mapping with slot reuse.
//!
//! Freed slots are handed out again, smallest first, before the high-water
//! mark grows. Every call takes the internal lock once, so a single call is
//! atomic but a `get` followed by a `put` is not.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lotbook_core::{Error, Result};
use tracing::debug;

/// Compact handle assigned to a live identifier.
pub type Slot = u16;

/// Number of identifiers that can be tracked at the same time.
pub const SLOT_CAPACITY: usize = Slot::MAX as usize + 1;

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<String, Slot>,
    free: BTreeSet<Slot>,
    /// Next never-used index.
    next: usize,
}

/// Read/write-locked slot cache.
#[derive(Debug, Default)]
pub struct SlotCache {
    inner: RwLock<Inner>,
}

impl SlotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock still guards a consistent map: every write below
    // completes its mutation before any call that can panic.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign a slot to `key`.
    ///
    /// Fails with `AlreadyExists` (carrying the live slot) if the key is
    /// known, and with `SlotsExhausted` if every index is taken.
    pub fn put(&self, key: &str) -> Result<Slot> {
        let mut inner = self.write();

        if let Some(&slot) = inner.items.get(key) {
            return Err(Error::AlreadyExists {
                key: key.to_string(),
                slot,
            });
        }

        let slot = match inner.free.pop_first() {
            Some(slot) => slot,
            None => {
                if inner.next >= SLOT_CAPACITY {
                    return Err(Error::SlotsExhausted {
                        capacity: SLOT_CAPACITY,
                    });
                }
                let slot = inner.next as Slot;
                inner.next += 1;
                slot
            }
        };

        inner.items.insert(key.to_string(), slot);
        debug!(key, slot, "slot assigned");
        Ok(slot)
    }

    /// Look up the slot of `key`.
    pub fn get(&self, key: &str) -> Result<Slot> {
        self.read()
            .items
            .get(key)
            .copied()
            .ok_or_else(|| Error::not_found(format!("no slot for {key}")))
    }

    /// Remove `key` and return its slot to the free list.
    pub fn delete(&self, key: &str) -> Result<Slot> {
        let mut inner = self.write();
        let slot = inner
            .items
            .remove(key)
            .ok_or_else(|| Error::not_found(format!("no slot for {key}")))?;
        inner.free.insert(slot);
        debug!(key, slot, "slot freed");
        Ok(slot)
    }

    /// Whether `key` currently holds a slot.
    pub fn contains(&self, key: &str) -> bool {
        self.read().items.contains_key(key)
    }

    /// Number of live identifiers.
    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    /// Whether no identifier holds a slot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freed slots waiting for reuse, ascending.
    pub fn free_slots(&self) -> Vec<Slot> {
        self.read().free.iter().copied().collect()
    }

    /// Number of slots ever handed out.
    pub fn high_water(&self) -> usize {
        self.read().next
    }

    /// Copy of the live identifier to slot mapping.
    pub fn snapshot(&self) -> HashMap<String, Slot> {
        self.read().items.clone()
    }
}
