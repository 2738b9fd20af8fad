//! Holding ledger for the lotbook system.
//!
//! This crate provides:
//! - Slot cache mapping instruments to reusable dense indices
//! - FIFO/LIFO position queues of open lots
//! - The indexed holding ledger built on both
//! - Cost-basis settlement of lots against closing orders

pub mod holding_ledger;
pub mod position_queue;
pub mod settlement;
pub mod slot_cache;
pub mod summary;

pub use holding_ledger::HoldingLedger;
pub use position_queue::{PositionQueue, Removal};
pub use settlement::settle;
pub use slot_cache::{Slot, SlotCache, SLOT_CAPACITY};
pub use summary::AggregateSummary;
