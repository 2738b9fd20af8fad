//! Tick ingestion for the lotbook system.
//!
//! This crate handles:
//! - Base date derivation from tick file names
//! - Record parsing into normalized ticks
//! - The background producer/parser pipeline feeding the simulation

pub mod record;
pub mod worker;

pub use record::{file_date, RecordParser};
pub use worker::{IngestStats, Ingestion, IngestionTasks, IngestionWorker};
