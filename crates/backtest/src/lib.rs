//! Backtesting engine for the lotbook system.
//!
//! This crate provides:
//! - The tick-by-tick simulation loop
//! - Portfolio, order management and benchmark bookkeeping
//! - The strategy interface and a reference threshold strategy
//! - Performance log and summary metrics

pub mod benchmark;
pub mod metrics;
pub mod oms;
pub mod performance;
pub mod portfolio;
pub mod simulator;
pub mod strategy;

pub use benchmark::Benchmark;
pub use metrics::{BacktestMetrics, MetricsCalculator};
pub use oms::OrderManager;
pub use performance::PerformanceLog;
pub use portfolio::{Closing, Portfolio};
pub use simulator::{RunStats, Simulation};
pub use strategy::{Strategy, ThresholdStrategy};
