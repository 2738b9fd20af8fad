//! Backtest simulator.
//!
//! Consumes ticks in production order and drives every other component:
//! benchmark, strategy, order management, holdings and the performance log.
//! Each tick is fully processed before the next one is received.

use lotbook_core::{Config, Error, Order, Result, Side, Tick, VOLUME_EPSILON};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::benchmark::Benchmark;
use crate::metrics::{BacktestMetrics, MetricsCalculator};
use crate::oms::OrderManager;
use crate::performance::PerformanceLog;
use crate::portfolio::Portfolio;
use crate::strategy::Strategy;

/// Counters for one simulation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Ticks processed.
    pub ticks: u64,
    /// Ticks of ignored symbols.
    pub ignored: u64,
    /// Entry orders filled.
    pub entries: u64,
    /// Exit orders filled.
    pub exits: u64,
    /// Lots closed.
    pub lots_closed: u64,
    /// Orders declined.
    pub rejected: u64,
    /// Exits skipped because the selected lot was larger than the order.
    pub partial_fills: u64,
}

/// One simulation context. Instances share nothing.
pub struct Simulation<S: Strategy> {
    config: Config,
    strategy: S,
    portfolio: Portfolio,
    oms: OrderManager,
    benchmark: Benchmark,
    performance: PerformanceLog,
    stats: RunStats,
}

impl<S: Strategy> Simulation<S> {
    /// Create a simulation with the configured starting cash.
    pub fn new(config: Config, strategy: S) -> Self {
        let portfolio = Portfolio::new(config.backtest.starting_cash);
        let oms = OrderManager::new(config.backtest.commission);

        Self {
            config,
            strategy,
            portfolio,
            oms,
            benchmark: Benchmark::new(),
            performance: PerformanceLog::new(),
            stats: RunStats::default(),
        }
    }

    /// Process every tick until the channel is closed and drained.
    ///
    /// Stops at the first error that is not recoverable.
    pub async fn run(&mut self, mut ticks: mpsc::Receiver<Tick>) -> Result<RunStats> {
        info!(
            cash = self.portfolio.cash(),
            cost_method = ?self.config.backtest.cost_method,
            "simulation started"
        );

        while let Some(tick) = ticks.recv().await {
            self.process(&tick)?;
        }

        info!(
            ticks = self.stats.ticks,
            entries = self.stats.entries,
            exits = self.stats.exits,
            rejected = self.stats.rejected,
            cash = self.portfolio.cash(),
            equity = self.portfolio.equity(),
            "simulation finished"
        );
        Ok(self.stats)
    }

    /// Run one tick through the pipeline.
    pub fn process(&mut self, tick: &Tick) -> Result<()> {
        self.stats.ticks += 1;

        if self.config.benchmark.enabled {
            self.benchmark.observe(tick);
        }

        if self.config.backtest.ignore_symbols.contains(&tick.symbol) {
            self.stats.ignored += 1;
            return Ok(());
        }

        if let Err(e) = self.enter(tick) {
            self.recover(e, tick)?;
        }
        self.check_exits(tick)
    }

    fn enter(&mut self, tick: &Tick) -> Result<()> {
        let Some(order) = self.strategy.evaluate_entry(&self.portfolio, tick) else {
            return Ok(());
        };
        if order.side != Side::Buy {
            return Err(Error::rejected(format!("entry for {} is not a buy", order.symbol)));
        }
        if order.symbol != tick.symbol {
            return Err(Error::rejected(format!(
                "entry for {} on a {} tick",
                order.symbol, tick.symbol
            )));
        }

        let cost = order.notional() + self.oms.commission();
        if !self.portfolio.can_afford(cost) {
            return Err(Error::rejected(format!(
                "cost {cost:.2} exceeds cash {:.2}",
                self.portfolio.cash()
            )));
        }

        let (order, delta) = self.oms.register(order)?;
        let lot = self.portfolio.add_holding(order.to_lot(), tick)?;
        self.portfolio.apply_delta(delta);
        self.stats.entries += 1;

        debug!(
            symbol = %order.symbol,
            order = order.id.0,
            lot = lot.id.0,
            price = order.price,
            volume = order.volume,
            "entry filled"
        );
        Ok(())
    }

    fn check_exits(&mut self, tick: &Tick) -> Result<()> {
        let open = self.oms.find_open(&tick.symbol);
        if open.is_empty() {
            return Ok(());
        }
        if self.portfolio.holds(&tick.symbol) {
            self.portfolio.update(tick)?;
        }

        for open_order in open {
            let Some(exit) = self.strategy.evaluate_exit(&self.portfolio, &open_order, tick) else {
                continue;
            };
            if let Err(e) = self.exit(&open_order, exit) {
                self.recover(e, tick)?;
            }
        }
        Ok(())
    }

    fn exit(&mut self, open: &Order, exit: Order) -> Result<()> {
        if exit.side != Side::Sell || exit.symbol != open.symbol {
            return Err(Error::rejected(format!(
                "exit for order {} must sell {}",
                open.id.0, open.symbol
            )));
        }

        self.oms.check_close(open.id, &exit)?;

        let closing = self
            .portfolio
            .close(&exit, self.config.backtest.cost_method)?;
        if closing.is_empty() {
            return Err(Error::rejected(format!("nothing held for {}", exit.symbol)));
        }
        if closing.unfilled > VOLUME_EPSILON {
            warn!(
                symbol = %exit.symbol,
                order = open.id.0,
                unfilled = closing.unfilled,
                "exit only partly settled"
            );
        }

        let (closed, delta) = self
            .oms
            .close(open.id, exit.with_volume(closing.settled_volume()))?;
        self.portfolio.apply_delta(delta);

        self.stats.exits += 1;
        self.stats.lots_closed += closing.records.len() as u64;
        debug!(
            symbol = %closed.symbol,
            order = closed.id.0,
            lots = closing.records.len(),
            delta,
            "exit filled"
        );

        for record in closing.records {
            self.performance.record_closed_lot(record);
        }
        self.performance.record_closed_order(closed);
        Ok(())
    }

    fn recover(&mut self, error: Error, tick: &Tick) -> Result<()> {
        if !error.is_recoverable() {
            return Err(error);
        }
        match error {
            Error::PartialFill { .. } => self.stats.partial_fills += 1,
            _ => self.stats.rejected += 1,
        }
        warn!(symbol = %tick.symbol, ts = %tick.timestamp, error = %error, "order skipped");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn benchmark(&self) -> &Benchmark {
        &self.benchmark
    }

    pub fn performance(&self) -> &PerformanceLog {
        &self.performance
    }

    pub fn orders(&self) -> &OrderManager {
        &self.oms
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Summary metrics over the lots closed so far.
    pub fn metrics(&self) -> BacktestMetrics {
        MetricsCalculator::new(self.config.backtest.starting_cash)
            .calculate(self.performance.closed_lots())
    }
}
