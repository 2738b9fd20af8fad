//! Replay a tick file through the threshold strategy and report the results.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lotbook_backtest::{BacktestMetrics, Benchmark, RunStats, Simulation, ThresholdStrategy};
use lotbook_core::Config;
use lotbook_ingestion::{IngestStats, IngestionWorker};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "replay",
    about = "Replay a delimited tick file through the lotbook backtester"
)]
struct Cli {
    /// JSON configuration file. Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick file, overriding `file.path` from the configuration.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Write the JSON summary here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    ingest: IngestStats,
    run: RunStats,
    cash: f64,
    equity: f64,
    /// Realized P&L before commission.
    realized_pnl: f64,
    open_lots: usize,
    metrics: BacktestMetrics,
    benchmark: &'a Benchmark,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(data) = cli.data {
        config.file.path = data;
    }

    let path = config.file.path.clone();
    let worker = IngestionWorker::from_config(&config.file)?;
    let ingestion = worker
        .open(&path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;

    let strategy = ThresholdStrategy::new(config.strategy.clone());
    let mut sim = Simulation::new(config, strategy);
    let run = sim.run(ingestion.ticks).await.context("simulation aborted")?;
    let ingest = ingestion.tasks.join().await.context("ingestion failed")?;

    let portfolio = sim.portfolio();
    let report = Report {
        ingest,
        run,
        cash: portfolio.cash(),
        equity: portfolio.equity(),
        realized_pnl: sim.performance().realized_pnl(),
        open_lots: portfolio.holdings().iter().map(|q| q.len()).sum(),
        metrics: sim.metrics(),
        benchmark: sim.benchmark(),
    };
    let json = serde_json::to_string_pretty(&report)?;

    match cli.out {
        Some(out) => {
            std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
            info!(path = %out.display(), "summary written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
