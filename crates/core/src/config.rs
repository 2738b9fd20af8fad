//! Configuration structures for the lotbook system.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{CostMethod, TimeUnit};

/// Main configuration for a backtest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input file configuration.
    pub file: FileConfig,
    /// Backtest configuration.
    pub backtest: BacktestConfig,
    /// Benchmark configuration.
    pub benchmark: BenchmarkConfig,
    /// Reference threshold strategy parameters.
    pub strategy: StrategyConfig,
}

impl Config {
    /// Parse configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.file.delimiter.is_whitespace() && self.file.delimiter != '\t' {
            return Err(Error::config("delimiter must not be a space or newline"));
        }
        let columns = self.file.columns.indices();
        for (i, a) in columns.iter().enumerate() {
            if columns[i + 1..].contains(a) {
                return Err(Error::config(format!("column {a} is assigned twice")));
            }
        }
        if self.file.date_format.is_empty() {
            return Err(Error::config("date_format must not be empty"));
        }
        if !self.backtest.starting_cash.is_finite() || self.backtest.starting_cash < 0.0 {
            return Err(Error::config("starting_cash must be a non-negative number"));
        }
        if !self.backtest.commission.is_finite() || self.backtest.commission < 0.0 {
            return Err(Error::config("commission must be a non-negative number"));
        }
        if !self.strategy.order_volume.is_finite() || self.strategy.order_volume <= 0.0 {
            return Err(Error::config("strategy.order_volume must be positive"));
        }
        if !self.strategy.exit_move_pct.is_finite() || self.strategy.exit_move_pct <= 0.0 {
            return Err(Error::config("strategy.exit_move_pct must be positive"));
        }
        Ok(())
    }
}

/// Input file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Path of the tick file. The base date is read from its `_YYYYMMDD` suffix.
    pub path: PathBuf,
    /// Field delimiter.
    pub delimiter: char,
    /// chrono format of the filename date suffix.
    pub date_format: String,
    /// Column positions.
    pub columns: ColumnConfig,
    /// Unit of the timestamp offset column.
    pub timestamp_unit: TimeUnit,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/quotes_20240102.psv"),
            delimiter: '|',
            date_format: "%Y%m%d".to_string(),
            columns: ColumnConfig::default(),
            timestamp_unit: TimeUnit::Millis,
        }
    }
}

/// Zero-based column positions of the tick fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Offset from the file's base date.
    pub timestamp: usize,
    /// Instrument identifier.
    pub ticker: usize,
    pub bid: usize,
    pub bid_size: usize,
    pub ask: usize,
    pub ask_size: usize,
}

impl ColumnConfig {
    /// Every configured position, timestamp first.
    pub fn indices(&self) -> [usize; 6] {
        [
            self.timestamp,
            self.ticker,
            self.bid,
            self.bid_size,
            self.ask,
            self.ask_size,
        ]
    }

    /// Number of fields a record needs to cover every configured column.
    pub fn min_fields(&self) -> usize {
        self.indices().into_iter().max().unwrap_or(0) + 1
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            timestamp: 0,
            ticker: 1,
            bid: 2,
            bid_size: 3,
            ask: 4,
            ask_size: 5,
        }
    }
}

/// Backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Initial cash.
    pub starting_cash: f64,
    /// Flat commission charged per order.
    pub commission: f64,
    /// Lot selection on exits.
    pub cost_method: CostMethod,
    /// Symbols never handed to the strategy.
    pub ignore_symbols: Vec<String>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            starting_cash: 100_000.0,
            commission: 0.0,
            cost_method: CostMethod::Fifo,
            ignore_symbols: Vec::new(),
        }
    }
}

/// Benchmark configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Track every traded symbol as a benchmark security.
    pub enabled: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Threshold strategy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Symbols the strategy may enter. Empty means every symbol.
    pub symbols: Vec<String>,
    /// Largest spread, as a percentage of the ask, accepted on entry.
    pub max_spread_pct: f64,
    /// Largest ask size accepted on entry.
    pub max_ask_size: f64,
    /// Volume of every entry order.
    pub order_volume: f64,
    /// Move from the entry price, in percent, that triggers an exit.
    pub exit_move_pct: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["AAPL".to_string()],
            max_spread_pct: 2.0,
            max_ask_size: 50.0,
            order_volume: 50.0,
            exit_move_pct: 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.file.delimiter, '|');
        assert_eq!(config.file.columns.min_fields(), 6);
        assert_eq!(config.backtest.cost_method, CostMethod::Fifo);
        assert!(config.benchmark.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "file": {
                "delimiter": ",",
                "timestamp_unit": "ns",
                "columns": { "ticker": 6, "timestamp": 9 }
            },
            "backtest": { "cost_method": "lifo", "ignore_symbols": ["SPY"] }
        }"#;

        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.file.delimiter, ',');
        assert_eq!(config.file.timestamp_unit, TimeUnit::Nanos);
        assert_eq!(config.file.columns.ticker, 6);
        assert_eq!(config.file.columns.bid, 2);
        assert_eq!(config.file.columns.min_fields(), 10);
        assert_eq!(config.backtest.cost_method, CostMethod::Lifo);
        assert_eq!(config.backtest.ignore_symbols, vec!["SPY".to_string()]);
        assert_eq!(config.backtest.starting_cash, 100_000.0);
    }

    #[test]
    fn test_validate_rejects_shared_column() {
        let json = r#"{ "file": { "columns": { "ticker": 2 } } }"#;
        assert!(matches!(Config::from_json_str(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_negative_cash() {
        let json = r#"{ "backtest": { "starting_cash": -5.0 } }"#;
        assert!(matches!(Config::from_json_str(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_order_volume() {
        let json = r#"{ "strategy": { "order_volume": 0 } }"#;
        assert!(matches!(Config::from_json_str(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_time_unit_is_json_error() {
        let json = r#"{ "file": { "timestamp_unit": "fortnight" } }"#;
        assert!(matches!(Config::from_json_str(json), Err(Error::Json(_))));
    }
}
