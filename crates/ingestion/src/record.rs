//! Raw record to tick conversion.
//!
//! A record is one delimited line already split into fields. Its timestamp
//! column holds an offset from the file's base date, in a configured unit.

use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use lotbook_core::config::ColumnConfig;
use lotbook_core::{Amount, Error, Result, Tick, TimeUnit, Timestamp};

/// Base date of a tick file, read from the filename suffix after the last `_`.
///
/// `quotes_20240102.psv` with format `%Y%m%d` gives 2024-01-02 00:00 UTC.
pub fn file_date(path: impl AsRef<Path>, format: &str) -> Result<Timestamp> {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::config(format!("no file name in {}", path.display())))?;
    let suffix = stem.rsplit('_').next().unwrap_or(stem);

    let date = NaiveDate::parse_from_str(suffix, format).map_err(|e| {
        Error::config(format!(
            "cannot read a {format} date from '{suffix}' in {}: {e}",
            path.display()
        ))
    })?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

/// Converts split records into ticks.
#[derive(Debug, Clone)]
pub struct RecordParser {
    columns: ColumnConfig,
    unit: TimeUnit,
    base_date: Timestamp,
}

impl RecordParser {
    /// Create a parser for one file.
    pub fn new(columns: ColumnConfig, unit: TimeUnit, base_date: Timestamp) -> Self {
        Self {
            columns,
            unit,
            base_date,
        }
    }

    /// Fewest fields a record must have.
    pub fn min_fields(&self) -> usize {
        self.columns.min_fields()
    }

    pub fn base_date(&self) -> Timestamp {
        self.base_date
    }

    /// Parse one record. `line` is only used for error reporting.
    pub fn parse(&self, line: u64, fields: &[String]) -> Result<Tick> {
        let field = |idx: usize, name: &str| -> Result<&str> {
            fields
                .get(idx)
                .map(|f| f.trim())
                .ok_or_else(|| Error::malformed(line, format!("missing {name} column {idx}")))
        };
        let number = |idx: usize, name: &str| -> Result<Amount> {
            let raw = field(idx, name)?;
            let value: Amount = raw
                .parse()
                .map_err(|_| Error::malformed(line, format!("{name} '{raw}' is not a number")))?;
            if !value.is_finite() {
                return Err(Error::malformed(line, format!("{name} '{raw}' is not finite")));
            }
            Ok(value)
        };
        let price = |idx: usize, name: &str| -> Result<Amount> {
            let value = number(idx, name)?;
            if value <= 0.0 {
                return Err(Error::malformed(line, format!("{name} must be positive, got {value}")));
            }
            Ok(value)
        };

        let symbol = field(self.columns.ticker, "ticker")?;
        if symbol.is_empty() {
            return Err(Error::malformed(line, "empty ticker"));
        }

        let bid = price(self.columns.bid, "bid")?;
        let ask = price(self.columns.ask, "ask")?;
        let bid_size = number(self.columns.bid_size, "bid size")?;
        let ask_size = number(self.columns.ask_size, "ask size")?;

        let offset = number(self.columns.timestamp, "timestamp")?;
        let timestamp = self
            .unit
            .to_duration(offset)
            .and_then(|d| self.base_date.checked_add_signed(d))
            .ok_or_else(|| Error::malformed(line, format!("timestamp offset {offset} out of range")))?;

        Ok(Tick {
            symbol: symbol.to_string(),
            bid,
            ask,
            bid_size,
            ask_size,
            timestamp,
        })
    }
}
