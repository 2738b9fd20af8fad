//! Error types for the lotbook system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the lotbook system.
#[derive(Error, Debug)]
pub enum Error {
    /// Key, slot or lot is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate insertion into the slot cache. Carries the live slot.
    #[error("Key already exists: {key} (slot {slot})")]
    AlreadyExists { key: String, slot: u16 },

    /// Delete rejected because the queue still holds lots.
    #[error("Queue for {symbol} still holds {lots} lot(s)")]
    QueueNotEmpty { symbol: String, lots: usize },

    /// Every slot index is in use.
    #[error("Slot range exhausted: {capacity} identifiers already tracked")]
    SlotsExhausted { capacity: usize },

    /// A raw input record could not be parsed into a tick.
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    /// Order declined by order management or the portfolio.
    #[error("Order rejected: {0}")]
    Rejected(String),

    /// Closing order smaller than the selected lot. Lots are never split.
    #[error("Partial fill unsupported: lot volume {lot_volume}, order volume {order_volume}")]
    PartialFill { lot_volume: f64, order_volume: f64 },

    /// Order does not match the lot it is meant to close.
    #[error("Mismatch: {0}")]
    Mismatch(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Create a malformed record error.
    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    /// Create a rejection.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Error::Rejected(msg.into())
    }

    /// Create a mismatch error.
    pub fn mismatch(msg: impl Into<String>) -> Self {
        Error::Mismatch(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Whether the simulation may continue after this error.
    ///
    /// Everything else leaves the ledger in a state that can no longer be
    /// trusted and must abort the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedRecord { .. } | Error::Rejected(_) | Error::PartialFill { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::malformed(3, "bad bid").is_recoverable());
        assert!(Error::rejected("no cash").is_recoverable());
        assert!(Error::PartialFill { lot_volume: 10.0, order_volume: 4.0 }.is_recoverable());

        assert!(!Error::SlotsExhausted { capacity: 65_536 }.is_recoverable());
        assert!(!Error::not_found("AAPL").is_recoverable());
        assert!(!Error::QueueNotEmpty { symbol: "AAPL".into(), lots: 1 }.is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = Error::AlreadyExists { key: "MSFT".into(), slot: 4 };
        assert_eq!(err.to_string(), "Key already exists: MSFT (slot 4)");
    }
}
