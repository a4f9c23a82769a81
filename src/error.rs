// ⚠️ Error types
// Row-level value failures vs. whole-stream failures

use thiserror::Error;

/// Failure to parse a single locale-formatted value (date or amount).
///
/// Always recovered by the decoder: the row is skipped, never the import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("date is empty")]
    EmptyDate,

    #[error("invalid date '{0}' (expected DD.MM.YYYY)")]
    InvalidDate(String),

    #[error("amount is empty")]
    EmptyAmount,

    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("amount '{0}' is out of range")]
    AmountOutOfRange(String),
}

/// Failure that makes a whole statement unusable.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read statement: {0}")]
    Io(#[from] std::io::Error),

    #[error("statement has no header row")]
    MissingHeader,

    #[error("statement is not readable as CSV: {0}")]
    Csv(#[from] csv::Error),
}
