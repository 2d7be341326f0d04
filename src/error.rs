//! Domain errors.
//!
//! I/O layers return [`anyhow::Result`]; these typed errors cover validation
//! of operator input and of rows coming back from the record store.

use thiserror::Error;

/// Errors raised by form validation and record-store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid number for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("barcode not found: {0}")]
    BarcodeNotFound(String),

    #[error("barcode already exists: {0}")]
    DuplicateBarcode(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("record store at {0} is read-only")]
    ReadOnlyStore(String),

    #[error("invalid roll status: {0:?} (expected active, inactive or deprecated)")]
    InvalidStatus(String),
}

/// Reasons a raw usage row is rejected before aggregation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("row cannot be read: {0}")]
    Malformed(String),

    #[error("pieces_counter is missing")]
    MissingPieces,

    #[error("pieces_counter is negative: {0}")]
    NegativePieces(String),

    #[error("pieces_counter is not a whole number: {0}")]
    NonNumericPieces(String),

    #[error("line_number is invalid: {0}")]
    InvalidLine(String),

    #[error("usage_date is missing")]
    MissingDate,

    #[error("usage_date cannot be parsed: {0:?}")]
    InvalidDate(String),

    #[error("roll projection is missing")]
    MissingRoll,
}
