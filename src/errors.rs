use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::common::Period;

/// Errors that can occur when constructing [`Period`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("period end {to} precedes start {from}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
    #[error("{year}-{month:02} is not a calendar month")]
    InvalidMonth { year: i32, month: u32 },
}

/// Rejected construction of a single payment line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentLineError {
    #[error("payment line {id} cannot reference itself as its previous line")]
    SelfReference { id: Uuid },
    #[error("effective period {effective} lies outside the amended line's period {valid}")]
    EffectiveOutsideAmended { effective: Period, valid: Period },
    #[error("termination date {from} lies outside the amended line's period {valid}")]
    TerminationOutsideAmended { from: NaiveDate, valid: Period },
}

/// Broken chain or timeline invariants. Always fatal: callers must not persist
/// anything derived from a chain that produced one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error(transparent)]
    Line(#[from] PaymentLineError),
    #[error("sequence {sequence} is not greater than preceding sequence {previous}")]
    SequenceNotIncreasing { previous: u64, sequence: u64 },
    #[error("line {sequence} created at {created_at} precedes line {previous} created at {previous_created_at}")]
    CreatedAtOutOfOrder {
        previous: u64,
        previous_created_at: DateTime<Utc>,
        sequence: u64,
        created_at: DateTime<Utc>,
    },
    #[error("line {sequence} references {actual:?}, expected {expected:?}")]
    BrokenBackReference {
        sequence: u64,
        expected: Option<Uuid>,
        actual: Option<Uuid>,
    },
    #[error("amendment {sequence} targets unknown line {id}")]
    UnknownAmendedLine { sequence: u64, id: Uuid },
    #[error("new line id {id} is issued more than once")]
    DuplicateNewLine { id: Uuid },
    #[error("new lines {first} and {second} overlap")]
    OverlappingNewLines { first: u64, second: u64 },
    #[error("lines sharing previous reference {previous:?} carry different ids {first} and {second}")]
    InconsistentIdentity {
        previous: Option<Uuid>,
        first: Uuid,
        second: Uuid,
    },
    #[error("reactivation {sequence} has no underlying new line for {period}")]
    ReactivationWithoutLine { sequence: u64, period: Period },
    #[error("projected intervals {first} and {second} overlap")]
    OverlappingTimeline { first: Period, second: Period },
    #[error("regenerated history differs from the original within {window}: {detail}")]
    EquivalenceMismatch { window: Period, detail: String },
    #[error("a ledger needs at least one payment line")]
    EmptyChain,
    #[error("stored history was rewritten at sequence {sequence}")]
    HistoryRewritten { sequence: u64 },
}

/// Failure modes of a reconciliation run. Nothing is partially applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    #[error("a reconciliation requires at least one new line")]
    EmptyTail,
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

impl From<PaymentLineError> for ReconciliationError {
    fn from(err: PaymentLineError) -> Self {
        ReconciliationError::Integrity(IntegrityError::Line(err))
    }
}

/// Error type that captures repository and configuration I/O failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unsupported schema version {found} (max supported {supported})")]
    UnsupportedSchema { found: u8, supported: u8 },
    #[error("{0} not found")]
    NotFound(String),
    #[error("stored ledger is corrupt: {0}")]
    Corrupt(#[from] IntegrityError),
    #[error("ledger file for `{requested}` belongs to recipient `{stored}`")]
    RecipientMismatch { requested: String, stored: String },
}

pub type IntegrityResult<T> = Result<T, IntegrityError>;
pub type StorageResult<T> = Result<T, StorageError>;
