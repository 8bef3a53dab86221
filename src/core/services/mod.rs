pub mod ledger_service;
pub mod simulation_service;

pub use ledger_service::LedgerService;
pub use simulation_service::{SimulationOutcome, SimulationService};

use crate::core::simulation::{ControlError, InterpretationError, MismatchReason, SimulationFailure};
use crate::domain::ledger::SettlementError;
use crate::errors::{IntegrityError, ReconciliationError, StorageError};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Simulation(#[from] SimulationFailure),
    #[error(transparent)]
    Interpretation(#[from] InterpretationError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Mismatch(#[from] MismatchReason),
    #[error("{0}")]
    Invalid(String),
}
