//! Interpretation and verification of simulations produced by the external
//! payment system.

pub mod control;
pub mod cross_check;
pub mod interpret;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::common::Period;
use crate::domain::payment_line::PaymentLine;
use crate::domain::simulation::{RawSimulationResponse, SimulationModelError};

pub use control::{control_simulation, ControlError};
pub use cross_check::{cross_check, MismatchReason};
pub use interpret::{interpret, InterpretedSimulation, PeriodSummary};

/// Closed set of reasons the payment system can refuse a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SimulationFailure {
    #[error("the payment system is outside its service hours")]
    NotWithinServiceHours,
    #[error("the recipient is unknown to the population register")]
    RecipientUnknown,
    #[error("no payment schedule found")]
    NoScheduleFound,
    #[error("the payment case does not exist")]
    CaseNotFound,
    #[error("functional error: {message}")]
    FunctionalError { message: String },
    #[error("technical error: {message}")]
    TechnicalError { message: String },
}

impl SimulationFailure {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SimulationFailure::NotWithinServiceHours | SimulationFailure::TechnicalError { .. }
        )
    }
}

/// Lines to simulate for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub recipient_id: String,
    pub period: Period,
    pub lines: Vec<PaymentLine>,
}

/// Dry-run access to the external payment system.
pub trait SimulationClient: Send + Sync {
    fn simulate(
        &self,
        request: &SimulationRequest,
    ) -> Result<RawSimulationResponse, SimulationFailure>;
}

/// The raw response could not be turned into a typed simulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretationError {
    #[error("several simulated benefit postings in {period}")]
    AmbiguousBenefitPosting { period: Period },
    #[error("posting {posting} lies outside its period {period}")]
    PostingOutsidePeriod { period: Period, posting: Period },
    #[error("invalid posting dates {from}..{to}")]
    InvalidPostingDates {
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    },
    #[error(transparent)]
    Model(#[from] SimulationModelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retryable() {
        assert!(SimulationFailure::NotWithinServiceHours.is_transient());
        assert!(SimulationFailure::TechnicalError {
            message: "timeout".into()
        }
        .is_transient());
        assert!(!SimulationFailure::RecipientUnknown.is_transient());
        assert!(!SimulationFailure::CaseNotFound.is_transient());
        assert!(!SimulationFailure::FunctionalError {
            message: "bad".into()
        }
        .is_transient());
    }
}
