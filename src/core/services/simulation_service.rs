use tracing::{info, warn};

use crate::config::Config;
use crate::core::simulation::{
    control_simulation, cross_check, interpret, InterpretedSimulation, SimulationClient,
    SimulationRequest,
};
use crate::core::timeline::project;
use crate::domain::payment_line::PaymentLine;
use crate::domain::simulation::SimulationResult;

use super::ServiceResult;

/// An interpreted simulation together with its typed result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub interpreted: InterpretedSimulation,
    pub result: SimulationResult,
}

pub struct SimulationService;

impl SimulationService {
    pub fn simulate(
        client: &dyn SimulationClient,
        request: &SimulationRequest,
    ) -> ServiceResult<SimulationOutcome> {
        let raw = client.simulate(request).map_err(|failure| {
            warn!(
                recipient = %request.recipient_id,
                transient = failure.is_transient(),
                %failure,
                "simulation refused"
            );
            failure
        })?;
        let interpreted = interpret(&raw)?;
        let result = interpreted.to_result()?;
        info!(
            recipient = %request.recipient_id,
            periods = result.periods().len(),
            to_be_paid = result.total_to_be_paid(),
            overpayment = result.total_overpayment(),
            "simulation interpreted"
        );
        Ok(SimulationOutcome {
            interpreted,
            result,
        })
    }

    /// Simulates `request` and checks the outcome against the timeline that
    /// `existing` followed by the requested lines would project to.
    pub fn simulate_and_control(
        client: &dyn SimulationClient,
        request: &SimulationRequest,
        existing: &[PaymentLine],
        config: &Config,
    ) -> ServiceResult<SimulationOutcome> {
        let outcome = Self::simulate(client, request)?;
        let mut chain = existing.to_vec();
        chain.extend(request.lines.iter().cloned());
        let timeline = project(&chain)?;
        control_simulation(
            &outcome.interpreted,
            &timeline,
            config.allow_overpayment_in_simulation,
        )?;
        Ok(outcome)
    }

    pub fn verify(left: &SimulationResult, right: &SimulationResult) -> ServiceResult<()> {
        cross_check(left, right).map_err(|reason| {
            warn!(recipient = %left.recipient_id(), %reason, "simulations disagree");
            reason.into()
        })
    }
}
