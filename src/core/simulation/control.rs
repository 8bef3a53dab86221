use thiserror::Error;
use tracing::{debug, warn};

use super::interpret::InterpretedSimulation;
use crate::domain::common::Period;
use crate::domain::payment_line::Amount;
use crate::domain::timeline::{IntervalKind, Timeline};

/// Verdict of checking a simulation against the timeline it should pay out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("simulated {simulated} for {period}, timeline expects {expected:?}")]
    SimulatedAmountDiffers {
        period: Period,
        simulated: Amount,
        expected: Option<Amount>,
    },
    #[error("simulation contains an overpayment of {amount}")]
    ContainsOverpayment { amount: Amount },
}

/// Checks every simulated monthly benefit against `timeline`, then rejects
/// overpayments unless `allow_overpayment` is set.
pub fn control_simulation(
    simulation: &InterpretedSimulation,
    timeline: &Timeline,
    allow_overpayment: bool,
) -> Result<(), ControlError> {
    for (period, simulated) in simulation.simulated_by_period() {
        if simulated == 0 {
            continue;
        }
        let expected = paying_amount(timeline, &period);
        debug!(%period, simulated, ?expected, "controlling simulated month");
        if expected != Some(simulated) {
            warn!(%period, simulated, ?expected, "simulated amount differs from timeline");
            return Err(ControlError::SimulatedAmountDiffers {
                period,
                simulated,
                expected,
            });
        }
    }

    let overpayment = simulation.total_summary().overpayment;
    if overpayment > 0 && !allow_overpayment {
        warn!(overpayment, "simulation contains an overpayment");
        return Err(ControlError::ContainsOverpayment {
            amount: overpayment,
        });
    }
    Ok(())
}

/// The single amount paid within `period`, ignoring stretches where nothing
/// is paid.
fn paying_amount(timeline: &Timeline, period: &Period) -> Option<Amount> {
    let restricted = timeline.restrict(period);
    let mut amounts = restricted
        .intervals()
        .iter()
        .filter(|interval| matches!(interval.kind, IntervalKind::Paying | IntervalKind::Reactivated))
        .map(|interval| interval.amount);
    let first = amounts.next()?;
    amounts.all(|amount| amount == first).then_some(first)
}
