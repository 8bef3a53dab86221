//! Structural comparison of two simulations expected to agree.

use thiserror::Error;

use crate::domain::common::Period;
use crate::domain::payment_line::Amount;
use crate::domain::simulation::{Garnishment, SimulationPeriod, SimulationResult};

/// First point at which two simulations diverge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MismatchReason {
    #[error("recipient differs: {left} vs {right}")]
    Recipient { left: String, right: String },
    #[error("net amount differs: {left} vs {right}")]
    NetAmount { left: Amount, right: Amount },
    #[error("overpayment differs: {left} vs {right}")]
    Overpayment { left: Amount, right: Amount },
    #[error("back payment differs: {left} vs {right}")]
    BackPayment { left: Amount, right: Amount },
    #[error("amount to be paid differs: {left} vs {right}")]
    ToBePaid { left: Amount, right: Amount },
    #[error("total entitlement differs: {left} vs {right}")]
    Total { left: Amount, right: Amount },
    #[error("period count differs: {left} vs {right}")]
    PeriodCount { left: usize, right: usize },
    #[error("period #{index} differs: {left:?} vs {right:?}")]
    Period {
        index: usize,
        left: Box<SimulationPeriod>,
        right: Box<SimulationPeriod>,
    },
}

/// Compares `left` and `right`, reporting the first divergence. Due dates and
/// the derived back-payment flag are allowed to differ between the two.
pub fn cross_check(left: &SimulationResult, right: &SimulationResult) -> Result<(), MismatchReason> {
    if left.recipient_id() != right.recipient_id() {
        return Err(MismatchReason::Recipient {
            left: left.recipient_id().to_string(),
            right: right.recipient_id().to_string(),
        });
    }
    compare(left.net_amount(), right.net_amount(), |left, right| {
        MismatchReason::NetAmount { left, right }
    })?;
    compare(left.total_overpayment(), right.total_overpayment(), |left, right| {
        MismatchReason::Overpayment { left, right }
    })?;
    compare(left.total_back_payment(), right.total_back_payment(), |left, right| {
        MismatchReason::BackPayment { left, right }
    })?;
    compare(left.total_to_be_paid(), right.total_to_be_paid(), |left, right| {
        MismatchReason::ToBePaid { left, right }
    })?;
    compare(left.total_entitlement(), right.total_entitlement(), |left, right| {
        MismatchReason::Total { left, right }
    })?;
    if left.periods().len() != right.periods().len() {
        return Err(MismatchReason::PeriodCount {
            left: left.periods().len(),
            right: right.periods().len(),
        });
    }
    for (index, (a, b)) in left.periods().iter().zip(right.periods()).enumerate() {
        if comparable(a) != comparable(b) {
            return Err(MismatchReason::Period {
                index,
                left: Box::new(a.clone()),
                right: Box::new(b.clone()),
            });
        }
    }
    Ok(())
}

fn compare<F>(left: Amount, right: Amount, reason: F) -> Result<(), MismatchReason>
where
    F: FnOnce(Amount, Amount) -> MismatchReason,
{
    if left == right {
        Ok(())
    } else {
        Err(reason(left, right))
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Comparable<'a> {
    label: &'static str,
    period: &'a Period,
    to_be_paid: Amount,
    already_paid: Amount,
    overpayment: Amount,
    tax: Option<Amount>,
    garnishment: Option<&'a Garnishment>,
}

fn comparable(period: &SimulationPeriod) -> Comparable<'_> {
    let (tax, garnishment) = match period {
        SimulationPeriod::ToBePaid {
            tax, garnishment, ..
        } => (*tax, garnishment.as_ref()),
        SimulationPeriod::AlreadyPaid { garnishment, .. } => (None, garnishment.as_ref()),
        SimulationPeriod::NoPayment { .. } | SimulationPeriod::Overpayment { .. } => (None, None),
    };
    Comparable {
        label: period.label(),
        period: period.period(),
        to_be_paid: period.to_be_paid(),
        already_paid: period.already_paid(),
        overpayment: period.overpayment(),
        tax,
        garnishment,
    }
}
