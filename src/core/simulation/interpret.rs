//! Classification of raw postings into accounting categories.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::InterpretationError;
use crate::domain::common::Period;
use crate::domain::payment_line::Amount;
use crate::domain::simulation::{
    Garnishment, LedgerPosting, PostingClass, RawPayment, RawSimulationResponse, SimulationPeriod,
    SimulationResult,
};

/// Auditable per-period totals.
///
/// `back_payment` and `future_payment` partition `to_be_paid`: exactly one of
/// them equals it and the other is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub to_be_paid: Amount,
    pub back_payment: Amount,
    pub future_payment: Amount,
    pub total_entitlement: Amount,
    pub already_paid: Amount,
    pub overpayment: Amount,
    pub reduction_error_account: Amount,
}

impl PeriodSummary {
    fn zero(period: Period) -> Self {
        Self {
            period,
            to_be_paid: 0,
            back_payment: 0,
            future_payment: 0,
            total_entitlement: 0,
            already_paid: 0,
            overpayment: 0,
            reduction_error_account: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InterpretedPayment {
    due_date: NaiveDate,
    posting: LedgerPosting,
    has_tax: bool,
    simulated_benefit: Option<Amount>,
    garnishment: Option<Garnishment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InterpretedPeriod {
    period: Period,
    payment: Option<InterpretedPayment>,
}

impl InterpretedPeriod {
    fn is_due(&self, payment: &InterpretedPayment) -> bool {
        self.period.to() < payment.due_date
    }

    fn summary(&self) -> PeriodSummary {
        let Some(payment) = &self.payment else {
            return PeriodSummary::zero(self.period);
        };
        let posting = &payment.posting;
        let to_be_paid = posting.net_benefit().max(0);
        let due = self.is_due(payment);
        PeriodSummary {
            period: self.period,
            to_be_paid,
            back_payment: if due { to_be_paid } else { 0 },
            future_payment: if due { 0 } else { to_be_paid },
            total_entitlement: posting.debit_benefit - posting.debit_error,
            already_paid: posting.credit_benefit,
            overpayment: posting.debit_error,
            reduction_error_account: posting.credit_error,
        }
    }
}

/// A raw simulation response classified period by period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretedSimulation {
    recipient_id: String,
    computed_at: NaiveDate,
    net_amount: Amount,
    span: Period,
    empty_response: bool,
    periods: Vec<InterpretedPeriod>,
}

/// Interprets `raw`. Postings of unknown classes are logged and skipped.
pub fn interpret(raw: &RawSimulationResponse) -> Result<InterpretedSimulation, InterpretationError> {
    let empty_response = raw.posting_count() == 0;
    let mut periods = Vec::with_capacity(raw.periods.len());
    if !empty_response {
        for raw_period in &raw.periods {
            let payment = match &raw_period.payment {
                Some(payment) if !payment.postings.is_empty() => {
                    Some(interpret_payment(&raw_period.period, payment)?)
                }
                _ => None,
            };
            periods.push(InterpretedPeriod {
                period: raw_period.period,
                payment,
            });
        }
    }
    periods.sort_by_key(|period| period.period.from());

    let span = match (periods.first(), periods.last()) {
        (Some(first), Some(last)) => {
            Period::new(first.period.from(), last.period.to()).unwrap_or(raw.requested_period)
        }
        _ => raw.requested_period,
    };
    debug!(
        recipient = %raw.recipient_id,
        periods = periods.len(),
        empty_response,
        "interpreted simulation"
    );
    Ok(InterpretedSimulation {
        recipient_id: raw.recipient_id.clone(),
        computed_at: raw.computed_at,
        net_amount: raw.net_amount,
        span,
        empty_response,
        periods,
    })
}

fn interpret_payment(
    period: &Period,
    payment: &RawPayment,
) -> Result<InterpretedPayment, InterpretationError> {
    let mut posting = LedgerPosting::default();
    let mut has_tax = false;
    let mut simulated_benefit = None;
    let mut garnishment: Option<Garnishment> = None;

    for raw in &payment.postings {
        let dates = Period::new(raw.from, raw.to).map_err(|_| {
            InterpretationError::InvalidPostingDates {
                from: raw.from,
                to: raw.to,
            }
        })?;
        if !period.covers(&dates) {
            return Err(InterpretationError::PostingOutsidePeriod {
                period: *period,
                posting: dates,
            });
        }
        let Some(class) = PostingClass::from_class_type(&raw.class_type) else {
            warn!(
                class_type = %raw.class_type,
                class_code = %raw.class_code,
                amount = raw.amount,
                %period,
                "skipping posting of unknown class"
            );
            continue;
        };
        match class {
            PostingClass::Garnishment => {
                let entry = garnishment.get_or_insert_with(|| Garnishment {
                    amount: 0,
                    class_code: raw.class_code.clone(),
                });
                entry.amount += -raw.amount;
            }
            PostingClass::Tax => has_tax = true,
            PostingClass::Benefit if raw.is_simulated_benefit() => {
                if simulated_benefit.replace(raw.amount).is_some() {
                    return Err(InterpretationError::AmbiguousBenefitPosting { period: *period });
                }
            }
            _ => {}
        }
        posting.record(class, raw.amount);
    }

    Ok(InterpretedPayment {
        due_date: payment.due_date,
        posting,
        has_tax,
        simulated_benefit,
        garnishment,
    })
}

impl InterpretedSimulation {
    pub fn recipient_id(&self) -> &str {
        &self.recipient_id
    }

    pub fn computed_at(&self) -> NaiveDate {
        self.computed_at
    }

    pub fn net_amount(&self) -> Amount {
        self.net_amount
    }

    pub fn span(&self) -> &Period {
        &self.span
    }

    /// True when the payment system answered without a single posting.
    pub fn is_empty_response(&self) -> bool {
        self.empty_response
    }

    fn paying_periods(&self) -> impl Iterator<Item = (&InterpretedPeriod, &InterpretedPayment)> {
        self.periods
            .iter()
            .filter_map(|period| period.payment.as_ref().map(|payment| (period, payment)))
    }

    /// Periods the response actually moved money in.
    pub fn periods_with_payments(&self) -> Vec<Period> {
        self.paying_periods().map(|(period, _)| period.period).collect()
    }

    pub fn ledger_postings(&self) -> Vec<(Period, LedgerPosting)> {
        if self.empty_response {
            return vec![(self.span, LedgerPosting::EMPTY)];
        }
        self.paying_periods()
            .map(|(period, payment)| (period.period, payment.posting))
            .collect()
    }

    pub fn period_summaries(&self) -> Vec<PeriodSummary> {
        if self.empty_response {
            return vec![PeriodSummary::zero(self.span)];
        }
        self.paying_periods()
            .map(|(period, _)| period.summary())
            .collect()
    }

    pub fn total_summary(&self) -> PeriodSummary {
        self.period_summaries()
            .into_iter()
            .fold(PeriodSummary::zero(self.span), |acc, next| PeriodSummary {
                period: self.span,
                to_be_paid: acc.to_be_paid + next.to_be_paid,
                back_payment: acc.back_payment + next.back_payment,
                future_payment: acc.future_payment + next.future_payment,
                total_entitlement: acc.total_entitlement + next.total_entitlement,
                already_paid: acc.already_paid + next.already_paid,
                overpayment: acc.overpayment + next.overpayment,
                reduction_error_account: acc.reduction_error_account
                    + next.reduction_error_account,
            })
    }

    fn positive_by_period<F>(&self, pick: F) -> Vec<(Period, Amount)>
    where
        F: Fn(&PeriodSummary) -> Amount,
    {
        if self.empty_response {
            return Vec::new();
        }
        self.period_summaries()
            .iter()
            .map(|summary| (summary.period, pick(summary)))
            .filter(|(_, amount)| *amount > 0)
            .collect()
    }

    pub fn paid_by_period(&self) -> Vec<(Period, Amount)> {
        self.positive_by_period(|summary| summary.already_paid)
    }

    pub fn overpaid_by_period(&self) -> Vec<(Period, Amount)> {
        self.positive_by_period(|summary| summary.overpayment)
    }

    pub fn to_be_paid_by_period(&self) -> Vec<(Period, Amount)> {
        self.positive_by_period(|summary| summary.to_be_paid)
    }

    /// Gross monthly amount of the simulated lines themselves, for every
    /// period; zero where the response carries no such posting.
    pub fn simulated_by_period(&self) -> Vec<(Period, Amount)> {
        if self.empty_response {
            return Vec::new();
        }
        self.periods
            .iter()
            .map(|period| {
                let amount = period
                    .payment
                    .as_ref()
                    .and_then(|payment| payment.simulated_benefit)
                    .unwrap_or(0);
                (period.period, amount)
            })
            .collect()
    }

    pub fn has_overpayment(&self) -> bool {
        self.total_summary().overpayment > 0
    }

    pub fn has_overpayment_in(&self, window: &Period) -> bool {
        self.overpaid_by_period()
            .iter()
            .any(|(period, amount)| period.overlaps(window) && *amount > 0)
    }

    /// Builds the typed result, classifying each period.
    pub fn to_result(&self) -> Result<SimulationResult, InterpretationError> {
        let periods = if self.empty_response || self.periods.is_empty() {
            vec![SimulationPeriod::NoPayment { period: self.span }]
        } else {
            self.periods
                .iter()
                .map(|period| self.classify(period))
                .collect()
        };
        Ok(SimulationResult::new(
            self.recipient_id.clone(),
            self.computed_at,
            self.net_amount,
            periods,
        )?)
    }

    fn classify(&self, period: &InterpretedPeriod) -> SimulationPeriod {
        let Some(payment) = &period.payment else {
            return SimulationPeriod::NoPayment {
                period: period.period,
            };
        };
        let summary = period.summary();
        if summary.overpayment > 0 {
            SimulationPeriod::Overpayment {
                period: period.period,
                due_date: payment.due_date,
                already_paid: summary.already_paid,
                overpayment: summary.overpayment,
            }
        } else if summary.to_be_paid > 0 {
            SimulationPeriod::ToBePaid {
                period: period.period,
                due_date: payment.due_date,
                amount: summary.to_be_paid,
                already_paid: summary.already_paid,
                back_payment: payment.due_date <= self.computed_at,
                tax: payment
                    .has_tax
                    .then(|| payment.posting.withheld_tax()),
                garnishment: payment.garnishment.clone(),
            }
        } else {
            SimulationPeriod::AlreadyPaid {
                period: period.period,
                due_date: payment.due_date,
                already_paid: summary.already_paid,
                garnishment: payment.garnishment.clone(),
            }
        }
    }
}
