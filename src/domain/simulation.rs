//! Simulation model: the raw posting-level answer from the payment system and
//! the typed, period-by-period result derived from it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::common::Period;
use crate::domain::payment_line::Amount;

/// A single posting as delivered by the payment system. A positive amount is
/// a debit, a negative amount a credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPosting {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub account: String,
    pub amount: Amount,
    #[serde(default)]
    pub reversal: bool,
    #[serde(default)]
    pub rate: Amount,
    #[serde(default)]
    pub rate_type: String,
    #[serde(default)]
    pub rate_count: u32,
    #[serde(default)]
    pub class_code: String,
    pub class_type: String,
}

impl RawPosting {
    /// The ordinary monthly benefit posting for the simulated lines, as
    /// opposed to re-postings of earlier payments.
    pub fn is_simulated_benefit(&self) -> bool {
        PostingClass::from_class_type(&self.class_type) == Some(PostingClass::Benefit)
            && self.rate >= 0
            && self.amount == self.rate
            && self.rate_type == "MND"
            && self.rate_count == 1
            && !self.reversal
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPayment {
    pub recipient_id: String,
    pub due_date: NaiveDate,
    pub postings: Vec<RawPosting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSimulationPeriod {
    pub period: Period,
    #[serde(default)]
    pub payment: Option<RawPayment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSimulationResponse {
    pub recipient_id: String,
    pub computed_at: NaiveDate,
    pub net_amount: Amount,
    /// The period the simulation was requested for.
    pub requested_period: Period,
    #[serde(default)]
    pub periods: Vec<RawSimulationPeriod>,
}

impl RawSimulationResponse {
    pub fn posting_count(&self) -> usize {
        self.periods
            .iter()
            .filter_map(|period| period.payment.as_ref())
            .map(|payment| payment.postings.len())
            .sum()
    }
}

/// Accounting classes a posting can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingClass {
    Benefit,
    ErrorAccount,
    CounterPosting,
    Tax,
    Garnishment,
}

impl PostingClass {
    pub fn from_class_type(code: &str) -> Option<Self> {
        match code {
            "YTEL" => Some(PostingClass::Benefit),
            "FEIL" => Some(PostingClass::ErrorAccount),
            "MOTP" => Some(PostingClass::CounterPosting),
            "SKAT" => Some(PostingClass::Tax),
            "TREK" => Some(PostingClass::Garnishment),
            _ => None,
        }
    }
}

/// Debit and credit sums per accounting class for one period. All fields are
/// non-negative magnitudes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPosting {
    pub debit_benefit: Amount,
    pub credit_benefit: Amount,
    pub debit_error: Amount,
    pub credit_error: Amount,
    pub debit_counter: Amount,
    pub credit_counter: Amount,
    pub debit_tax: Amount,
    pub credit_tax: Amount,
}

impl LedgerPosting {
    pub const EMPTY: LedgerPosting = LedgerPosting {
        debit_benefit: 0,
        credit_benefit: 0,
        debit_error: 0,
        credit_error: 0,
        debit_counter: 0,
        credit_counter: 0,
        debit_tax: 0,
        credit_tax: 0,
    };

    pub fn record(&mut self, class: PostingClass, amount: Amount) {
        let magnitude = amount.abs();
        let debit = amount >= 0;
        let slot = match (class, debit) {
            (PostingClass::Benefit, true) => &mut self.debit_benefit,
            (PostingClass::Benefit, false) => &mut self.credit_benefit,
            (PostingClass::ErrorAccount, true) => &mut self.debit_error,
            (PostingClass::ErrorAccount, false) => &mut self.credit_error,
            (PostingClass::CounterPosting, true) => &mut self.debit_counter,
            (PostingClass::CounterPosting, false) => &mut self.credit_counter,
            (PostingClass::Tax, true) => &mut self.debit_tax,
            (PostingClass::Tax, false) => &mut self.credit_tax,
            (PostingClass::Garnishment, _) => return,
        };
        *slot += magnitude;
    }

    pub fn net_benefit(&self) -> Amount {
        self.debit_benefit - self.credit_benefit
    }

    /// Tax withheld, when any tax posting was present.
    pub fn withheld_tax(&self) -> Amount {
        self.credit_tax - self.debit_tax
    }
}

/// Amount withheld from a payment on behalf of a third party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Garnishment {
    pub amount: Amount,
    pub class_code: String,
}

/// One typed period of a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationPeriod {
    /// New money goes out; the recipient may also have been paid before.
    ToBePaid {
        period: Period,
        due_date: NaiveDate,
        amount: Amount,
        already_paid: Amount,
        back_payment: bool,
        tax: Option<Amount>,
        garnishment: Option<Garnishment>,
    },
    /// Paid before, nothing further moves.
    AlreadyPaid {
        period: Period,
        due_date: NaiveDate,
        already_paid: Amount,
        garnishment: Option<Garnishment>,
    },
    NoPayment {
        period: Period,
    },
    /// More was paid than the recipient is entitled to.
    Overpayment {
        period: Period,
        due_date: NaiveDate,
        already_paid: Amount,
        overpayment: Amount,
    },
}

impl SimulationPeriod {
    pub fn period(&self) -> &Period {
        match self {
            SimulationPeriod::ToBePaid { period, .. }
            | SimulationPeriod::AlreadyPaid { period, .. }
            | SimulationPeriod::NoPayment { period }
            | SimulationPeriod::Overpayment { period, .. } => period,
        }
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        match self {
            SimulationPeriod::ToBePaid { due_date, .. }
            | SimulationPeriod::AlreadyPaid { due_date, .. }
            | SimulationPeriod::Overpayment { due_date, .. } => Some(*due_date),
            SimulationPeriod::NoPayment { .. } => None,
        }
    }

    pub fn to_be_paid(&self) -> Amount {
        match self {
            SimulationPeriod::ToBePaid { amount, .. } => *amount,
            _ => 0,
        }
    }

    pub fn already_paid(&self) -> Amount {
        match self {
            SimulationPeriod::ToBePaid { already_paid, .. }
            | SimulationPeriod::AlreadyPaid { already_paid, .. }
            | SimulationPeriod::Overpayment { already_paid, .. } => *already_paid,
            SimulationPeriod::NoPayment { .. } => 0,
        }
    }

    pub fn overpayment(&self) -> Amount {
        match self {
            SimulationPeriod::Overpayment { overpayment, .. } => *overpayment,
            _ => 0,
        }
    }

    /// What the recipient is ultimately entitled to for the period.
    pub fn total(&self) -> Amount {
        match self {
            SimulationPeriod::ToBePaid {
                amount,
                already_paid,
                ..
            } => already_paid + amount,
            SimulationPeriod::AlreadyPaid { already_paid, .. } => *already_paid,
            SimulationPeriod::NoPayment { .. } => 0,
            SimulationPeriod::Overpayment {
                already_paid,
                overpayment,
                ..
            } => already_paid - overpayment,
        }
    }

    pub fn back_payment(&self) -> Amount {
        match self {
            SimulationPeriod::ToBePaid {
                amount,
                back_payment: true,
                ..
            } => *amount,
            _ => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SimulationPeriod::ToBePaid { .. } => "to_be_paid",
            SimulationPeriod::AlreadyPaid { .. } => "already_paid",
            SimulationPeriod::NoPayment { .. } => "no_payment",
            SimulationPeriod::Overpayment { .. } => "overpayment",
        }
    }

    fn validate(&self, computed_at: NaiveDate) -> Result<(), SimulationModelError> {
        let period = *self.period();
        if self.already_paid() < 0 {
            return Err(SimulationModelError::NegativeAlreadyPaid { period });
        }
        if self.total() < 0 {
            return Err(SimulationModelError::NegativeTotal { period });
        }
        match self {
            SimulationPeriod::ToBePaid {
                amount,
                due_date,
                back_payment,
                tax,
                ..
            } => {
                if *amount <= 0 {
                    return Err(SimulationModelError::NothingToPay { period });
                }
                if tax.map_or(false, |tax| tax < 0) {
                    return Err(SimulationModelError::NegativeTax { period });
                }
                if *back_payment != (*due_date <= computed_at) {
                    return Err(SimulationModelError::BackPaymentFlag { period });
                }
            }
            SimulationPeriod::Overpayment { overpayment, .. } if *overpayment <= 0 => {
                return Err(SimulationModelError::NoOverpayment { period });
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationModelError {
    #[error("a simulation needs at least one period")]
    NoPeriods,
    #[error("to-be-paid period {period} has nothing to pay")]
    NothingToPay { period: Period },
    #[error("period {period} reports a negative previously paid amount")]
    NegativeAlreadyPaid { period: Period },
    #[error("period {period} has a negative total")]
    NegativeTotal { period: Period },
    #[error("period {period} reports negative tax")]
    NegativeTax { period: Period },
    #[error("overpayment period {period} carries no overpayment")]
    NoOverpayment { period: Period },
    #[error("back-payment flag of {period} disagrees with its due date")]
    BackPaymentFlag { period: Period },
}

/// Typed outcome of a simulation for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    recipient_id: String,
    computed_at: NaiveDate,
    net_amount: Amount,
    periods: Vec<SimulationPeriod>,
}

impl SimulationResult {
    pub fn new(
        recipient_id: impl Into<String>,
        computed_at: NaiveDate,
        net_amount: Amount,
        periods: Vec<SimulationPeriod>,
    ) -> Result<Self, SimulationModelError> {
        if periods.is_empty() {
            return Err(SimulationModelError::NoPeriods);
        }
        for period in &periods {
            period.validate(computed_at)?;
        }
        Ok(Self {
            recipient_id: recipient_id.into(),
            computed_at,
            net_amount,
            periods,
        })
    }

    pub fn recipient_id(&self) -> &str {
        &self.recipient_id
    }

    pub fn computed_at(&self) -> NaiveDate {
        self.computed_at
    }

    pub fn net_amount(&self) -> Amount {
        self.net_amount
    }

    pub fn periods(&self) -> &[SimulationPeriod] {
        &self.periods
    }

    pub fn total_to_be_paid(&self) -> Amount {
        self.periods.iter().map(SimulationPeriod::to_be_paid).sum()
    }

    pub fn total_already_paid(&self) -> Amount {
        self.periods.iter().map(SimulationPeriod::already_paid).sum()
    }

    pub fn total_overpayment(&self) -> Amount {
        self.periods.iter().map(SimulationPeriod::overpayment).sum()
    }

    pub fn total_back_payment(&self) -> Amount {
        self.periods.iter().map(SimulationPeriod::back_payment).sum()
    }

    pub fn total_entitlement(&self) -> Amount {
        self.periods.iter().map(SimulationPeriod::total).sum()
    }

    pub fn has_overpayment(&self) -> bool {
        self.total_overpayment() > 0
    }

    pub fn only_empty_periods(&self) -> bool {
        self.periods
            .iter()
            .all(|period| matches!(period, SimulationPeriod::NoPayment { .. }))
    }

    /// Earliest to latest simulated date.
    pub fn span(&self) -> Option<Period> {
        let from = self.periods.iter().map(|p| p.period().from()).min()?;
        let to = self.periods.iter().map(|p| p.period().to()).max()?;
        Period::new(from, to).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ledger_posting_splits_debit_and_credit() {
        let mut posting = LedgerPosting::default();
        posting.record(PostingClass::Benefit, 5000);
        posting.record(PostingClass::Benefit, -8000);
        posting.record(PostingClass::ErrorAccount, 3000);
        posting.record(PostingClass::CounterPosting, -3000);
        posting.record(PostingClass::Tax, -1200);
        assert_eq!(posting.debit_benefit, 5000);
        assert_eq!(posting.credit_benefit, 8000);
        assert_eq!(posting.net_benefit(), -3000);
        assert_eq!(posting.debit_error, 3000);
        assert_eq!(posting.credit_counter, 3000);
        assert_eq!(posting.withheld_tax(), 1200);
    }

    #[test]
    fn result_requires_back_payment_flag_to_match_due_date() {
        let period = Period::month(2024, 1).unwrap();
        let late = SimulationPeriod::ToBePaid {
            period,
            due_date: date(2024, 1, 20),
            amount: 1000,
            already_paid: 0,
            back_payment: false,
            tax: None,
            garnishment: None,
        };
        let err = SimulationResult::new("r", date(2024, 2, 1), 1000, vec![late]).unwrap_err();
        assert_eq!(err, SimulationModelError::BackPaymentFlag { period });
    }

    #[test]
    fn overpayment_total_is_paid_minus_excess() {
        let period = SimulationPeriod::Overpayment {
            period: Period::month(2024, 3).unwrap(),
            due_date: date(2024, 3, 20),
            already_paid: 10_000,
            overpayment: 4_000,
        };
        assert_eq!(period.total(), 6_000);
        let result = SimulationResult::new("r", date(2024, 4, 1), 0, vec![period]).unwrap();
        assert!(result.has_overpayment());
        assert_eq!(result.total_entitlement(), 6_000);
    }

    #[test]
    fn empty_result_is_rejected() {
        assert_eq!(
            SimulationResult::new("r", date(2024, 1, 1), 0, Vec::new()).unwrap_err(),
            SimulationModelError::NoPeriods
        );
    }

    #[test]
    fn simulated_benefit_requires_monthly_rate() {
        let posting = RawPosting {
            from: date(2024, 1, 1),
            to: date(2024, 1, 31),
            account: String::new(),
            amount: 9000,
            reversal: false,
            rate: 9000,
            rate_type: "MND".into(),
            rate_count: 1,
            class_code: "SUUFORE".into(),
            class_type: "YTEL".into(),
        };
        assert!(posting.is_simulated_benefit());
        let reversal = RawPosting {
            reversal: true,
            ..posting.clone()
        };
        assert!(!reversal.is_simulated_benefit());
    }
}
