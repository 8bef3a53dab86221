use std::fmt;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::errors::PeriodError;

/// Identifies entities that expose a stable unique identifier.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Inclusive calendar period `from..=to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PeriodRepr", into = "PeriodRepr")]
pub struct Period {
    from: NaiveDate,
    to: NaiveDate,
}

#[derive(Serialize, Deserialize)]
struct PeriodRepr {
    from: NaiveDate,
    to: NaiveDate,
}

impl TryFrom<PeriodRepr> for Period {
    type Error = PeriodError;

    fn try_from(repr: PeriodRepr) -> Result<Self, Self::Error> {
        Period::new(repr.from, repr.to)
    }
}

impl From<Period> for PeriodRepr {
    fn from(period: Period) -> Self {
        PeriodRepr {
            from: period.from,
            to: period.to,
        }
    }
}

impl Period {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, PeriodError> {
        if to < from {
            return Err(PeriodError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// The calendar month `year-month`.
    pub fn month(year: i32, month: u32) -> Result<Self, PeriodError> {
        let from = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(PeriodError::InvalidMonth { year, month })?;
        let to = from
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or(PeriodError::InvalidMonth { year, month })?;
        Ok(Self { from, to })
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }

    pub fn covers(&self, other: &Period) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    pub fn intersection(&self, other: &Period) -> Option<Period> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        (from <= to).then_some(Period { from, to })
    }

    /// True when `other` starts the day after `self` ends.
    pub fn is_followed_by(&self, other: &Period) -> bool {
        self.to.succ_opt() == Some(other.from)
    }

    /// Drops the days before `date`, or `None` when nothing remains.
    pub fn starting_from(&self, date: NaiveDate) -> Option<Period> {
        let from = self.from.max(date);
        (from <= self.to).then_some(Period { from, to: self.to })
    }

    /// The parts of `self` not covered by any of `others`, in date order.
    pub fn minus(&self, others: &[Period]) -> Vec<Period> {
        let mut blocking: Vec<Period> = others
            .iter()
            .filter_map(|other| self.intersection(other))
            .collect();
        blocking.sort();

        let mut remaining = Vec::new();
        let mut cursor = Some(self.from);
        for block in blocking {
            let Some(start) = cursor else { break };
            if block.from > start {
                if let Some(end) = block.from.pred_opt() {
                    remaining.push(Period { from: start, to: end });
                }
            }
            if block.to >= start {
                cursor = block.to.succ_opt();
            }
        }
        if let Some(start) = cursor {
            if start <= self.to {
                remaining.push(Period {
                    from: start,
                    to: self.to,
                });
            }
        }
        remaining
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}
