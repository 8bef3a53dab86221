use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Period;
use crate::domain::payment_line::Amount;

/// Why an interval carries the amount it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    Paying,
    Terminated,
    Suspended,
    Reactivated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub period: Period,
    pub amount: Amount,
    pub source_line_id: Uuid,
    pub kind: IntervalKind,
}

impl Interval {
    fn continues_into(&self, next: &Interval) -> bool {
        self.amount == next.amount && self.kind == next.kind && self.period.is_followed_by(&next.period)
    }
}

/// Sorted, non-overlapping intervals derived from a payment chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    intervals: Vec<Interval>,
}

impl Timeline {
    /// Callers guarantee `intervals` is sorted and non-overlapping; the
    /// projector is the only producer.
    pub(crate) fn from_sorted(intervals: Vec<Interval>) -> Self {
        Self { intervals }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Clamps every interval to `window`, dropping those outside it.
    pub fn restrict(&self, window: &Period) -> Timeline {
        let intervals = self
            .intervals
            .iter()
            .filter_map(|interval| {
                interval.period.intersection(window).map(|period| Interval {
                    period,
                    ..interval.clone()
                })
            })
            .collect();
        Timeline { intervals }
    }

    /// Merges adjacent intervals that carry the same amount and kind.
    pub fn coalesce(&self) -> Timeline {
        let mut merged: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        for interval in &self.intervals {
            match merged.last_mut() {
                Some(last) if last.continues_into(interval) => {
                    if let Ok(period) = Period::new(last.period.from(), interval.period.to()) {
                        last.period = period;
                    }
                }
                _ => merged.push(interval.clone()),
            }
        }
        Timeline { intervals: merged }
    }

    /// Same amount in force on every day, with the same uncovered gaps.
    /// Interval kinds and source line identities are ignored, so a
    /// reactivated stretch matches a paying one of equal amount.
    pub fn equivalent(&self, other: &Timeline) -> bool {
        self.first_difference(other).is_none()
    }

    /// Describes the first point where the two timelines pay differently.
    pub fn first_difference(&self, other: &Timeline) -> Option<String> {
        let left = self.amount_runs();
        let right = other.amount_runs();
        for (idx, ((a_period, a_amount), (b_period, b_amount))) in
            left.iter().zip(right.iter()).enumerate()
        {
            if a_period != b_period || a_amount != b_amount {
                return Some(format!(
                    "run {idx}: {a_period} @{a_amount} vs {b_period} @{b_amount}"
                ));
            }
        }
        if left.len() != right.len() {
            return Some(format!("{} runs vs {} runs", left.len(), right.len()));
        }
        None
    }

    /// Maximal adjacent stretches paying one amount, whatever their kind.
    fn amount_runs(&self) -> Vec<(Period, Amount)> {
        let mut runs: Vec<(Period, Amount)> = Vec::with_capacity(self.intervals.len());
        for interval in &self.intervals {
            if let Some((period, amount)) = runs.last_mut() {
                if *amount == interval.amount && period.is_followed_by(&interval.period) {
                    if let Ok(merged) = Period::new(period.from(), interval.period.to()) {
                        *period = merged;
                        continue;
                    }
                }
            }
            runs.push((interval.period, interval.amount));
        }
        runs
    }

    pub fn interval_on(&self, date: NaiveDate) -> Option<&Interval> {
        self.intervals
            .iter()
            .find(|interval| interval.period.contains(date))
    }

    pub fn amount_on(&self, date: NaiveDate) -> Option<Amount> {
        self.interval_on(date).map(|interval| interval.amount)
    }

    /// Amount in force for a whole period, if a single amount covers all of it.
    pub fn amount_for(&self, period: &Period) -> Option<Amount> {
        let covering = self.restrict(period);
        let first = covering.intervals.first()?;
        let contiguous = covering
            .intervals
            .windows(2)
            .all(|pair| pair[0].period.is_followed_by(&pair[1].period));
        let uniform = covering.intervals.iter().all(|i| i.amount == first.amount);
        let spans = first.period.from() == period.from()
            && covering
                .intervals
                .last()
                .map_or(false, |last| last.period.to() == period.to());
        (contiguous && uniform && spans).then_some(first.amount)
    }

    /// Earliest and latest covered dates.
    pub fn span(&self) -> Option<Period> {
        let first = self.intervals.first()?;
        let last = self.intervals.last()?;
        Period::new(first.period.from(), last.period.to()).ok()
    }
}
