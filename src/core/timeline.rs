//! Projection of a payment chain onto a non-overlapping timeline.

use tracing::{debug, error};

use crate::domain::common::{Identifiable, Period};
use crate::domain::payment_line::{sort_lines, LineKind, PaymentLine};
use crate::domain::timeline::{Interval, IntervalKind, Timeline};
use crate::errors::{IntegrityError, IntegrityResult};

/// Projects `chain` onto the timeline of amounts in force.
///
/// Later revisions win: lines are visited newest first and each claims the
/// part of its nominal period no later revision has claimed. A reactivation
/// restores the amount of the most recent earlier `New` line covering each
/// of its days.
pub fn project(chain: &[PaymentLine]) -> IntegrityResult<Timeline> {
    let mut ordered = chain.to_vec();
    sort_lines(&mut ordered)?;

    let mut claimed: Vec<Period> = Vec::new();
    let mut intervals: Vec<Interval> = Vec::new();

    for (idx, line) in ordered.iter().enumerate().rev() {
        let free = line.nominal_period().minus(&claimed);
        if free.is_empty() {
            continue;
        }
        match line.kind() {
            LineKind::New => {
                emit(&mut intervals, &free, line, line.amount(), IntervalKind::Paying)
            }
            LineKind::Terminate { .. } => {
                emit(&mut intervals, &free, line, 0, IntervalKind::Terminated)
            }
            LineKind::Suspend { .. } => {
                emit(&mut intervals, &free, line, 0, IntervalKind::Suspended)
            }
            LineKind::Reactivate { .. } => {
                reactivate(&mut intervals, &free, line, &ordered[..idx])?
            }
        }
        claimed.extend(free);
    }

    intervals.sort_by_key(|interval| interval.period.from());
    for pair in intervals.windows(2) {
        if pair[0].period.to() >= pair[1].period.from() {
            let err = IntegrityError::OverlappingTimeline {
                first: pair[0].period,
                second: pair[1].period,
            };
            error!(%err, "projected timeline is inconsistent");
            return Err(err);
        }
    }
    debug!(lines = chain.len(), intervals = intervals.len(), "projected payment timeline");
    Ok(Timeline::from_sorted(intervals))
}

fn emit(
    intervals: &mut Vec<Interval>,
    free: &[Period],
    line: &PaymentLine,
    amount: i64,
    kind: IntervalKind,
) {
    intervals.extend(free.iter().map(|period| Interval {
        period: *period,
        amount,
        source_line_id: line.id(),
        kind,
    }));
}

fn reactivate(
    intervals: &mut Vec<Interval>,
    free: &[Period],
    line: &PaymentLine,
    earlier: &[PaymentLine],
) -> IntegrityResult<()> {
    let mut restored: Vec<Period> = Vec::new();
    for underlying in earlier.iter().rev().filter(|candidate| candidate.is_new()) {
        for period in free {
            let Some(overlap) = period.intersection(underlying.valid()) else {
                continue;
            };
            let uncovered = overlap.minus(&restored);
            emit(
                intervals,
                &uncovered,
                underlying,
                underlying.amount(),
                IntervalKind::Reactivated,
            );
            restored.extend(uncovered);
        }
    }
    for period in free {
        if let Some(gap) = period.minus(&restored).into_iter().next() {
            let err = IntegrityError::ReactivationWithoutLine {
                sequence: line.sequence(),
                period: gap,
            };
            error!(%err, "reactivation cannot be projected");
            return Err(err);
        }
    }
    Ok(())
}
