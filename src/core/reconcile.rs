//! History reconciliation: appends a freshly decided tail of payment lines and
//! re-issues the still-effective history after it, proving the re-issued
//! lines change nothing economically.

use std::collections::HashMap;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::chain::{verify_chain, verify_generation, ChainBuilder};
use crate::core::time::{Clock, SequenceGenerator};
use crate::core::timeline::project;
use crate::domain::common::{Identifiable, Period};
use crate::domain::payment_line::{LineKind, PaymentLine};
use crate::domain::timeline::{Interval, IntervalKind};
use crate::errors::{IntegrityError, ReconciliationError};

pub type ReconcileResult<T> = Result<T, ReconciliationError>;

/// Combines `existing` with `tail` into the next-generation chain.
///
/// The returned chain starts with `existing` untouched, followed by the tail
/// and then every re-issued line, all wired through a [`ChainBuilder`]
/// anchored on the last existing line. Re-issued `New` lines get an id
/// derived from the original id and their new sequence, so a re-run with the
/// same clock and sequence seed yields identical output.
pub fn reconcile(
    existing: &[PaymentLine],
    tail: Vec<PaymentLine>,
    clock: &dyn Clock,
    sequence: &mut dyn SequenceGenerator,
) -> ReconcileResult<Vec<PaymentLine>> {
    let cutoff = tail
        .iter()
        .map(|line| line.valid().to())
        .max()
        .ok_or(ReconciliationError::EmptyTail)?;
    verify_chain(existing)?;

    let mut builder = ChainBuilder::after(existing.last());
    builder.extend(tail)?;
    let tail_len = builder.len();

    let regenerated = match cutoff.succ_opt() {
        Some(floor) => regenerate(existing, floor, clock, sequence, &mut builder)?,
        None => 0,
    };

    let generation = builder.into_lines();
    verify_generation(&generation)?;

    let mut chain = Vec::with_capacity(existing.len() + generation.len());
    chain.extend_from_slice(existing);
    chain.extend(generation);
    verify_chain(&chain)?;

    info!(
        tail = tail_len,
        regenerated,
        %cutoff,
        "reconciled payment history"
    );
    Ok(chain)
}

/// Re-issues the history still in force on or after `floor`, then checks the
/// re-issued lines project to the same amounts.
///
/// The projected timeline past the cut-off is split into segments: maximal
/// runs of adjacent intervals owed to the same `New` line. Each segment
/// becomes one re-issued `New` line over exactly that span, followed by one
/// amendment per suspended, terminated or reactivated interval inside it.
/// Segments never overlap, so the re-issued lines cannot shadow each other.
fn regenerate(
    existing: &[PaymentLine],
    floor: chrono::NaiveDate,
    clock: &dyn Clock,
    sequence: &mut dyn SequenceGenerator,
    builder: &mut ChainBuilder,
) -> ReconcileResult<usize> {
    let Some(horizon) = existing.iter().map(|line| line.valid().to()).max() else {
        return Ok(0);
    };
    let Ok(window) = Period::new(floor, horizon) else {
        debug!(%floor, %horizon, "no existing history past the cut-off");
        return Ok(0);
    };

    let original = project(existing)?.restrict(&window);
    let issued: HashMap<Uuid, &PaymentLine> = existing
        .iter()
        .filter(|line| line.is_new())
        .map(|line| (line.id(), line))
        .collect();

    let start = builder.len();
    for segment in segments(original.intervals()) {
        let Some(source) = issued.get(&segment.source_line_id) else {
            continue;
        };
        let next = sequence.next();
        let id = Uuid::new_v5(&source.id(), &next.to_be_bytes());
        let fresh = source.reissued(id, clock.now(), next, segment.period)?;
        let piece = builder.push(fresh)?.clone();
        debug!(
            source = %source.id(),
            period = %segment.period,
            amendments = segment.amendments.len(),
            "re-issuing segment"
        );

        for (kind, effective) in segment.amendments {
            let kind = match kind {
                IntervalKind::Suspended => LineKind::Suspend { effective },
                IntervalKind::Terminated => LineKind::Terminate { effective },
                IntervalKind::Reactivated => LineKind::Reactivate { effective },
                IntervalKind::Paying => continue,
            };
            let amendment = PaymentLine::amendment(&piece, kind, clock.now(), sequence.next())?;
            builder.push(amendment)?;
        }
    }

    let replay = project(&builder.lines()[start..])?.restrict(&window);
    if let Some(detail) = original.first_difference(&replay) {
        let err = IntegrityError::EquivalenceMismatch { window, detail };
        error!(%err, "regenerated history is not equivalent");
        return Err(err.into());
    }
    Ok(builder.len() - start)
}

/// A span of the timeline owed to a single `New` line.
struct Segment {
    source_line_id: Uuid,
    period: Period,
    amendments: Vec<(IntervalKind, Period)>,
}

fn segments(intervals: &[Interval]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for interval in intervals {
        match segments.last_mut() {
            Some(last)
                if last.source_line_id == interval.source_line_id
                    && last.period.is_followed_by(&interval.period) =>
            {
                if let Ok(period) = Period::new(last.period.from(), interval.period.to()) {
                    last.period = period;
                }
                push_amendment(&mut last.amendments, interval);
            }
            _ => {
                let mut segment = Segment {
                    source_line_id: interval.source_line_id,
                    period: interval.period,
                    amendments: Vec::new(),
                };
                push_amendment(&mut segment.amendments, interval);
                segments.push(segment);
            }
        }
    }
    segments
}

fn push_amendment(amendments: &mut Vec<(IntervalKind, Period)>, interval: &Interval) {
    if interval.kind == IntervalKind::Paying {
        return;
    }
    if let Some((kind, period)) = amendments.last_mut() {
        if *kind == interval.kind && period.is_followed_by(&interval.period) {
            if let Ok(merged) = Period::new(period.from(), interval.period.to()) {
                *period = merged;
                return;
            }
        }
    }
    amendments.push((interval.kind, interval.period));
}
