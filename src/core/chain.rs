//! Append-only chain assembly and chain-wide invariant checks.

use std::collections::HashMap;

use tracing::error;
use uuid::Uuid;

use crate::domain::common::Identifiable;
use crate::domain::payment_line::PaymentLine;
use crate::errors::{IntegrityError, IntegrityResult};

/// Collects lines in issue order and wires every `New` line to the line
/// appended immediately before it.
#[derive(Debug, Clone, Default)]
pub struct ChainBuilder {
    anchor: Option<(Uuid, u64)>,
    lines: Vec<PaymentLine>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues an existing chain whose last line is `last`.
    pub fn after(last: Option<&PaymentLine>) -> Self {
        Self {
            anchor: last.map(|line| (line.id(), line.sequence())),
            lines: Vec::new(),
        }
    }

    /// Identity the next `New` line will point back to.
    pub fn last_id(&self) -> Option<Uuid> {
        self.lines
            .last()
            .map(Identifiable::id)
            .or(self.anchor.map(|(id, _)| id))
    }

    fn last_sequence(&self) -> Option<u64> {
        self.lines
            .last()
            .map(PaymentLine::sequence)
            .or(self.anchor.map(|(_, sequence)| sequence))
    }

    pub fn push(&mut self, line: PaymentLine) -> IntegrityResult<&PaymentLine> {
        if let Some(previous) = self.last_sequence() {
            if line.sequence() <= previous {
                return Err(IntegrityError::SequenceNotIncreasing {
                    previous,
                    sequence: line.sequence(),
                });
            }
        }
        if let Some(last) = self.lines.last() {
            last.cmp_checked(&line)?;
        }
        let line = line.chained_after(self.last_id())?;
        self.lines.push(line);
        Ok(&self.lines[self.lines.len() - 1])
    }

    pub fn extend<I>(&mut self, lines: I) -> IntegrityResult<()>
    where
        I: IntoIterator<Item = PaymentLine>,
    {
        for line in lines {
            self.push(line)?;
        }
        Ok(())
    }

    pub fn lines(&self) -> &[PaymentLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<PaymentLine> {
        self.lines
    }
}

/// Checks the invariants that hold across a whole persisted chain: sorted,
/// strictly increasing sequences with agreeing creation times, no self
/// references, every `New` chained to its predecessor, every amendment
/// targeting a previously issued `New`.
pub fn verify_chain(lines: &[PaymentLine]) -> IntegrityResult<()> {
    for pair in lines.windows(2) {
        if pair[1].sequence() <= pair[0].sequence() {
            return Err(log_violation(IntegrityError::SequenceNotIncreasing {
                previous: pair[0].sequence(),
                sequence: pair[1].sequence(),
            }));
        }
        pair[0].cmp_checked(&pair[1]).map_err(log_violation)?;
    }

    let mut issued: HashMap<Uuid, Option<Uuid>> = HashMap::new();
    let mut previous: Option<&PaymentLine> = None;
    for line in lines {
        line.validate()
            .map_err(|err| log_violation(IntegrityError::Line(err)))?;
        if line.is_new() {
            if let Some(prev) = previous {
                if line.previous_line_id() != Some(prev.id()) {
                    return Err(log_violation(IntegrityError::BrokenBackReference {
                        sequence: line.sequence(),
                        expected: Some(prev.id()),
                        actual: line.previous_line_id(),
                    }));
                }
            }
            if issued.insert(line.id(), line.previous_line_id()).is_some() {
                return Err(log_violation(IntegrityError::DuplicateNewLine { id: line.id() }));
            }
        } else {
            match issued.get(&line.id()) {
                None => {
                    return Err(log_violation(IntegrityError::UnknownAmendedLine {
                        sequence: line.sequence(),
                        id: line.id(),
                    }))
                }
                Some(expected) if *expected != line.previous_line_id() => {
                    return Err(log_violation(IntegrityError::BrokenBackReference {
                        sequence: line.sequence(),
                        expected: *expected,
                        actual: line.previous_line_id(),
                    }))
                }
                Some(_) => {}
            }
        }
        previous = Some(line);
    }
    Ok(())
}

/// Checks the invariants scoped to one appended generation of lines: `New`
/// lines never overlap, and lines sharing a back-reference share an id (and
/// vice versa).
pub fn verify_generation(lines: &[PaymentLine]) -> IntegrityResult<()> {
    let new_lines: Vec<&PaymentLine> = lines.iter().filter(|line| line.is_new()).collect();
    for (idx, first) in new_lines.iter().enumerate() {
        for second in &new_lines[idx + 1..] {
            if first.valid().overlaps(second.valid()) {
                return Err(log_violation(IntegrityError::OverlappingNewLines {
                    first: first.sequence(),
                    second: second.sequence(),
                }));
            }
        }
    }

    let mut by_previous: HashMap<Option<Uuid>, Uuid> = HashMap::new();
    let mut by_id: HashMap<Uuid, Option<Uuid>> = HashMap::new();
    for line in lines {
        let known_id = *by_previous
            .entry(line.previous_line_id())
            .or_insert(line.id());
        if known_id != line.id() {
            return Err(log_violation(IntegrityError::InconsistentIdentity {
                previous: line.previous_line_id(),
                first: known_id,
                second: line.id(),
            }));
        }
        let known_previous = *by_id.entry(line.id()).or_insert(line.previous_line_id());
        if known_previous != line.previous_line_id() {
            return Err(log_violation(IntegrityError::BrokenBackReference {
                sequence: line.sequence(),
                expected: known_previous,
                actual: line.previous_line_id(),
            }));
        }
    }
    Ok(())
}

fn log_violation(err: IntegrityError) -> IntegrityError {
    error!(%err, "payment chain integrity violation");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::common::Period;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap()
    }

    fn new_line(sequence: u64, month: u32, amount: i64) -> PaymentLine {
        PaymentLine::new(
            Uuid::new_v4(),
            at(sequence as u32),
            sequence,
            Period::month(2024, month).unwrap(),
            None,
            amount,
        )
        .expect("new line")
    }

    #[test]
    fn push_wires_new_lines_to_predecessor() {
        let mut builder = ChainBuilder::new();
        builder
            .extend([new_line(1, 1, 100), new_line(2, 2, 100), new_line(3, 3, 100)])
            .expect("chain");
        let lines = builder.lines();
        assert_eq!(lines[0].previous_line_id(), None);
        assert_eq!(lines[1].previous_line_id(), Some(lines[0].id()));
        assert_eq!(lines[2].previous_line_id(), Some(lines[1].id()));
        verify_chain(lines).expect("valid chain");
        verify_generation(lines).expect("valid generation");
    }

    #[test]
    fn push_continues_from_anchor() {
        let anchor = new_line(1, 1, 100);
        let mut builder = ChainBuilder::after(Some(&anchor));
        let appended = builder.push(new_line(2, 2, 100)).expect("push");
        assert_eq!(appended.previous_line_id(), Some(anchor.id()));
    }

    #[test]
    fn push_rejects_non_increasing_sequence() {
        let mut builder = ChainBuilder::new();
        builder.push(new_line(2, 1, 100)).expect("first");
        let err = builder.push(new_line(2, 2, 100)).unwrap_err();
        assert!(matches!(err, IntegrityError::SequenceNotIncreasing { .. }));
    }

    #[test]
    fn amendments_keep_identity_of_amended_line() {
        let mut builder = ChainBuilder::new();
        let first = builder.push(new_line(1, 1, 100)).expect("first").clone();
        let second = builder.push(new_line(2, 2, 100)).expect("second").clone();
        let suspend = PaymentLine::suspend(&first, *first.valid(), at(3), 3).expect("suspend");
        let pushed = builder.push(suspend).expect("suspend pushed").clone();
        assert_eq!(pushed.id(), first.id());
        assert_eq!(pushed.previous_line_id(), None);
        assert_ne!(pushed.previous_line_id(), Some(second.id()));
        verify_chain(builder.lines()).expect("valid chain");
    }

    #[test]
    fn verify_chain_detects_amendment_of_unknown_line() {
        let stray = new_line(1, 1, 100);
        let amendment = PaymentLine::suspend(&stray, *stray.valid(), at(2), 2).unwrap();
        let err = verify_chain(&[new_line(0, 2, 100), amendment]).unwrap_err();
        assert!(matches!(err, IntegrityError::UnknownAmendedLine { .. }));
    }

    #[test]
    fn verify_chain_detects_broken_back_reference() {
        let first = new_line(1, 1, 100);
        let second = new_line(2, 2, 100);
        let err = verify_chain(&[first, second]).unwrap_err();
        assert!(matches!(err, IntegrityError::BrokenBackReference { sequence: 2, .. }));
    }

    #[test]
    fn verify_generation_detects_overlapping_new_lines() {
        let mut builder = ChainBuilder::new();
        builder
            .extend([new_line(1, 3, 100), new_line(2, 3, 200)])
            .expect("chain");
        let err = verify_generation(builder.lines()).unwrap_err();
        assert_eq!(err, IntegrityError::OverlappingNewLines { first: 1, second: 2 });
    }
}
