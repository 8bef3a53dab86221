//! Payment-line revisions: the atomic, immutable records of a recipient's
//! disbursement history.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::{Identifiable, Period};
use crate::errors::{IntegrityError, PaymentLineError};

/// Monthly amount in whole currency units.
pub type Amount = i64;

/// What a revision does to the line it belongs to.
///
/// Amendments carry their own effective period, distinct from the period the
/// amended line was originally issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineKind {
    New,
    Terminate { effective: Period },
    Suspend { effective: Period },
    Reactivate { effective: Period },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLine {
    id: Uuid,
    created_at: DateTime<Utc>,
    sequence: u64,
    valid: Period,
    previous_line_id: Option<Uuid>,
    amount: Amount,
    #[serde(flatten)]
    kind: LineKind,
}

impl PaymentLine {
    /// Creates a `New` line introducing a fresh paying interval.
    pub fn new(
        id: Uuid,
        created_at: DateTime<Utc>,
        sequence: u64,
        valid: Period,
        previous_line_id: Option<Uuid>,
        amount: Amount,
    ) -> Result<Self, PaymentLineError> {
        ensure_not_self_referencing(id, previous_line_id)?;
        Ok(Self {
            id,
            created_at,
            sequence,
            valid,
            previous_line_id,
            amount,
            kind: LineKind::New,
        })
    }

    /// Ends payment of `amended` from `from` through the end of its period.
    pub fn terminate(
        amended: &PaymentLine,
        from: NaiveDate,
        created_at: DateTime<Utc>,
        sequence: u64,
    ) -> Result<Self, PaymentLineError> {
        let effective = amended
            .valid
            .starting_from(from)
            .filter(|_| amended.valid.contains(from))
            .ok_or(PaymentLineError::TerminationOutsideAmended {
                from,
                valid: amended.valid,
            })?;
        Self::amendment(amended, LineKind::Terminate { effective }, created_at, sequence)
    }

    pub fn suspend(
        amended: &PaymentLine,
        effective: Period,
        created_at: DateTime<Utc>,
        sequence: u64,
    ) -> Result<Self, PaymentLineError> {
        Self::amendment(amended, LineKind::Suspend { effective }, created_at, sequence)
    }

    pub fn reactivate(
        amended: &PaymentLine,
        effective: Period,
        created_at: DateTime<Utc>,
        sequence: u64,
    ) -> Result<Self, PaymentLineError> {
        Self::amendment(amended, LineKind::Reactivate { effective }, created_at, sequence)
    }

    /// Amendments inherit the logical identity, period and amount of the line
    /// they amend.
    pub(crate) fn amendment(
        amended: &PaymentLine,
        kind: LineKind,
        created_at: DateTime<Utc>,
        sequence: u64,
    ) -> Result<Self, PaymentLineError> {
        let line = Self {
            id: amended.id,
            created_at,
            sequence,
            valid: amended.valid,
            previous_line_id: amended.previous_line_id,
            amount: amended.amount,
            kind,
        };
        line.validate()?;
        Ok(line)
    }

    /// Re-checks the construction rules; used after deserialization.
    pub fn validate(&self) -> Result<(), PaymentLineError> {
        ensure_not_self_referencing(self.id, self.previous_line_id)?;
        if let Some(effective) = self.effective_period() {
            if !self.valid.covers(effective) {
                return Err(PaymentLineError::EffectiveOutsideAmended {
                    effective: *effective,
                    valid: self.valid,
                });
            }
        }
        Ok(())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The period the revision was originally issued for.
    pub fn valid(&self) -> &Period {
        &self.valid
    }

    pub fn previous_line_id(&self) -> Option<Uuid> {
        self.previous_line_id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn kind(&self) -> &LineKind {
        &self.kind
    }

    pub fn is_new(&self) -> bool {
        matches!(self.kind, LineKind::New)
    }

    pub fn effective_period(&self) -> Option<&Period> {
        match &self.kind {
            LineKind::New => None,
            LineKind::Terminate { effective }
            | LineKind::Suspend { effective }
            | LineKind::Reactivate { effective } => Some(effective),
        }
    }

    /// The span this revision has an effect on.
    pub fn nominal_period(&self) -> &Period {
        self.effective_period().unwrap_or(&self.valid)
    }

    /// Points a `New` line at its predecessor. Amendments keep the reference
    /// of the line they amend.
    pub(crate) fn chained_after(mut self, previous: Option<Uuid>) -> Result<Self, PaymentLineError> {
        if self.is_new() {
            ensure_not_self_referencing(self.id, previous)?;
            self.previous_line_id = previous;
        }
        Ok(self)
    }

    /// Re-issues a `New` line under a fresh identity over `valid`.
    pub(crate) fn reissued(
        &self,
        id: Uuid,
        created_at: DateTime<Utc>,
        sequence: u64,
        valid: Period,
    ) -> Result<Self, PaymentLineError> {
        Self::new(id, created_at, sequence, valid, None, self.amount)
    }

    /// Orders by sequence and verifies creation time agrees with it.
    pub fn cmp_checked(&self, other: &PaymentLine) -> Result<Ordering, IntegrityError> {
        let (earlier, later) = match self.sequence.cmp(&other.sequence) {
            Ordering::Less => (self, other),
            Ordering::Greater => (other, self),
            Ordering::Equal if self == other => return Ok(Ordering::Equal),
            Ordering::Equal => {
                return Err(IntegrityError::SequenceNotIncreasing {
                    previous: self.sequence,
                    sequence: other.sequence,
                })
            }
        };
        if later.created_at < earlier.created_at {
            return Err(IntegrityError::CreatedAtOutOfOrder {
                previous: earlier.sequence,
                previous_created_at: earlier.created_at,
                sequence: later.sequence,
                created_at: later.created_at,
            });
        }
        Ok(self.sequence.cmp(&other.sequence))
    }
}

impl Identifiable for PaymentLine {
    fn id(&self) -> Uuid {
        self.id
    }
}

fn ensure_not_self_referencing(id: Uuid, previous: Option<Uuid>) -> Result<(), PaymentLineError> {
    if previous == Some(id) {
        return Err(PaymentLineError::SelfReference { id });
    }
    Ok(())
}

/// Sorts a chain by sequence, failing on duplicated sequences or creation
/// times that disagree with the sequence order.
pub fn sort_lines(lines: &mut [PaymentLine]) -> Result<(), IntegrityError> {
    lines.sort_by_key(PaymentLine::sequence);
    for pair in lines.windows(2) {
        if pair[0].sequence == pair[1].sequence {
            return Err(IntegrityError::SequenceNotIncreasing {
                previous: pair[0].sequence,
                sequence: pair[1].sequence,
            });
        }
        pair[0].cmp_checked(&pair[1])?;
    }
    Ok(())
}
