use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::chain::{verify_chain, verify_generation};
use crate::domain::payment_line::PaymentLine;
use crate::errors::{IntegrityError, IntegrityResult};

/// Current schema version for serialized ledgers.
pub const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Outcome the payment system reported for a sent batch of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Ok,
    OkWithWarnings,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub status: ReceiptStatus,
    pub received_at: DateTime<Utc>,
}

/// One appended generation: a contiguous run of lines issued together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub first_sequence: u64,
    pub last_sequence: u64,
    pub appended_at: DateTime<Utc>,
    #[serde(default)]
    pub receipt: Option<Receipt>,
}

impl Batch {
    pub fn contains(&self, sequence: u64) -> bool {
        (self.first_sequence..=self.last_sequence).contains(&sequence)
    }

    /// Whether the batch counts as paid out under the given receipt policy.
    pub fn is_settled(&self, accept_receipts_with_errors: bool) -> bool {
        match self.receipt.as_ref().map(|receipt| receipt.status) {
            Some(ReceiptStatus::Ok) | Some(ReceiptStatus::OkWithWarnings) => true,
            Some(ReceiptStatus::Error) => accept_receipts_with_errors,
            None => false,
        }
    }
}

/// Why a ledger cannot accept a new generation right now.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("batch {first_sequence}..={last_sequence} has no receipt yet")]
    AwaitingReceipt { first_sequence: u64, last_sequence: u64 },
    #[error("batch {first_sequence}..={last_sequence} was rejected by the payment system")]
    Rejected { first_sequence: u64, last_sequence: u64 },
}

/// A recipient's append-only payment history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default = "Ledger::schema_version_default")]
    pub schema_version: u8,
    pub recipient_id: String,
    lines: Vec<PaymentLine>,
    #[serde(default)]
    batches: Vec<Batch>,
}

impl Ledger {
    /// Starts a ledger from its first generation of lines.
    pub fn new(
        recipient_id: impl Into<String>,
        lines: Vec<PaymentLine>,
        appended_at: DateTime<Utc>,
    ) -> IntegrityResult<Self> {
        if lines.is_empty() {
            return Err(IntegrityError::EmptyChain);
        }
        let mut ledger = Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            recipient_id: recipient_id.into(),
            lines: Vec::new(),
            batches: Vec::new(),
        };
        ledger.extend_with_chain(lines, appended_at)?;
        Ok(ledger)
    }

    fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }

    pub fn lines(&self) -> &[PaymentLine] {
        &self.lines
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn last_line(&self) -> Option<&PaymentLine> {
        self.lines.last()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_line().map(PaymentLine::sequence)
    }

    /// Adopts `chain`, which must start with every line already stored,
    /// unchanged. The remainder becomes a new batch.
    pub fn extend_with_chain(
        &mut self,
        chain: Vec<PaymentLine>,
        appended_at: DateTime<Utc>,
    ) -> IntegrityResult<usize> {
        if let Some(sequence) = self
            .lines
            .iter()
            .zip(chain.iter())
            .find(|(stored, given)| stored != given)
            .map(|(stored, _)| stored.sequence())
        {
            return Err(IntegrityError::HistoryRewritten { sequence });
        }
        if chain.len() < self.lines.len() {
            let sequence = self.lines[chain.len()].sequence();
            return Err(IntegrityError::HistoryRewritten { sequence });
        }
        let generation = &chain[self.lines.len()..];
        let (Some(first), Some(last)) = (generation.first(), generation.last()) else {
            return Ok(0);
        };
        verify_generation(generation)?;
        verify_chain(&chain)?;

        let batch = Batch {
            first_sequence: first.sequence(),
            last_sequence: last.sequence(),
            appended_at,
            receipt: None,
        };
        let appended = generation.len();
        self.lines = chain;
        self.batches.push(batch);
        Ok(appended)
    }

    /// Records the payment system's receipt for the batch holding `sequence`.
    pub fn record_receipt(&mut self, sequence: u64, receipt: Receipt) -> Option<&Batch> {
        let batch = self.batches.iter_mut().find(|batch| batch.contains(sequence))?;
        batch.receipt = Some(receipt);
        Some(&*batch)
    }

    /// Fails when an earlier batch is still in flight, or was rejected and
    /// the policy does not accept receipts with errors.
    pub fn ensure_settled(&self, accept_receipts_with_errors: bool) -> Result<(), SettlementError> {
        for batch in &self.batches {
            match batch.receipt.as_ref().map(|receipt| receipt.status) {
                None => {
                    return Err(SettlementError::AwaitingReceipt {
                        first_sequence: batch.first_sequence,
                        last_sequence: batch.last_sequence,
                    })
                }
                Some(ReceiptStatus::Error) if !accept_receipts_with_errors => {
                    return Err(SettlementError::Rejected {
                        first_sequence: batch.first_sequence,
                        last_sequence: batch.last_sequence,
                    })
                }
                Some(ReceiptStatus::Error) => warn!(
                    recipient = %self.recipient_id,
                    first_sequence = batch.first_sequence,
                    "accepting batch whose receipt reported errors"
                ),
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Lines belonging to batches settled under the given receipt policy.
    pub fn settled_chain(&self, accept_receipts_with_errors: bool) -> Vec<PaymentLine> {
        self.lines
            .iter()
            .filter(|line| {
                self.batches
                    .iter()
                    .find(|batch| batch.contains(line.sequence()))
                    .map_or(false, |batch| batch.is_settled(accept_receipts_with_errors))
            })
            .cloned()
            .collect()
    }

    /// Re-checks every stored invariant; run after loading from storage.
    pub fn validate(&self) -> IntegrityResult<()> {
        verify_chain(&self.lines)?;
        for batch in &self.batches {
            let generation: Vec<PaymentLine> = self
                .lines
                .iter()
                .filter(|line| batch.contains(line.sequence()))
                .cloned()
                .collect();
            verify_generation(&generation)?;
        }
        Ok(())
    }
}
