use tracing::{info, warn};

use crate::config::Config;
use crate::core::reconcile::reconcile;
use crate::core::time::{Clock, MonotonicSequence, SequenceGenerator};
use crate::core::timeline::project;
use crate::domain::ledger::{Batch, Ledger, Receipt};
use crate::domain::payment_line::PaymentLine;
use crate::domain::timeline::Timeline;
use crate::storage::LedgerRepository;

use super::{ServiceError, ServiceResult};

pub struct LedgerService;

impl LedgerService {
    /// Reconciles `tail` into the recipient's stored history and persists the
    /// result. Nothing is saved unless every check passes.
    pub fn reconcile(
        repo: &dyn LedgerRepository,
        recipient_id: &str,
        tail: Vec<PaymentLine>,
        clock: &dyn Clock,
        sequence: &mut dyn SequenceGenerator,
        config: &Config,
    ) -> ServiceResult<Vec<PaymentLine>> {
        let stored = repo.load(recipient_id)?;
        if let Some(ledger) = &stored {
            ledger.ensure_settled(config.accept_receipts_with_errors)?;
        }
        let existing = stored.as_ref().map_or(&[][..], Ledger::lines);
        let chain = reconcile(existing, tail, clock, sequence)?;

        let appended_at = clock.now();
        let ledger = match stored {
            Some(mut ledger) => {
                ledger.extend_with_chain(chain.clone(), appended_at)?;
                ledger
            }
            None => Ledger::new(recipient_id, chain.clone(), appended_at)?,
        };
        repo.save(&ledger)?;
        info!(
            recipient = %recipient_id,
            lines = chain.len(),
            batches = ledger.batches().len(),
            "persisted reconciled ledger"
        );
        Ok(chain)
    }

    /// Sequence generator continuing after the recipient's last stored line.
    pub fn sequence_for(
        repo: &dyn LedgerRepository,
        recipient_id: &str,
    ) -> ServiceResult<MonotonicSequence> {
        let last = repo
            .load(recipient_id)?
            .and_then(|ledger| ledger.last_sequence());
        Ok(MonotonicSequence::after(last))
    }

    pub fn record_receipt(
        repo: &dyn LedgerRepository,
        recipient_id: &str,
        sequence: u64,
        receipt: Receipt,
    ) -> ServiceResult<Batch> {
        let mut ledger = Self::require(repo, recipient_id)?;
        let batch = ledger
            .record_receipt(sequence, receipt)
            .cloned()
            .ok_or_else(|| {
                warn!(recipient = %recipient_id, sequence, "receipt for unknown batch");
                ServiceError::Invalid(format!("no batch holds sequence {sequence}"))
            })?;
        repo.save(&ledger)?;
        Ok(batch)
    }

    /// Current projected payment timeline for the recipient.
    pub fn timeline(repo: &dyn LedgerRepository, recipient_id: &str) -> ServiceResult<Timeline> {
        let ledger = Self::require(repo, recipient_id)?;
        Ok(project(ledger.lines())?)
    }

    fn require(repo: &dyn LedgerRepository, recipient_id: &str) -> ServiceResult<Ledger> {
        repo.load(recipient_id)?
            .ok_or_else(|| ServiceError::Invalid(format!("no ledger for recipient {recipient_id}")))
    }
}
