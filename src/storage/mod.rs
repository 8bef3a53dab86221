pub mod json_backend;

use crate::domain::ledger::Ledger;
use crate::errors::StorageResult;

/// Persistence for recipients' ledgers. Implementations must hand back exactly
/// what was saved and reject stored state that no longer validates.
pub trait LedgerRepository: Send + Sync {
    fn load(&self, recipient_id: &str) -> StorageResult<Option<Ledger>>;
    fn save(&self, ledger: &Ledger) -> StorageResult<()>;
    fn list(&self) -> StorageResult<Vec<String>>;
}

pub use json_backend::JsonLedgerRepository;
