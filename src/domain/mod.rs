pub mod common;
pub mod ledger;
pub mod payment_line;
pub mod simulation;
pub mod timeline;

pub use common::{Identifiable, Period, PeriodError};
pub use ledger::{Batch, Ledger, Receipt, ReceiptStatus, SettlementError};
pub use payment_line::{sort_lines, Amount, LineKind, PaymentLine};
pub use simulation::{
    Garnishment, LedgerPosting, PostingClass, RawSimulationResponse, SimulationPeriod,
    SimulationResult,
};
pub use timeline::{Interval, IntervalKind, Timeline};
