pub mod chain;
pub mod reconcile;
pub mod services;
pub mod simulation;
pub mod time;
pub mod timeline;
pub mod utils;

pub use chain::{verify_chain, verify_generation, ChainBuilder};
pub use reconcile::reconcile;
pub use time::{Clock, FixedClock, MonotonicSequence, SequenceGenerator, SystemClock};
pub use timeline::project;
