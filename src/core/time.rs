use chrono::{DateTime, NaiveDate, Utc};

/// Clock abstracts access to the current timestamp so reconciliation remains
/// deterministic in tests.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current UTC date. Defaults to `now().date_naive()`.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Real-time clock backed by the system UTC time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Issues the per-recipient total order of payment lines.
pub trait SequenceGenerator {
    fn next(&mut self) -> u64;
}

/// Counter scoped to one recipient's ledger. Passed explicitly into every
/// reconciliation; there is no process-wide instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonotonicSequence {
    next: u64,
}

impl MonotonicSequence {
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Continues after the highest sequence already issued.
    pub fn after(last: Option<u64>) -> Self {
        Self {
            next: last.map_or(1, |value| value.saturating_add(1)),
        }
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for MonotonicSequence {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl SequenceGenerator for MonotonicSequence {
    fn next(&mut self) -> u64 {
        let value = self.next;
        self.next = self.next.saturating_add(1);
        value
    }
}
