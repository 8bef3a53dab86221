#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use payline_core::{
    config::ConfigManager,
    core::simulation::{SimulationClient, SimulationFailure, SimulationRequest},
    domain::{
        common::Period,
        ledger::Ledger,
        payment_line::{Amount, PaymentLine},
        simulation::{RawPayment, RawPosting, RawSimulationPeriod, RawSimulationResponse},
    },
    errors::StorageResult,
    storage::{JsonLedgerRepository, LedgerRepository},
};
use tempfile::TempDir;
use uuid::Uuid;

pub const RECIPIENT: &str = "12345678901";

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Creates an isolated repository and config manager backed by a unique directory.
pub fn setup_test_env() -> (JsonLedgerRepository, ConfigManager) {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);

    let repo = JsonLedgerRepository::new(Some(base.clone()), Some(3)).expect("json repository");
    let config_manager =
        ConfigManager::with_base_dir(base).expect("create config manager for temp dir");
    (repo, config_manager)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Midday on the given day of 2024.
pub fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, 12, 0, 0).unwrap()
}

/// First day of `from` through the last day of `to`, 2024.
pub fn months(from: u32, to: u32) -> Period {
    Period::new(
        Period::month(2024, from).unwrap().from(),
        Period::month(2024, to).unwrap().to(),
    )
    .unwrap()
}

pub fn new_line(sequence: u64, created_at: DateTime<Utc>, valid: Period, amount: Amount) -> PaymentLine {
    PaymentLine::new(Uuid::new_v4(), created_at, sequence, valid, None, amount).expect("new line")
}

/// Repository that keeps ledgers in memory.
#[derive(Default)]
pub struct MemoryLedgerRepository {
    ledgers: Mutex<HashMap<String, Ledger>>,
}

impl LedgerRepository for MemoryLedgerRepository {
    fn load(&self, recipient_id: &str) -> StorageResult<Option<Ledger>> {
        Ok(self.ledgers.lock().unwrap().get(recipient_id).cloned())
    }

    fn save(&self, ledger: &Ledger) -> StorageResult<()> {
        ledger.validate()?;
        self.ledgers
            .lock()
            .unwrap()
            .insert(ledger.recipient_id.clone(), ledger.clone());
        Ok(())
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self.ledgers.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Answers every request with the same canned outcome and records what it was asked.
pub struct StubSimulationClient {
    outcome: Result<RawSimulationResponse, SimulationFailure>,
    pub requests: Mutex<Vec<SimulationRequest>>,
}

impl StubSimulationClient {
    pub fn answering(response: RawSimulationResponse) -> Self {
        Self {
            outcome: Ok(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failure: SimulationFailure) -> Self {
        Self {
            outcome: Err(failure),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl SimulationClient for StubSimulationClient {
    fn simulate(
        &self,
        request: &SimulationRequest,
    ) -> Result<RawSimulationResponse, SimulationFailure> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.clone()
    }
}

/// The ordinary monthly benefit posting for a simulated line.
pub fn benefit(period: Period, amount: Amount) -> RawPosting {
    RawPosting {
        from: period.from(),
        to: period.to(),
        account: "2341000".into(),
        amount,
        reversal: false,
        rate: amount,
        rate_type: "MND".into(),
        rate_count: 1,
        class_code: "SUUFORE".into(),
        class_type: "YTEL".into(),
    }
}

/// Any non-simulated posting, such as re-postings and reversals of earlier payments.
pub fn posting(period: Period, class_type: &str, amount: Amount) -> RawPosting {
    RawPosting {
        from: period.from(),
        to: period.to(),
        account: String::new(),
        amount,
        reversal: class_type == "YTEL" && amount < 0,
        rate: 0,
        rate_type: String::new(),
        rate_count: 0,
        class_code: "SUUFORE".into(),
        class_type: class_type.into(),
    }
}

pub fn paying(period: Period, due_date: NaiveDate, postings: Vec<RawPosting>) -> RawSimulationPeriod {
    RawSimulationPeriod {
        period,
        payment: Some(RawPayment {
            recipient_id: RECIPIENT.into(),
            due_date,
            postings,
        }),
    }
}

pub fn response(
    computed_at: NaiveDate,
    requested_period: Period,
    periods: Vec<RawSimulationPeriod>,
) -> RawSimulationResponse {
    let net_amount = periods
        .iter()
        .filter_map(|period| period.payment.as_ref())
        .flat_map(|payment| payment.postings.iter())
        .filter(|posting| posting.class_type == "YTEL")
        .map(|posting| posting.amount)
        .sum();
    RawSimulationResponse {
        recipient_id: RECIPIENT.into(),
        computed_at,
        net_amount,
        requested_period,
        periods,
    }
}

/// A month in which 10000 was paid but only 5000 is owed.
pub fn overpaid_month(period: Period, due_date: NaiveDate) -> RawSimulationPeriod {
    paying(
        period,
        due_date,
        vec![
            benefit(period, 5000),
            posting(period, "YTEL", 5000),
            posting(period, "YTEL", -10000),
            posting(period, "FEIL", 5000),
            posting(period, "MOTP", -5000),
        ],
    )
}
