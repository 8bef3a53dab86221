mod common;

use common::{at, months, new_line, setup_test_env, RECIPIENT};
use payline_core::config::Config;
use payline_core::core::chain::ChainBuilder;
use payline_core::domain::{ledger::Ledger, payment_line::PaymentLine};
use payline_core::errors::{IntegrityError, StorageError};
use payline_core::storage::{JsonLedgerRepository, LedgerRepository};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn sample_ledger() -> Ledger {
    let mut builder = ChainBuilder::new();
    let new = builder
        .push(new_line(1, at(1, 1), months(1, 12), 1000))
        .expect("new")
        .clone();
    builder
        .push(PaymentLine::suspend(&new, months(3, 4), at(2, 1), 2).expect("suspend"))
        .expect("push");
    Ledger::new(RECIPIENT, builder.into_lines(), at(2, 1)).expect("ledger")
}

fn extended(ledger: &Ledger) -> Ledger {
    let mut next = ledger.clone();
    let mut builder = ChainBuilder::after(ledger.last_line());
    builder
        .push(new_line(3, at(3, 1), months(1, 2), 1100))
        .expect("push");
    let mut chain = ledger.lines().to_vec();
    chain.extend(builder.into_lines());
    next.extend_with_chain(chain, at(3, 1)).expect("extend");
    next
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.tmp", existing),
        None => String::from("tmp"),
    };
    tmp.set_extension(ext);
    tmp
}

#[test]
fn atomic_save_failure_preserves_original_file() {
    let temp = tempdir().unwrap();
    let repo = JsonLedgerRepository::new(Some(temp.path().to_path_buf()), Some(2)).unwrap();

    let ledger = sample_ledger();
    repo.save(&ledger).expect("initial save");
    let path = repo.ledger_path(RECIPIENT);
    let original = fs::read_to_string(&path).expect("read original file");

    // A directory in place of the staging file makes File::create fail.
    let tmp_path = tmp_path_for(&path);
    fs::create_dir_all(&tmp_path).unwrap();

    let result = repo.save(&extended(&ledger));
    assert!(
        result.is_err(),
        "expected save to fail when the staging path is a directory"
    );

    let current = fs::read_to_string(&path).expect("read after failure");
    assert_eq!(
        current, original,
        "atomic save failure must not corrupt the original file"
    );
    let _ = fs::remove_dir_all(&tmp_path);
}

#[test]
fn ledger_survives_a_roundtrip_with_receipts() {
    let (repo, _config) = setup_test_env();
    let mut ledger = sample_ledger();
    ledger.record_receipt(
        1,
        payline_core::domain::ledger::Receipt {
            status: payline_core::domain::ledger::ReceiptStatus::OkWithWarnings,
            received_at: at(2, 2),
        },
    );
    repo.save(&ledger).expect("save");
    let loaded = repo.load(RECIPIENT).expect("load").expect("stored");
    assert_eq!(loaded, ledger);
    assert!(loaded.batches()[0].is_settled(false));
}

#[test]
fn tampered_chain_is_reported_as_corrupt() {
    let (repo, _config) = setup_test_env();
    let ledger = extended(&sample_ledger());
    repo.save(&ledger).expect("save");

    let path = repo.ledger_path(RECIPIENT);
    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json["lines"][2]["previous_line_id"] = serde_json::Value::Null;
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    let err = repo.load(RECIPIENT).unwrap_err();
    assert!(matches!(
        err,
        StorageError::Corrupt(IntegrityError::BrokenBackReference { sequence: 3, .. })
    ));
}

#[test]
fn inverted_period_on_disk_fails_to_parse() {
    let (repo, _config) = setup_test_env();
    repo.save(&sample_ledger()).expect("save");

    let path = repo.ledger_path(RECIPIENT);
    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json["lines"][0]["valid"]["from"] = serde_json::Value::from("2025-01-01");
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    assert!(matches!(repo.load(RECIPIENT), Err(StorageError::Serde(_))));
}

#[test]
fn every_save_backs_up_the_previous_version() {
    let (repo, _config) = setup_test_env();
    let first = sample_ledger();
    repo.save(&first).expect("first save");
    repo.save(&extended(&first)).expect("second save");

    let backups = repo.list_backups(RECIPIENT).expect("backups");
    assert_eq!(backups.len(), 1);
    let restored = repo.restore(RECIPIENT, &backups[0]).expect("restore");
    assert_eq!(restored, first);
    assert_eq!(repo.load(RECIPIENT).unwrap(), Some(first));
}

#[test]
fn config_lives_next_to_the_ledgers() {
    let (_repo, config_manager) = setup_test_env();
    assert_eq!(config_manager.load().expect("defaults"), Config::default());

    let strict_off = Config {
        accept_receipts_with_errors: true,
        ..Config::default()
    };
    config_manager.save(&strict_off).expect("save");
    assert!(config_manager.load().unwrap().accept_receipts_with_errors);
}
