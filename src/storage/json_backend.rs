use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::config::Config;
use crate::core::utils::{ensure_dir, PathResolver};
use crate::domain::ledger::{Ledger, CURRENT_SCHEMA_VERSION};
use crate::errors::{StorageError, StorageResult};
use crate::utils::persistence::{read_json, write_json_atomic};

use super::LedgerRepository;

const LEDGER_EXTENSION: &str = "json";
const DEFAULT_RETENTION: usize = 5;

/// One JSON file per recipient, with the previous versions kept as backups.
#[derive(Clone)]
pub struct JsonLedgerRepository {
    root: PathBuf,
    ledgers_dir: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonLedgerRepository {
    pub fn new(root: Option<PathBuf>, retention: Option<usize>) -> StorageResult<Self> {
        let root = PathResolver::resolve_base(root);
        let ledgers_dir = PathResolver::ledger_dir_in(&root);
        let backups_dir = PathResolver::backup_dir_in(&root);
        ensure_dir(&ledgers_dir)?;
        ensure_dir(&backups_dir)?;
        Ok(Self {
            root,
            ledgers_dir,
            backups_dir,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
        })
    }

    /// Repository rooted at the configured data directory, keeping as many
    /// backups as the configuration asks for.
    pub fn from_config(config: &Config) -> StorageResult<Self> {
        Self::new(Some(config.data_dir()), Some(config.backup_retention))
    }

    pub fn base_dir(&self) -> &Path {
        &self.root
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn ledger_path(&self, recipient_id: &str) -> PathBuf {
        self.ledgers_dir
            .join(format!("{}.{}", file_stem(recipient_id), LEDGER_EXTENSION))
    }

    fn backup_dir(&self, recipient_id: &str) -> PathBuf {
        self.backups_dir.join(file_stem(recipient_id))
    }

    /// Backups for `recipient_id`, newest first.
    pub fn list_backups(&self, recipient_id: &str) -> StorageResult<Vec<String>> {
        let dir = self.backup_dir(recipient_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LEDGER_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(name.to_string());
            }
        }
        entries.sort_by(|a, b| backup_version(b).cmp(&backup_version(a)));
        Ok(entries)
    }

    /// Puts a backup back in place and returns the ledger it holds.
    pub fn restore(&self, recipient_id: &str, backup_name: &str) -> StorageResult<Ledger> {
        let backup_path = self.backup_dir(recipient_id).join(backup_name);
        if !backup_path.exists() {
            return Err(StorageError::NotFound(format!("backup `{}`", backup_name)));
        }
        let ledger = load_ledger_from_path(&backup_path)?;
        ensure_recipient(recipient_id, &ledger)?;
        write_json_atomic(&self.ledger_path(recipient_id), &ledger)?;
        Ok(ledger)
    }

    /// Copies the current file aside. Every backup gets the next version
    /// number, so saves that keep the last sequence (receipts) never
    /// overwrite an earlier backup.
    fn backup_existing(&self, recipient_id: &str, path: &Path) -> StorageResult<()> {
        let previous = load_ledger_from_path(path)?;
        let dir = self.backup_dir(recipient_id);
        ensure_dir(&dir)?;
        let version = self
            .list_backups(recipient_id)?
            .first()
            .and_then(|name| backup_version(name))
            .map_or(1, |latest| latest + 1);
        let backup_name = format!(
            "{}_seq{}_v{}.{}",
            file_stem(recipient_id),
            previous.last_sequence().unwrap_or(0),
            version,
            LEDGER_EXTENSION
        );
        fs::copy(path, dir.join(&backup_name))?;
        debug!(recipient = %recipient_id, backup = %backup_name, "backed up ledger");
        self.prune_backups(recipient_id)
    }

    fn prune_backups(&self, recipient_id: &str) -> StorageResult<()> {
        let backups = self.list_backups(recipient_id)?;
        for name in backups.iter().skip(self.retention) {
            let path = self.backup_dir(recipient_id).join(name);
            if let Err(err) = fs::remove_file(&path) {
                warn!(path = %path.display(), %err, "could not prune ledger backup");
            }
        }
        Ok(())
    }
}

impl LedgerRepository for JsonLedgerRepository {
    fn load(&self, recipient_id: &str) -> StorageResult<Option<Ledger>> {
        let path = self.ledger_path(recipient_id);
        if !path.exists() {
            return Ok(None);
        }
        let ledger = load_ledger_from_path(&path)?;
        ensure_recipient(recipient_id, &ledger)?;
        Ok(Some(ledger))
    }

    fn save(&self, ledger: &Ledger) -> StorageResult<()> {
        let path = self.ledger_path(&ledger.recipient_id);
        if path.exists() {
            self.backup_existing(&ledger.recipient_id, &path)?;
        }
        save_ledger_to_path(ledger, &path)
    }

    /// Recipient ids of every stored ledger, sorted.
    fn list(&self) -> StorageResult<Vec<String>> {
        let mut recipients = Vec::new();
        for entry in fs::read_dir(&self.ledgers_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LEDGER_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match recipient_from_stem(stem) {
                Some(recipient) => recipients.push(recipient),
                None => warn!(path = %path.display(), "skipping foreign file in ledger directory"),
            }
        }
        recipients.sort();
        Ok(recipients)
    }
}

pub fn save_ledger_to_path(ledger: &Ledger, path: &Path) -> StorageResult<()> {
    ledger.validate()?;
    write_json_atomic(path, ledger)
}

/// Loads and re-validates a ledger; a file that fails validation is reported
/// as corrupt rather than handed to the caller.
pub fn load_ledger_from_path(path: &Path) -> StorageResult<Ledger> {
    let ledger: Ledger = read_json(path)?;
    if ledger.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedSchema {
            found: ledger.schema_version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    ledger.validate()?;
    Ok(ledger)
}

fn ensure_recipient(requested: &str, ledger: &Ledger) -> StorageResult<()> {
    if ledger.recipient_id != requested {
        return Err(StorageError::RecipientMismatch {
            requested: requested.to_string(),
            stored: ledger.recipient_id.clone(),
        });
    }
    Ok(())
}

/// File-name form of a recipient id. Lowercase ASCII letters, digits and `-`
/// are kept; every other byte becomes `_` plus two lowercase hex digits, so
/// distinct ids never share a file, even on case-insensitive filesystems.
/// The empty id is a lone `_`.
fn file_stem(recipient_id: &str) -> String {
    if recipient_id.is_empty() {
        return "_".into();
    }
    let mut stem = String::with_capacity(recipient_id.len());
    for byte in recipient_id.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'-' => stem.push(char::from(byte)),
            _ => stem.push_str(&format!("_{byte:02x}")),
        }
    }
    stem
}

/// Inverse of [`file_stem`]; `None` for names it would never produce.
fn recipient_from_stem(stem: &str) -> Option<String> {
    if stem == "_" {
        return Some(String::new());
    }
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&first, tail)) = rest.split_first() {
        if first == b'_' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(first);
            rest = tail;
        }
    }
    let recipient = String::from_utf8(bytes).ok()?;
    (file_stem(&recipient) == stem).then_some(recipient)
}

fn backup_version(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(&format!(".{}", LEDGER_EXTENSION))?;
    let (_, version) = stem.rsplit_once("_v")?;
    version.parse().ok()
}
