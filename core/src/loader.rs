//! Loader: reads the two ledger tables from the configured source.
//!
//! RULE: The loader validates and converts rows but never transforms them.
//! Joining and grouping belong to the aggregator.

use crate::{
    config::DataSource,
    error::{EngineError, EngineResult},
    store::LedgerStore,
    types::{PartyId, TransactionId},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const TRANSACTIONS_FILE: &str = "transactions.csv";
pub const PAYMENTS_FILE: &str = "payments.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub client_id: Option<PartyId>,
    pub supplier_id: Option<PartyId>,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub transaction_id: TransactionId,
    pub amount_paid: f64,
}

/// One snapshot of both ledger tables.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub transactions: Vec<TransactionRecord>,
    pub payments: Vec<PaymentRecord>,
}

impl Ledger {
    pub fn new(transactions: Vec<TransactionRecord>, payments: Vec<PaymentRecord>) -> Self {
        Self {
            transactions,
            payments,
        }
    }
}

// ── CSV row shapes ──────────────────────────────────────────────────────────
// Exports carry more columns (type, date, reference_number, ...); serde
// ignores them. Id cells may come out of a dataframe as "12.0".

#[derive(Debug, Deserialize)]
struct TransactionRow {
    id: String,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    supplier_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentRow {
    transaction_id: String,
    #[serde(default)]
    amount_paid: Option<f64>,
}

pub struct Loader {
    source: DataSource,
}

impl Loader {
    pub fn new(source: DataSource) -> Self {
        Self { source }
    }

    pub fn load(&self) -> EngineResult<Ledger> {
        let ledger = match &self.source {
            DataSource::Csv { dir } => Self::load_csv_dir(dir)?,
            DataSource::Sqlite { path } => {
                let store = LedgerStore::open_read_only(path)?;
                Ledger::new(store.transactions()?, store.payments()?)
            }
        };
        log::debug!(
            "Loaded ledger: {} transactions, {} payments",
            ledger.transactions.len(),
            ledger.payments.len()
        );
        Ok(ledger)
    }

    fn load_csv_dir(dir: &Path) -> EngineResult<Ledger> {
        let transactions = read_transactions_csv(&dir.join(TRANSACTIONS_FILE))?;
        let payments = read_payments_csv(&dir.join(PAYMENTS_FILE))?;
        Ok(Ledger::new(transactions, payments))
    }
}

pub fn read_transactions_csv(path: &Path) -> EngineResult<Vec<TransactionRecord>> {
    let name = path.display().to_string();
    let mut reader = open_csv(path)?;
    let mut records = Vec::new();

    for (line, result) in reader.deserialize::<TransactionRow>().enumerate() {
        let row = result.map_err(|e| EngineError::load(&name, e))?;
        let id = parse_transaction_id(&row.id).ok_or_else(|| {
            EngineError::load(&name, format!("row {}: invalid id '{}'", line + 1, row.id))
        })?;
        records.push(TransactionRecord {
            id,
            client_id: row.client_id.as_deref().and_then(normalize_party_id),
            supplier_id: row.supplier_id.as_deref().and_then(normalize_party_id),
            amount: row.amount.unwrap_or(0.0),
        });
    }
    Ok(records)
}

pub fn read_payments_csv(path: &Path) -> EngineResult<Vec<PaymentRecord>> {
    let name = path.display().to_string();
    let mut reader = open_csv(path)?;
    let mut records = Vec::new();

    for (line, result) in reader.deserialize::<PaymentRow>().enumerate() {
        let row = result.map_err(|e| EngineError::load(&name, e))?;
        let transaction_id = parse_transaction_id(&row.transaction_id).ok_or_else(|| {
            EngineError::load(
                &name,
                format!("row {}: invalid transaction_id '{}'", line + 1, row.transaction_id),
            )
        })?;
        records.push(PaymentRecord {
            transaction_id,
            amount_paid: row.amount_paid.unwrap_or(0.0),
        });
    }
    Ok(records)
}

fn open_csv(path: &Path) -> EngineResult<csv::Reader<std::fs::File>> {
    let name = path.display().to_string();
    if !path.is_file() {
        return Err(EngineError::load(name, "file not found"));
    }
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| EngineError::load(name, e))
}

/// Accepts "12" and the dataframe float form "12.0".
pub fn parse_transaction_id(raw: &str) -> Option<TransactionId> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
        _ => None,
    }
}

/// Empty cells become absent; integral float ids lose their ".0".
pub fn normalize_party_id(raw: &str) -> Option<PartyId> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return None;
    }
    if let Some(stripped) = raw.strip_suffix(".0") {
        if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
            return Some(stripped.to_string());
        }
    }
    Some(raw.to_string())
}
