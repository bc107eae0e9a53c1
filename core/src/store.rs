//! SQLite ledger access.
//!
//! RULE: Only store.rs talks to the database.
//! The loader calls store methods, it never executes SQL directly.

use crate::{
    error::{EngineError, EngineResult},
    loader::{normalize_party_id, PaymentRecord, TransactionRecord},
};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;

pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    /// Open (or create) a ledger database at `path`.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an existing ledger without write access. A missing file is a
    /// load failure, not an empty ledger.
    pub fn open_read_only(path: &Path) -> EngineResult<Self> {
        let name = path.display().to_string();
        if !path.is_file() {
            return Err(EngineError::load(name, "database file not found"));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| EngineError::load(name, e))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply the ledger schema.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_ledger.sql"))?;
        Ok(())
    }

    // ── Writes (fixtures and tooling) ─────────────────────────────

    pub fn insert_transaction(&self, t: &TransactionRecord) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO transactions (id, amount, client_id, supplier_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![t.id, t.amount, t.client_id, t.supplier_id],
        )?;
        Ok(())
    }

    pub fn insert_payment(&self, p: &PaymentRecord) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO payments (transaction_id, amount_paid) VALUES (?1, ?2)",
            params![p.transaction_id, p.amount_paid],
        )?;
        Ok(())
    }

    // ── Reads ─────────────────────────────────────────────────────

    pub fn transactions(&self) -> EngineResult<Vec<TransactionRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, client_id, supplier_id, amount
                 FROM transactions ORDER BY id ASC",
            )
            .map_err(|e| EngineError::load("transactions", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TransactionRecord {
                    id: row.get(0)?,
                    client_id: read_party_id(row, 1)?,
                    supplier_id: read_party_id(row, 2)?,
                    amount: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::load("transactions", e))?;
        Ok(rows)
    }

    pub fn payments(&self) -> EngineResult<Vec<PaymentRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT transaction_id, amount_paid
                 FROM payments ORDER BY id ASC",
            )
            .map_err(|e| EngineError::load("payments", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PaymentRecord {
                    transaction_id: row.get(0)?,
                    amount_paid: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::load("payments", e))?;
        Ok(rows)
    }
}

/// Party columns hold either integers or text depending on who wrote them.
fn read_party_id(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    use rusqlite::types::ValueRef;
    let raw = match row.get_ref(idx)? {
        ValueRef::Null => return Ok(None),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(_) => return Ok(None),
    };
    Ok(normalize_party_id(&raw))
}
