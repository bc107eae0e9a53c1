//! Loader: CSV exports and SQLite ledgers, and how each fails.

use ledgerlens_core::{
    config::DataSource,
    error::EngineError,
    loader::{Loader, PaymentRecord, TransactionRecord, PAYMENTS_FILE, TRANSACTIONS_FILE},
    store::LedgerStore,
};
use std::fs;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn csv_source(dir: &tempfile::TempDir) -> DataSource {
    DataSource::Csv {
        dir: dir.path().to_path_buf(),
    }
}

fn write(dir: &tempfile::TempDir, name: &str, body: &str) {
    fs::write(dir.path().join(name), body).expect("write fixture file");
}

fn assert_load_failure(err: EngineError) {
    assert!(err.is_load_failure(), "expected a load failure, got {err:?}");
    assert_eq!(err.status(), 500);
}

// ── CSV ──────────────────────────────────────────────────────────────────────

/// Extra columns are ignored; empty and float-form ids are normalised.
#[test]
fn csv_export_with_dataframe_quirks_loads() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write(
        &dir,
        TRANSACTIONS_FILE,
        "id,type,amount,date,client_id,supplier_id,reference_number\n\
         1,sale,100.5,2024-01-01,12.0,,REF-1\n\
         2.0,purchase,40,2024-01-02,,S-9,REF-2\n\
         3,sale,,2024-01-03,12,,REF-3\n",
    );
    write(
        &dir,
        PAYMENTS_FILE,
        "id,transaction_id,amount_paid,payment_date\n\
         1,1,100.5,2024-02-01\n\
         2,2.0,10,2024-02-02\n",
    );

    let ledger = Loader::new(csv_source(&dir)).load().expect("ledger should load");
    assert_eq!(ledger.transactions.len(), 3);
    assert_eq!(ledger.transactions[0].client_id.as_deref(), Some("12"));
    assert_eq!(ledger.transactions[0].supplier_id, None);
    assert_eq!(ledger.transactions[1].id, 2);
    assert_eq!(ledger.transactions[1].supplier_id.as_deref(), Some("S-9"));
    assert_eq!(ledger.transactions[2].amount, 0.0);
    assert_eq!(ledger.payments.len(), 2);
    assert_eq!(ledger.payments[1].transaction_id, 2);
}

/// Header-only files give an empty ledger, not an error.
#[test]
fn header_only_csv_is_empty() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write(&dir, TRANSACTIONS_FILE, "id,amount,client_id,supplier_id\n");
    write(&dir, PAYMENTS_FILE, "transaction_id,amount_paid\n");

    let ledger = Loader::new(csv_source(&dir)).load().expect("ledger should load");
    assert!(ledger.transactions.is_empty());
    assert!(ledger.payments.is_empty());
}

#[test]
fn missing_payments_file_is_a_load_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write(&dir, TRANSACTIONS_FILE, "id,amount,client_id,supplier_id\n1,5,A,\n");

    let err = Loader::new(csv_source(&dir)).load().expect_err("load should fail");
    assert_load_failure(err);
}

#[test]
fn missing_directory_is_a_load_error() {
    let source = DataSource::Csv {
        dir: "/definitely/not/here".into(),
    };
    assert_load_failure(Loader::new(source).load().expect_err("load should fail"));
}

/// Non-numeric amounts fail the whole load.
#[test]
fn malformed_amount_is_a_load_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write(&dir, TRANSACTIONS_FILE, "id,amount,client_id,supplier_id\n1,lots,A,\n");
    write(&dir, PAYMENTS_FILE, "transaction_id,amount_paid\n");

    assert_load_failure(Loader::new(csv_source(&dir)).load().expect_err("load should fail"));
}

#[test]
fn malformed_transaction_id_is_a_load_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write(&dir, TRANSACTIONS_FILE, "id,amount,client_id,supplier_id\n1,5,A,\n");
    write(&dir, PAYMENTS_FILE, "transaction_id,amount_paid\nfirst,5\n");

    assert_load_failure(Loader::new(csv_source(&dir)).load().expect_err("load should fail"));
}

// ── SQLite ───────────────────────────────────────────────────────────────────

/// Rows written through the store come back through the loader.
#[test]
fn sqlite_ledger_loads_through_store() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("ledger.db");
    {
        let store = LedgerStore::open(&path).expect("open ledger store");
        store.migrate().expect("migrations should apply");
        store
            .insert_transaction(&TransactionRecord {
                id: 1,
                client_id: Some("7".into()),
                supplier_id: None,
                amount: 250.0,
            })
            .expect("insert transaction");
        store
            .insert_transaction(&TransactionRecord {
                id: 2,
                client_id: None,
                supplier_id: Some("3".into()),
                amount: 80.0,
            })
            .expect("insert transaction");
        store
            .insert_payment(&PaymentRecord {
                transaction_id: 1,
                amount_paid: 125.0,
            })
            .expect("insert payment");
    }

    let ledger = Loader::new(DataSource::Sqlite { path }).load().expect("ledger should load");
    assert_eq!(ledger.transactions.len(), 2);
    assert_eq!(ledger.transactions[0].client_id.as_deref(), Some("7"));
    assert_eq!(ledger.transactions[1].supplier_id.as_deref(), Some("3"));
    assert_eq!(ledger.payments.len(), 1);
    assert_eq!(ledger.payments[0].amount_paid, 125.0);
}

/// Migrating twice is harmless.
#[test]
fn migration_is_idempotent() {
    let store = LedgerStore::in_memory().expect("open in-memory store");
    store.migrate().expect("migrations should apply");
    store.migrate().expect("migrations should apply");
    assert!(store.transactions().expect("read transactions").is_empty());
}

#[test]
fn missing_sqlite_file_is_a_load_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let source = DataSource::Sqlite {
        path: dir.path().join("absent.db"),
    };
    assert_load_failure(Loader::new(source).load().expect_err("load should fail"));
}

/// A database without the ledger tables cannot be read.
#[test]
fn sqlite_without_schema_is_a_load_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("empty.db");
    let conn = rusqlite::Connection::open(&path).expect("open raw sqlite file");
    conn.execute_batch("CREATE TABLE unrelated (x INTEGER);")
        .expect("create unrelated table");
    drop(conn);

    let err = Loader::new(DataSource::Sqlite { path })
        .load()
        .expect_err("missing tables should fail the load");
    assert_load_failure(err);
}
