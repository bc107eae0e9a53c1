//! Segmenter: ordering of segment ids, assignment coverage, small populations.

use ledgerlens_core::{
    aggregator::aggregate,
    config::EngineConfig,
    engine::AnalyticsEngine,
    loader::{Ledger, PaymentRecord, TransactionRecord},
    types::PartyScope,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// `clients` clients with two invoices each and paid shares spread over 0..=1.
fn spread_ledger(clients: i64) -> Ledger {
    let mut transactions = Vec::new();
    let mut payments = Vec::new();
    for c in 0..clients {
        let billed = 100.0 + (c % 7) as f64 * 35.0;
        let share = (c % 11) as f64 / 10.0;
        for n in 0..2 {
            let id = c * 10 + n;
            transactions.push(TransactionRecord {
                id,
                client_id: Some(format!("{}", c + 1)),
                supplier_id: None,
                amount: billed,
            });
            if share > 0.0 {
                payments.push(PaymentRecord {
                    transaction_id: id,
                    amount_paid: billed * share,
                });
            }
        }
    }
    Ledger::new(transactions, payments)
}

fn segment_means(parties: &[ledgerlens_core::aggregator::PartyAggregate], k: usize) -> Vec<Option<f64>> {
    (0..k)
        .map(|s| {
            let members: Vec<f64> = parties
                .iter()
                .filter(|p| p.segment == Some(s))
                .map(|p| p.payment_ratio)
                .collect();
            if members.is_empty() {
                None
            } else {
                Some(members.iter().sum::<f64>() / members.len() as f64)
            }
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Higher segment id never means a worse average payer.
#[test]
fn segment_ids_follow_mean_payment_ratio() {
    let engine = AnalyticsEngine::new(EngineConfig::default_test());
    let run = engine
        .classify_ledger(&spread_ledger(40), PartyScope::Client)
        .expect("classification should succeed");

    let means: Vec<f64> = segment_means(&run.parties, 3).into_iter().flatten().collect();
    assert_eq!(means.len(), 3, "all three segments should be populated");
    for pair in means.windows(2) {
        assert!(pair[0] <= pair[1], "segment means not ascending: {means:?}");
    }
}

/// Summaries agree with the per-party assignments.
#[test]
fn summaries_match_assignments() {
    let engine = AnalyticsEngine::new(EngineConfig::default_test());
    let run = engine
        .classify_ledger(&spread_ledger(30), PartyScope::Client)
        .expect("classification should succeed");

    assert_eq!(run.segments.len(), 3);
    let total: usize = run.segments.iter().map(|s| s.members).sum();
    assert_eq!(total, run.parties.len());

    let means = segment_means(&run.parties, 3);
    for summary in &run.segments {
        if let Some(mean) = means[summary.segment] {
            assert!((summary.mean_payment_ratio - mean).abs() < 1e-12);
        }
    }
}

/// Every party gets a segment in 0..k.
#[test]
fn every_party_is_segmented() {
    let engine = AnalyticsEngine::new(EngineConfig::default_test());
    let run = engine
        .classify_ledger(&spread_ledger(25), PartyScope::Client)
        .expect("classification should succeed");

    assert!(run
        .parties
        .iter()
        .all(|p| matches!(p.segment, Some(s) if s < 3)));
}

/// Fewer parties than segments is a computation failure, not a panic.
#[test]
fn too_few_parties_fails_with_computation_error() {
    let ledger = spread_ledger(2);
    assert_eq!(aggregate(&ledger, PartyScope::Client).len(), 2);

    let engine = AnalyticsEngine::new(EngineConfig::default_test());
    let err = engine
        .classify_ledger(&ledger, PartyScope::Client)
        .expect_err("classification should fail");
    assert_eq!(err.status(), 500);
    assert!(err.detail().is_some());
}

/// A scope with no keyed rows fails cleanly.
#[test]
fn empty_scope_fails_with_computation_error() {
    let engine = AnalyticsEngine::new(EngineConfig::default_test());
    let err = engine
        .classify_ledger(&spread_ledger(10), PartyScope::Supplier)
        .expect_err("classification should fail");
    assert_eq!(err.status(), 500);
    assert_eq!(err.public_message(), "Analytics computation failed.");
}
