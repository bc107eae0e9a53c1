//! Aggregator: joins payments onto transactions and rolls them up per party.
//!
//! Steps:
//!   1. Left join payments onto transactions by transaction id.
//!      Unpaid transactions keep a null paid amount (summed as 0).
//!   2. Drop joined rows whose scope key is absent.
//!   3. Group by the scope key: sum billed, sum paid, count rows.
//!   4. Derive payment_ratio and avg_payment, guarding every division.
//!
//! RULE: Division by zero resolves to 0. It is never an error and never NaN.

use crate::{
    loader::{Ledger, TransactionRecord},
    types::{compare_party_ids, PartyId, PartyScope, TransactionId},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyAggregate {
    pub party_id: PartyId,
    pub total_paid: f64,
    pub total_billed: f64,
    pub transaction_count: u64,
    /// On the 0–1 scale; rescaled to a percentage only for display.
    pub payment_ratio: f64,
    pub avg_payment: f64,
    /// Ordinal tier, 0 = worst. Filled in by the segmenter.
    pub segment: Option<usize>,
    /// Threshold label. Filled in by the classifier.
    pub label: Option<u8>,
    /// Forest prediction over the full population. Filled in by the classifier.
    pub predicted_class: Option<u8>,
}

impl PartyAggregate {
    pub fn new(party_id: PartyId, total_paid: f64, total_billed: f64, transaction_count: u64) -> Self {
        Self {
            payment_ratio: safe_ratio(total_paid, total_billed),
            avg_payment: safe_ratio(total_paid, transaction_count as f64),
            party_id,
            total_paid,
            total_billed,
            transaction_count,
            segment: None,
            label: None,
            predicted_class: None,
        }
    }

    /// The four clustering / classification inputs, in fixed column order.
    pub fn features(&self) -> [f64; 4] {
        [
            self.total_paid,
            self.transaction_count as f64,
            self.payment_ratio,
            self.avg_payment,
        ]
    }
}

pub const FEATURE_NAMES: [&str; 4] = ["total_paid", "transactions", "payment_ratio", "avg_payment"];

/// numerator / denominator, or 0 when the result would be undefined.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn party_key(t: &TransactionRecord, scope: PartyScope) -> Option<&PartyId> {
    match scope {
        PartyScope::Client => t.client_id.as_ref(),
        PartyScope::Supplier => t.supplier_id.as_ref(),
    }
}

#[derive(Default)]
struct Totals {
    paid: f64,
    billed: f64,
    rows: u64,
}

/// One aggregate per distinct party key, sorted by party id.
pub fn aggregate(ledger: &Ledger, scope: PartyScope) -> Vec<PartyAggregate> {
    let mut payments_by_txn: HashMap<TransactionId, Vec<f64>> = HashMap::new();
    for p in &ledger.payments {
        payments_by_txn
            .entry(p.transaction_id)
            .or_default()
            .push(finite_or_zero(p.amount_paid));
    }

    let mut totals: HashMap<&PartyId, Totals> = HashMap::new();
    for t in &ledger.transactions {
        let Some(key) = party_key(t, scope) else {
            continue;
        };
        let billed = finite_or_zero(t.amount);
        let entry = totals.entry(key).or_default();
        match payments_by_txn.get(&t.id) {
            // A left join repeats the transaction once per matching payment.
            Some(paid) => {
                for amount in paid {
                    entry.paid += amount;
                    entry.billed += billed;
                    entry.rows += 1;
                }
            }
            None => {
                entry.billed += billed;
                entry.rows += 1;
            }
        }
    }

    let mut aggregates: Vec<PartyAggregate> = totals
        .into_iter()
        .map(|(id, t)| PartyAggregate::new(id.clone(), t.paid, t.billed, t.rows))
        .collect();
    aggregates.sort_by(|a, b| compare_party_ids(&a.party_id, &b.party_id));

    log::debug!(
        "Aggregated {} {} parties from {} transactions",
        aggregates.len(),
        scope.key_name(),
        ledger.transactions.len()
    );
    aggregates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_denominators_resolve_to_zero() {
        assert_eq!(safe_ratio(10.0, 0.0), 0.0);
        assert_eq!(safe_ratio(0.0, 0.0), 0.0);
        assert_eq!(safe_ratio(f64::INFINITY, 1.0), 0.0);
        assert_eq!(safe_ratio(1.0, 4.0), 0.25);
    }

    #[test]
    fn aggregate_with_nothing_billed_has_zero_ratio() {
        let a = PartyAggregate::new("9".into(), 50.0, 0.0, 0);
        assert_eq!(a.payment_ratio, 0.0);
        assert_eq!(a.avg_payment, 0.0);
    }
}
