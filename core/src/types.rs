//! Shared primitive types used across the engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A client or supplier identifier as it appears in the ledger.
pub type PartyId = String;

/// A ledger transaction identifier.
pub type TransactionId = i64;

/// Which join key partitions the aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyScope {
    Client,
    Supplier,
}

impl PartyScope {
    /// Column / JSON key carrying the party id for this scope.
    pub fn key_name(&self) -> &'static str {
        match self {
            Self::Client => "client_id",
            Self::Supplier => "supplier_id",
        }
    }
}

impl std::str::FromStr for PartyScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" | "clients" => Ok(Self::Client),
            "supplier" | "suppliers" => Ok(Self::Supplier),
            other => Err(format!("unknown party scope '{other}'")),
        }
    }
}

/// Order party ids numerically when both parse as numbers, otherwise
/// lexicographically. Numbers sort before free-form ids.
pub fn compare_party_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_sort_numerically() {
        let mut ids = vec!["10", "2", "abc", "1"];
        ids.sort_by(|a, b| compare_party_ids(a, b));
        assert_eq!(ids, vec!["1", "2", "10", "abc"]);
    }

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round_to(2.345_1, 2), 2.35);
        assert_eq!(round_to(-1.005_1, 2), -1.01);
    }
}
