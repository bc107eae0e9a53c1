//! Finance collaborator client: fetches the monthly budget history.
//!
//! RULE: One synchronous call per forecast request. No retry, no caching.
//! The caller's Authorization header is forwarded verbatim.

use crate::{
    config::FinanceConfig,
    error::{AuthError, EngineError, EngineResult},
};
use chrono::{DateTime, NaiveDate};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPeriod {
    #[serde(deserialize_with = "de_month_date")]
    pub month_date: NaiveDate,
    #[serde(default, deserialize_with = "de_amount")]
    pub total_income_brut: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub total_income_net: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub total_expenses: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub net_balance: f64,
}

/// Envelope returned by the finance service's budget listing.
#[derive(Debug, Deserialize)]
pub struct BudgetEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "data")]
    pub budgets: Vec<BudgetPeriod>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Where the budget history comes from. Swapped for a stub in tests.
pub trait FinanceSource: Send + Sync {
    fn fetch_budget_history(&self, authorization: &str) -> EngineResult<Vec<BudgetPeriod>>;
}

pub struct HttpFinanceClient {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpFinanceClient {
    pub fn new(config: &FinanceConfig) -> EngineResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::computation(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            url: config.budget_url(),
            client,
        })
    }
}

impl FinanceSource for HttpFinanceClient {
    fn fetch_budget_history(&self, authorization: &str) -> EngineResult<Vec<BudgetPeriod>> {
        // Header bytes are checked before any network call.
        let header = HeaderValue::from_str(authorization)
            .map_err(|_| EngineError::Auth(AuthError::MalformedHeader))?;
        log::debug!("Fetching budget history from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .header(AUTHORIZATION, header)
            .send()
            .map_err(|e| EngineError::Upstream {
                status: 502,
                message: format!("Finance service unreachable: {e}"),
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| EngineError::Upstream {
            status: 502,
            message: format!("Cannot read finance response: {e}"),
        })?;
        decode_budget_response(status.as_u16(), &body)
    }
}

/// Turn a raw finance-service answer into budget rows or an upstream error.
pub fn decode_budget_response(status: u16, body: &str) -> EngineResult<Vec<BudgetPeriod>> {
    let parsed: Result<BudgetEnvelope, _> = serde_json::from_str(body);

    if !(200..300).contains(&status) {
        let message = parsed
            .ok()
            .and_then(|env| env.message)
            .unwrap_or_else(|| format!("Finance service answered with status {status}"));
        return Err(EngineError::Upstream { status, message });
    }

    let envelope = parsed.map_err(|e| EngineError::Upstream {
        status: 502,
        message: format!("Malformed finance payload: {e}"),
    })?;
    if !envelope.success {
        return Err(EngineError::Upstream {
            status: 502,
            message: envelope
                .message
                .unwrap_or_else(|| "Finance service reported a failure.".to_string()),
        });
    }
    Ok(envelope.budgets)
}

// ── Field decoding ───────────────────────────────────────────────────────────
// Postgres numeric columns arrive as JSON strings; dates may be a bare month,
// a calendar date, or a full timestamp.

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn de_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(NumberOrString::Number(v)) => Ok(v),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(0.0),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid amount '{s}'"))),
    }
}

fn de_month_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_month_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid month_date '{raw}'")))
}

pub fn parse_month_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_dates_in_all_accepted_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 12, 1).expect("valid date");
        assert_eq!(parse_month_date("2024-12"), Some(expected));
        assert_eq!(parse_month_date("2024-12-01"), Some(expected));
        assert_eq!(parse_month_date("2024-12-01T00:00:00.000Z"), Some(expected));
        assert_eq!(parse_month_date("December"), None);
    }

    #[test]
    fn numeric_strings_decode_as_amounts() {
        let body = r#"{"success":true,"budgets":[{"month_date":"2024-01-01","total_income_brut":"1200.50","total_income_net":1000,"total_expenses":"300","net_balance":null}]}"#;
        let rows = decode_budget_response(200, body).expect("numeric strings should decode");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_income_brut, 1200.5);
        assert_eq!(rows[0].total_income_net, 1000.0);
        assert_eq!(rows[0].net_balance, 0.0);
    }

    #[test]
    fn upstream_status_is_propagated() {
        let err = decode_budget_response(403, r#"{"success":false,"message":"Forbidden"}"#)
            .expect_err("403 must fail");
        match err {
            EngineError::Upstream { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Forbidden");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn success_false_payload_fails_even_with_ok_status() {
        let err = decode_budget_response(200, r#"{"success":false,"message":"db down"}"#)
            .expect_err("success:false must fail");
        assert_eq!(err.status(), 502);
        assert_eq!(err.public_message(), "db down");
    }
}
