//! Request boundary: authorization checks, parameter parsing and the folding of
//! every outcome into the `{success, ...}` JSON shape.
//!
//! RULE: Nothing escapes this module as an error. Each stage returns an
//! EngineResult and the boundary turns it into an ApiResponse.

use crate::{
    aggregator::PartyAggregate,
    engine::{AnalyticsEngine, ClassificationRun},
    error::{AuthError, EngineError, EngineResult},
    finance::FinanceSource,
    types::{round_to, PartyScope},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn from_error(err: &EngineError) -> Self {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(false));
        body.insert("message".into(), Value::String(err.public_message()));
        if let Some(detail) = err.detail() {
            body.insert("error".into(), Value::String(detail));
        }
        Self {
            status: err.status(),
            body: Value::Object(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Validate `Authorization: Bearer <token>` and return the token.
/// The token itself is never checked against an identity authority.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.map(str::trim).filter(|h| !h.is_empty());
    let Some(header) = header else {
        return Err(AuthError::MissingHeader);
    };
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().map(str::trim).unwrap_or_default();

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }
    if token.is_empty() {
        return Err(AuthError::MissingHeader);
    }
    if token.contains(char::is_whitespace) {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// Presence-only check used by the forecast endpoint.
pub fn require_header(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .filter(|h| !h.trim().is_empty())
        .ok_or(AuthError::MissingHeader)
}

/// Absent → `default`; otherwise a positive integer no larger than `max`.
pub fn parse_horizon(raw: Option<&str>, default: u32, max: u32) -> EngineResult<u32> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(months) if (1..=max).contains(&months) => Ok(months),
        _ => Err(EngineError::InvalidRequest(format!(
            "months must be an integer between 1 and {max}, got '{raw}'"
        ))),
    }
}

/// Display form of one party: ratio as a 0–100 percentage, money rounded
/// to cents, id emitted under the scope's key.
pub fn party_to_json(party: &PartyAggregate, scope: PartyScope) -> Value {
    let mut row = Map::new();
    row.insert(scope.key_name().into(), Value::String(party.party_id.clone()));
    row.insert("total_paid".into(), json!(round_to(party.total_paid, 2)));
    row.insert("total_billed".into(), json!(round_to(party.total_billed, 2)));
    row.insert("transactions".into(), json!(party.transaction_count));
    row.insert(
        "payment_ratio".into(),
        json!(round_to(round_to(party.payment_ratio, 2) * 100.0, 2)),
    );
    row.insert("avg_payment".into(), json!(round_to(party.avg_payment, 2)));
    row.insert("segment".into(), json!(party.segment));
    row.insert("label".into(), json!(party.label));
    row.insert("predicted_class".into(), json!(party.predicted_class));
    Value::Object(row)
}

pub fn classification_body(run: &ClassificationRun) -> Value {
    let data: Vec<Value> = run
        .parties
        .iter()
        .map(|p| party_to_json(p, run.scope))
        .collect();
    json!({ "success": true, "data": data })
}

pub struct AnalyticsService {
    engine: AnalyticsEngine,
    finance: Box<dyn FinanceSource>,
}

impl AnalyticsService {
    pub fn new(engine: AnalyticsEngine, finance: Box<dyn FinanceSource>) -> Self {
        Self { engine, finance }
    }

    pub fn engine(&self) -> &AnalyticsEngine {
        &self.engine
    }

    /// `GET /classify` (client scope) and `GET /classify/suppliers`.
    pub fn classify(&self, authorization: Option<&str>, scope: PartyScope) -> ApiResponse {
        let outcome = bearer_token(authorization)
            .map_err(EngineError::from)
            .and_then(|_| self.engine.classify(scope));
        match outcome {
            Ok(run) => ApiResponse::ok(classification_body(&run)),
            Err(err) => Self::fail("classify", &err),
        }
    }

    /// `GET /predict/budget?months=N`.
    pub fn predict_budget(&self, authorization: Option<&str>, months: Option<&str>) -> ApiResponse {
        let config = self.engine.config();
        let outcome = require_header(authorization)
            .map_err(EngineError::from)
            .and_then(|credential| {
                let months = parse_horizon(months, config.default_horizon, config.max_horizon)?;
                self.engine
                    .forecast_budget(self.finance.as_ref(), credential, months)
            });
        match outcome {
            Ok(predictions) => ApiResponse::ok(json!({
                "success": true,
                "predictions": predictions,
            })),
            Err(err) => Self::fail("predict_budget", &err),
        }
    }

    fn fail(endpoint: &str, err: &EngineError) -> ApiResponse {
        log::warn!("{endpoint} failed ({}): {err}", err.status());
        ApiResponse::from_error(err)
    }
}
