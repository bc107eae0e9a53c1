//! HTTP finance client against a local mock server: credential forwarding,
//! upstream status propagation, transport failures, header validation.

use ledgerlens_core::{
    config::FinanceConfig,
    error::{AuthError, EngineError},
    finance::{FinanceSource, HttpFinanceClient},
};
use mockito::{Matcher, Server};
use std::net::TcpListener;

// ── Helpers ──────────────────────────────────────────────────────────────────

const BUDGET_PATH: &str = "/api/total_budget";

const TWO_MONTHS: &str = r#"{"success":true,"budgets":[
    {"month_date":"2024-01-01","total_income_brut":"1000","total_income_net":"800","total_expenses":"500","net_balance":"300"},
    {"month_date":"2024-02","total_income_brut":1100,"total_income_net":880,"total_expenses":550,"net_balance":330}
]}"#;

fn client_for(base_url: &str) -> HttpFinanceClient {
    let config = FinanceConfig {
        base_url: base_url.to_string(),
        budget_path: BUDGET_PATH.to_string(),
        timeout_secs: 5,
    };
    HttpFinanceClient::new(&config).expect("client should build")
}

/// Address of a port nothing is listening on.
fn unbound_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// The caller's Authorization header reaches the finance service unchanged.
#[test]
fn authorization_header_is_forwarded_verbatim() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", BUDGET_PATH)
        .match_header("authorization", "Bearer abc.def")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TWO_MONTHS)
        .create();

    let rows = client_for(&server.url())
        .fetch_budget_history("Bearer abc.def")
        .expect("mocked history should decode");

    mock.assert();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].total_income_brut, 1000.0);
    assert_eq!(rows[1].net_balance, 330.0);
}

/// A 403 from upstream keeps its status and message.
#[test]
fn upstream_forbidden_keeps_status_and_message() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", BUDGET_PATH)
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":false,"message":"Forbidden"}"#)
        .create();

    let err = client_for(&server.url())
        .fetch_budget_history("Bearer expired")
        .expect_err("403 must surface as an error");

    mock.assert();
    match err {
        EngineError::Upstream { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Forbidden");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

/// A 2xx answer whose body is not the budget envelope becomes 502.
#[test]
fn undecodable_success_body_is_bad_gateway() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", BUDGET_PATH)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create();

    let err = client_for(&server.url())
        .fetch_budget_history("Bearer abc")
        .expect_err("non-JSON body must fail");
    assert_eq!(err.status(), 502);
}

/// Nothing listening on the target port maps to 502.
#[test]
fn unreachable_service_is_bad_gateway() {
    let err = client_for(&unbound_base_url())
        .fetch_budget_history("Bearer abc")
        .expect_err("connection should be refused");

    assert_eq!(err.status(), 502);
    assert!(matches!(err, EngineError::Upstream { status: 502, .. }));
}

/// Header values with control bytes are rejected as a malformed credential
/// before any request is sent.
#[test]
fn control_bytes_in_header_are_malformed_not_upstream() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", BUDGET_PATH)
        .match_header("authorization", Matcher::Any)
        .expect(0)
        .create();

    let err = client_for(&server.url())
        .fetch_budget_history("Bearer abc\ndef")
        .expect_err("newline in header must be rejected");

    mock.assert();
    assert!(matches!(err, EngineError::Auth(AuthError::MalformedHeader)));
    assert_eq!(err.status(), 403);
    assert_eq!(err.public_message(), "Malformed authorization header");
}
