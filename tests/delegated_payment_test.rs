mod common;

use agentic_checkout::{
    errors::ServiceError,
    models::{RiskAction, RiskSignal},
};
use assert_matches::assert_matches;
use chrono::Duration;
use rstest::rstest;

use common::{delegate_request, TestApp};

#[tokio::test]
async fn replay_survives_allowance_expiry() {
    let app = TestApp::new();
    let request = delegate_request("csn_000001", Duration::minutes(5));

    let first = app
        .payments()
        .delegate_payment(request.clone(), Some("dp-expiry"))
        .await
        .unwrap();

    app.clock.advance(Duration::hours(1));
    let replay = app
        .payments()
        .delegate_payment(request.clone(), Some("dp-expiry"))
        .await
        .unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.value, first.value);

    // A fresh key re-validates against the advanced clock
    let fresh = app
        .payments()
        .delegate_payment(request, Some("dp-expiry-2"))
        .await
        .unwrap_err();
    assert_eq!(fresh.param(), Some("$.allowance.expires_at"));
    assert_eq!(app.payments().token_count(), 1);
}

#[tokio::test]
async fn different_payload_under_same_key_conflicts() {
    let app = TestApp::new();
    let request = delegate_request("csn_000001", Duration::hours(1));
    app.payments()
        .delegate_payment(request.clone(), Some("dp-1"))
        .await
        .unwrap();

    let mut changed = request;
    changed.allowance.max_amount = 9000;
    assert_matches!(
        app.payments().delegate_payment(changed, Some("dp-1")).await,
        Err(ServiceError::IdempotencyConflict(_))
    );
    assert_eq!(app.payments().token_count(), 1);
}

#[tokio::test]
async fn failed_issuance_is_not_recorded() {
    let app = TestApp::new();
    let mut request = delegate_request("csn_000001", Duration::hours(1));
    request.allowance.max_amount = 0;

    let err = app
        .payments()
        .delegate_payment(request.clone(), Some("dp-retry"))
        .await
        .unwrap_err();
    assert_eq!(err.param(), Some("$.allowance.max_amount"));

    request.allowance.max_amount = 2500;
    let issued = app
        .payments()
        .delegate_payment(request, Some("dp-retry"))
        .await
        .unwrap();
    assert!(!issued.replayed);
}

#[tokio::test]
async fn blocked_risk_signal_rejects_request() {
    let app = TestApp::new();
    let mut request = delegate_request("csn_000001", Duration::hours(1));
    request.risk_signals = vec![
        RiskSignal {
            signal_type: "card_testing".to_string(),
            score: 10,
            action: RiskAction::Authorized,
        },
        RiskSignal {
            signal_type: "velocity".to_string(),
            score: 95,
            action: RiskAction::Blocked,
        },
    ];

    let err = app.payments().delegate_payment(request, None).await.unwrap_err();
    assert_eq!(err.param(), Some("$.risk_signals"));
    assert!(err.response_message().contains("velocity"));
}

#[rstest]
#[case::wrong_type("type", "$.payment_method.type")]
#[case::short_number("number", "$.payment_method.number")]
#[case::expired_card("exp_year", "$.payment_method.exp_year")]
#[case::reason("reason", "$.allowance.reason")]
#[case::currency("currency", "$.allowance.currency")]
#[tokio::test]
async fn invalid_fields_are_named(#[case] field: &str, #[case] param: &str) {
    let app = TestApp::new();
    let mut request = delegate_request("csn_000001", Duration::hours(1));
    match field {
        "type" => request.payment_method.payment_type = "bank_account".to_string(),
        "number" => request.payment_method.number = "4242".to_string(),
        "exp_year" => request.payment_method.exp_year = Some("2020".to_string()),
        "reason" => request.allowance.reason = "recurring".to_string(),
        "currency" => request.allowance.currency = "us".to_string(),
        other => unreachable!("unexpected field {}", other),
    }

    let err = app.payments().delegate_payment(request, None).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError { .. });
    assert_eq!(err.param(), Some(param));
}

#[tokio::test]
async fn redeem_rejects_expired_token() {
    let app = TestApp::new();
    let token = app
        .payments()
        .delegate_payment(delegate_request("csn_000001", Duration::minutes(10)), None)
        .await
        .unwrap()
        .value;

    app.clock.advance(Duration::minutes(11));
    let err = app
        .payments()
        .redeem(&token.id, 100, "csn_000001")
        .await
        .unwrap_err();
    assert_eq!(err.param(), Some("$.allowance.expires_at"));
}
