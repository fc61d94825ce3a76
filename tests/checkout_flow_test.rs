mod common;

use agentic_checkout::{
    errors::ServiceError,
    models::{
        CheckoutSessionStatus, CheckoutSessionUpdateRequest, Item, Message, MessageCode,
        OrderStatus, Refund, RefundType, TotalType,
    },
    services::UnknownItemPolicy,
};
use assert_matches::assert_matches;
use chrono::Duration;
use futures::future::join_all;
use std::time::Duration as StdDuration;

use common::{address, complete_request, create_request, delegate_request, TestApp};

fn ladder(session: &agentic_checkout::models::CheckoutSession) -> Vec<(TotalType, i64)> {
    session
        .totals
        .iter()
        .map(|total| (total.total_type, total.amount.value()))
        .collect()
}

#[tokio::test]
async fn single_item_is_priced_with_flat_tax() {
    let app = TestApp::new();
    let session = app
        .checkout()
        .create_session(create_request(1, true), None)
        .await
        .unwrap()
        .value;

    let line = &session.line_items[0];
    assert_eq!(line.id, "line_000001");
    assert_eq!(line.base_amount.value(), 1500);
    assert_eq!(line.discount.value(), 0);
    assert_eq!(line.subtotal.value(), 1500);
    assert_eq!(line.tax.value(), 124);
    assert_eq!(line.total.value(), 1624);

    assert_eq!(
        ladder(&session),
        vec![
            (TotalType::ItemsBaseAmount, 1500),
            (TotalType::ItemsDiscount, 0),
            (TotalType::Subtotal, 1500),
            (TotalType::Tax, 124),
            (TotalType::Fulfillment, 541),
            (TotalType::Total, 2165),
        ]
    );
}

#[tokio::test]
async fn missing_address_blocks_readiness_until_supplied() {
    let app = TestApp::new();
    let session = app
        .checkout()
        .create_session(create_request(1, false), None)
        .await
        .unwrap()
        .value;

    assert_eq!(session.status, CheckoutSessionStatus::NotReadyForPayment);
    assert_matches!(
        &session.messages[..],
        [Message::Error(error)]
            if error.code == MessageCode::Missing
                && error.param.as_deref() == Some("$.fulfillment_address")
    );

    let result = app
        .checkout()
        .complete_session(&session.id, complete_request("vt_1"), None)
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    let ready = app
        .checkout()
        .update_session(
            &session.id,
            CheckoutSessionUpdateRequest {
                fulfillment_address: Some(address()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ready.status, CheckoutSessionStatus::ReadyForPayment);
    assert!(ready.messages.is_empty());
}

#[tokio::test]
async fn digital_delivery_does_not_need_an_address() {
    let app = TestApp::new();
    let session = app
        .checkout()
        .create_session(create_request(1, false), None)
        .await
        .unwrap()
        .value;

    let updated = app
        .checkout()
        .update_session(
            &session.id,
            CheckoutSessionUpdateRequest {
                fulfillment_option_id: Some("digital_delivery".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, CheckoutSessionStatus::ReadyForPayment);
    assert_eq!(updated.total_of(TotalType::Fulfillment).unwrap().value(), 0);
    assert_eq!(updated.total_of(TotalType::Total).unwrap().value(), 1624);
}

#[tokio::test]
async fn update_replaces_items_and_keeps_other_fields() {
    let app = TestApp::new();
    let session = app
        .checkout()
        .create_session(create_request(1, true), None)
        .await
        .unwrap()
        .value;

    let updated = app
        .checkout()
        .update_session(
            &session.id,
            CheckoutSessionUpdateRequest {
                items: Some(vec![
                    Item {
                        id: "item_123".to_string(),
                        quantity: 2,
                    },
                    Item {
                        id: "item_unknown".to_string(),
                        quantity: 1,
                    },
                ]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.id, session.id);
    assert_eq!(updated.buyer, session.buyer);
    assert_eq!(updated.fulfillment_address, session.fulfillment_address);
    assert_eq!(updated.line_items.len(), 2);
    assert_eq!(updated.line_items[1].base_amount.value(), 5000);
    assert_eq!(
        updated.total_of(TotalType::Subtotal).unwrap().value(),
        3000 + 5000
    );
}

#[tokio::test]
async fn reject_policy_names_the_unknown_item() {
    let app = TestApp::with_policy(UnknownItemPolicy::Reject, &[]);
    let mut request = create_request(1, true);
    request.items.push(Item {
        id: "item_missing".to_string(),
        quantity: 1,
    });

    let err = app.checkout().create_session(request, None).await.unwrap_err();
    assert_eq!(err.param(), Some("$.items[1].id"));
    assert_eq!(app.checkout().session_count(), 0);
}

#[tokio::test]
async fn create_with_same_key_replays_and_different_payload_conflicts() {
    let app = TestApp::new();
    let first = app
        .checkout()
        .create_session(create_request(1, true), Some("create-1"))
        .await
        .unwrap();
    let second = app
        .checkout()
        .create_session(create_request(1, true), Some("create-1"))
        .await
        .unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.value, second.value);
    assert_eq!(app.checkout().session_count(), 1);

    let conflict = app
        .checkout()
        .create_session(create_request(3, true), Some("create-1"))
        .await;
    assert_matches!(conflict, Err(ServiceError::IdempotencyConflict(_)));
    assert_eq!(app.checkout().session_count(), 1);
}

#[tokio::test]
async fn complete_on_canceled_session_conflicts() {
    let app = TestApp::new();
    let session = app
        .checkout()
        .create_session(create_request(1, true), None)
        .await
        .unwrap()
        .value;
    app.checkout().cancel_session(&session.id).await.unwrap();

    let result = app
        .checkout()
        .complete_session(&session.id, complete_request("vt_1"), None)
        .await;
    assert_matches!(
        result,
        Err(ServiceError::Conflict(msg)) if msg == "Cannot complete a canceled session"
    );
    assert!(app.webhooks.events().is_empty());
}

#[tokio::test]
async fn terminal_sessions_are_immutable() {
    let app = TestApp::new();
    let session = app
        .checkout()
        .create_session(create_request(1, true), None)
        .await
        .unwrap()
        .value;
    let completed = app
        .checkout()
        .complete_session(&session.id, complete_request("vt_1"), None)
        .await
        .unwrap()
        .value;

    let update = app
        .checkout()
        .update_session(
            &session.id,
            CheckoutSessionUpdateRequest {
                fulfillment_option_id: Some("express_shipping".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(
        update,
        Err(ServiceError::Conflict(msg)) if msg.contains("immutable in status completed")
    );
    assert_matches!(
        app.checkout().cancel_session(&session.id).await,
        Err(ServiceError::Conflict(msg)) if msg == "Cannot cancel a completed session"
    );
    assert_eq!(app.checkout().get_session(&session.id).await.unwrap(), completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completes_with_same_key_issue_one_order() {
    let app = TestApp::with_slow_webhooks(StdDuration::from_millis(50));
    let session = app
        .checkout()
        .create_session(create_request(1, true), None)
        .await
        .unwrap()
        .value;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let checkout = app.shared_checkout();
            let session_id = session.id.clone();
            tokio::spawn(async move {
                checkout
                    .complete_session(&session_id, complete_request("vt_1"), Some("complete-1"))
                    .await
            })
        })
        .collect();

    let sessions: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    assert_eq!(sessions.iter().filter(|r| !r.replayed).count(), 1);
    let order = sessions[0].value.order.clone().unwrap();
    assert!(sessions
        .iter()
        .all(|r| r.value.order.as_ref() == Some(&order)));

    let events = app.webhooks.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "order_created");
    assert_eq!(events[0].data().checkout_session_id, session.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completes_without_key_still_issue_one_order() {
    let app = TestApp::with_slow_webhooks(StdDuration::from_millis(50));
    let session = app
        .checkout()
        .create_session(create_request(1, true), None)
        .await
        .unwrap()
        .value;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let checkout = app.shared_checkout();
            let session_id = session.id.clone();
            tokio::spawn(async move {
                checkout
                    .complete_session(&session_id, complete_request("vt_1"), None)
                    .await
            })
        })
        .collect();

    let orders: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().value.order.unwrap().id)
        .collect();
    assert!(orders.iter().all(|id| id == "ord_000001"));
    assert_eq!(app.webhooks.events().len(), 1);
}

#[tokio::test]
async fn complete_key_reused_with_other_payment_data_conflicts() {
    let app = TestApp::new();
    let session = app
        .checkout()
        .create_session(create_request(1, true), None)
        .await
        .unwrap()
        .value;
    app.checkout()
        .complete_session(&session.id, complete_request("vt_1"), Some("complete-1"))
        .await
        .unwrap();

    assert_matches!(
        app.checkout()
            .complete_session(&session.id, complete_request("vt_2"), Some("complete-1"))
            .await,
        Err(ServiceError::IdempotencyConflict(_))
    );
    // An invalid payload under a used key is reported as a key conflict
    assert_matches!(
        app.checkout()
            .complete_session(&session.id, complete_request(""), Some("complete-1"))
            .await,
        Err(ServiceError::IdempotencyConflict(_))
    );
    assert_eq!(app.webhooks.events().len(), 1);
}

#[tokio::test]
async fn create_key_reused_with_invalid_payload_conflicts() {
    let app = TestApp::new();
    app.checkout()
        .create_session(create_request(1, true), Some("create-1"))
        .await
        .unwrap();

    let mut invalid = create_request(1, true);
    invalid.items.clear();
    assert_matches!(
        app.checkout().create_session(invalid.clone(), Some("create-1")).await,
        Err(ServiceError::IdempotencyConflict(_))
    );

    // Without a recorded key the same payload fails validation
    let err = app
        .checkout()
        .create_session(invalid, Some("create-2"))
        .await
        .unwrap_err();
    assert_eq!(err.param(), Some("$.items"));
    assert_eq!(app.checkout().session_count(), 1);
}

#[tokio::test]
async fn delegated_token_is_redeemed_for_the_completed_total() {
    let app = TestApp::new();
    let session = app
        .checkout()
        .create_session(create_request(1, true), None)
        .await
        .unwrap()
        .value;

    let token = app
        .payments()
        .delegate_payment(delegate_request(&session.id, Duration::hours(1)), None)
        .await
        .unwrap()
        .value;

    let completed = app
        .checkout()
        .complete_session(&session.id, complete_request(&token.id), None)
        .await
        .unwrap()
        .value;
    let total = completed.total_of(TotalType::Total).unwrap().value();

    let redeemed = app
        .payments()
        .redeem(&token.id, total, &session.id)
        .await
        .unwrap();
    assert_eq!(redeemed.redeemed_amount.unwrap().value(), total);
    assert_matches!(
        app.payments().redeem(&token.id, total, &session.id).await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn order_updates_publish_refunds() {
    let app = TestApp::new();
    let session = app
        .checkout()
        .create_session(create_request(1, true), None)
        .await
        .unwrap()
        .value;
    app.checkout()
        .complete_session(&session.id, complete_request("vt_1"), None)
        .await
        .unwrap();

    let refunds = vec![Refund {
        refund_type: RefundType::OriginalPayment,
        amount: agentic_checkout::models::Amount::new(500).unwrap(),
    }];
    let updated = app
        .checkout()
        .update_order(&session.id, OrderStatus::Canceled, refunds.clone())
        .await
        .unwrap();

    assert_eq!(updated.order.unwrap().status, OrderStatus::Canceled);
    let events = app.webhooks.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].data().refunds, refunds);

    let too_much = vec![Refund {
        refund_type: RefundType::StoreCredit,
        amount: agentic_checkout::models::Amount::new(1_000_000).unwrap(),
    }];
    let err = app
        .checkout()
        .update_order(&session.id, OrderStatus::Fulfilled, too_much)
        .await
        .unwrap_err();
    assert_eq!(err.param(), Some("$.refunds"));
    assert_eq!(app.webhooks.events().len(), 2);
}
