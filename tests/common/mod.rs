#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use agentic_checkout::{
    auth::ApiKeyStore,
    build_router,
    clock::{Clock, FixedClock},
    handlers::AppServices,
    ids::{IdGenerator, SequentialIdGenerator},
    models::{
        Address, Allowance, Amount, Buyer, CheckoutSessionCompleteRequest,
        CheckoutSessionCreateRequest, Currency, DelegatePaymentRequest, Item, Metadata,
        PaymentData, PaymentMethod, PaymentProvider, TaxRate,
    },
    services::{
        CheckoutService, CheckoutSettings, DelegatedPaymentService, PricingEngine,
        StaticPriceBook, UnknownItemPolicy,
    },
    webhooks::RecordingWebhookPublisher,
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;

pub const MERCHANT_ID: &str = "merchant_123";
pub const API_KEY: &str = "api_key_test_123";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Engines wired around a fixed clock, sequential ids and an in-memory webhook sink.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub clock: Arc<FixedClock>,
    pub webhooks: Arc<RecordingWebhookPublisher>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(UnknownItemPolicy::DefaultPrice(Amount::new(5000).unwrap()), &[])
    }

    pub fn with_api_keys(keys: &[&str]) -> Self {
        Self::with_policy(UnknownItemPolicy::DefaultPrice(Amount::new(5000).unwrap()), keys)
    }

    pub fn with_policy(policy: UnknownItemPolicy, api_keys: &[&str]) -> Self {
        Self::build(policy, api_keys, RecordingWebhookPublisher::new())
    }

    /// Every webhook delivery stalls for `latency`, widening the completion window.
    pub fn with_slow_webhooks(latency: StdDuration) -> Self {
        Self::build(
            UnknownItemPolicy::DefaultPrice(Amount::new(5000).unwrap()),
            &[],
            RecordingWebhookPublisher::new().with_latency(latency),
        )
    }

    fn build(
        policy: UnknownItemPolicy,
        api_keys: &[&str],
        webhooks: RecordingWebhookPublisher,
    ) -> Self {
        let clock = Arc::new(FixedClock::new(start_time()));
        let ids: Arc<dyn IdGenerator> = Arc::new(SequentialIdGenerator::new());
        let webhooks = Arc::new(webhooks);

        let pricing = PricingEngine::new(
            Arc::new(StaticPriceBook::default().with_price("item_123", Amount::new(1500).unwrap())),
            TaxRate::new(dec!(0.0825)).unwrap(),
            policy,
            clock.clone() as Arc<dyn Clock>,
            ids.clone(),
        );
        let checkout = CheckoutService::new(
            pricing,
            webhooks.clone(),
            clock.clone(),
            ids.clone(),
            CheckoutSettings {
                currency: Currency::parse("usd").unwrap(),
                payment_provider: PaymentProvider {
                    provider: "stripe".to_string(),
                    supported_payment_methods: vec!["card".to_string()],
                },
                merchant_base_url: "https://merchant.example.com".to_string(),
            },
        );
        let delegated_payment = DelegatedPaymentService::new(clock.clone(), ids);

        let state = AppState {
            services: AppServices::new(Arc::new(checkout), Arc::new(delegated_payment)),
            api_keys: ApiKeyStore::new(api_keys.iter().copied()),
        };

        Self {
            router: build_router(state.clone()),
            state,
            clock,
            webhooks,
        }
    }

    pub fn checkout(&self) -> &CheckoutService {
        &self.state.services.agentic_checkout
    }

    pub fn shared_checkout(&self) -> Arc<CheckoutService> {
        self.state.services.agentic_checkout.clone()
    }

    pub fn payments(&self) -> &DelegatedPaymentService {
        &self.state.services.delegated_payment
    }

    /// Send a JSON request through the router with extra headers.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("parse response body")
}

pub fn buyer() -> Buyer {
    Buyer {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        phone_number: None,
    }
}

pub fn address() -> Address {
    Address {
        name: "Ada Lovelace".to_string(),
        line_one: "123 Example St".to_string(),
        line_two: None,
        city: "San Francisco".to_string(),
        state: "CA".to_string(),
        country: "US".to_string(),
        postal_code: "94105".to_string(),
    }
}

pub fn create_request(quantity: i32, with_address: bool) -> CheckoutSessionCreateRequest {
    CheckoutSessionCreateRequest {
        buyer: Some(buyer()),
        items: vec![Item {
            id: "item_123".to_string(),
            quantity,
        }],
        fulfillment_address: with_address.then(address),
    }
}

pub fn complete_request(token: &str) -> CheckoutSessionCompleteRequest {
    CheckoutSessionCompleteRequest {
        buyer: None,
        payment_data: PaymentData {
            token: token.to_string(),
            provider: "stripe".to_string(),
            billing_address: None,
        },
    }
}

pub fn delegate_request(checkout_session_id: &str, expires_in: Duration) -> DelegatePaymentRequest {
    DelegatePaymentRequest {
        payment_method: PaymentMethod {
            payment_type: "card".to_string(),
            card_number_type: "fpan".to_string(),
            number: "4242424242424242".to_string(),
            exp_month: Some("11".to_string()),
            exp_year: Some("2030".to_string()),
            name: Some("Ada Lovelace".to_string()),
            cvc: Some("123".to_string()),
            cryptogram: None,
            eci_value: None,
            checks_performed: None,
            iin: None,
            display_card_funding_type: "credit".to_string(),
            display_wallet_type: None,
            display_brand: Some("visa".to_string()),
            display_last4: Some("4242".to_string()),
            metadata: Metadata::new(),
        },
        allowance: Allowance {
            reason: "one_time".to_string(),
            max_amount: 5000,
            currency: "usd".to_string(),
            checkout_session_id: checkout_session_id.to_string(),
            merchant_id: MERCHANT_ID.to_string(),
            expires_at: start_time() + expires_in,
        },
        billing_address: None,
        risk_signals: vec![],
        metadata: Metadata::new(),
    }
}
