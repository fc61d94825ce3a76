//! Agentic Checkout merchant service
//!
//! Checkout session lifecycle, delegated payment tokens and idempotency-key
//! enforcement behind an axum HTTP surface.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod ids;
pub mod models;
pub mod services;
pub mod webhooks;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::auth::ApiKeyStore;
use crate::clock::Clock;
use crate::config::{AppConfig, AppConfigError};
use crate::handlers::commerce::{agentic_checkout_routes, delegate_payment_routes};
use crate::handlers::health::health_routes;
use crate::handlers::AppServices;
use crate::ids::IdGenerator;
use crate::services::{CheckoutService, DelegatedPaymentService, PricingEngine};
use crate::webhooks::{HttpWebhookPublisher, LoggingWebhookPublisher, WebhookPublisher};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    pub api_keys: ApiKeyStore,
}

impl AppState {
    /// Wires both engines from configuration around the given collaborators.
    pub fn from_config(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, AppConfigError> {
        let publisher: Arc<dyn WebhookPublisher> = match &config.webhook_url {
            Some(url) => {
                info!(%url, "Order webhook delivery enabled");
                Arc::new(HttpWebhookPublisher::new(
                    url.clone(),
                    config.webhook_secret.clone(),
                    config.webhook_max_retries,
                    clock.clone(),
                )?)
            }
            None => {
                info!("Webhook URL not configured; order events are logged only");
                Arc::new(LoggingWebhookPublisher)
            }
        };

        let pricing = PricingEngine::new(
            Arc::new(config.price_book()?),
            config.tax_rate()?,
            config.unknown_item_policy()?,
            clock.clone(),
            ids.clone(),
        );
        let checkout = CheckoutService::new(
            pricing,
            publisher,
            clock.clone(),
            ids.clone(),
            config.checkout_settings()?,
        );
        let delegated_payment = DelegatedPaymentService::new(clock, ids);

        Ok(Self {
            services: AppServices::new(Arc::new(checkout), Arc::new(delegated_payment)),
            api_keys: ApiKeyStore::new(config.api_keys.iter().cloned()),
        })
    }
}

/// Builds the full HTTP router. `/health` stays outside the bearer gate.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(agentic_checkout_routes())
        .merge(delegate_payment_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.api_keys.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .merge(api_routes)
        .merge(health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
