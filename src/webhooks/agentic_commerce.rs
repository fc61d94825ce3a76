use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::models::{Order, OrderStatus, Refund};
use crate::webhooks::WebhookPublisher;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "Timestamp";
pub const SIGNATURE_HEADER: &str = "Merchant-Signature";

/// Webhook event types for Agentic Commerce Protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebhookEvent {
    OrderCreated { data: OrderEventData },
    OrderUpdated { data: OrderEventData },
}

impl WebhookEvent {
    pub fn order_created(order: &Order) -> Self {
        Self::OrderCreated {
            data: OrderEventData::from_order(order, Vec::new()),
        }
    }

    pub fn order_updated(order: &Order, refunds: Vec<Refund>) -> Self {
        Self::OrderUpdated {
            data: OrderEventData::from_order(order, refunds),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "order_created",
            Self::OrderUpdated { .. } => "order_updated",
        }
    }

    pub fn data(&self) -> &OrderEventData {
        match self {
            Self::OrderCreated { data } | Self::OrderUpdated { data } => data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventDataType {
    Order,
}

/// Order event data payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEventData {
    #[serde(rename = "type")]
    pub data_type: OrderEventDataType,
    pub checkout_session_id: String,
    pub permalink_url: String,
    pub status: OrderStatus,
    pub refunds: Vec<Refund>,
}

impl OrderEventData {
    fn from_order(order: &Order, refunds: Vec<Refund>) -> Self {
        Self {
            data_type: OrderEventDataType::Order,
            checkout_session_id: order.checkout_session_id.clone(),
            permalink_url: order.permalink_url.clone(),
            status: order.status,
            refunds,
        }
    }
}

/// HMAC signature generator for webhook authentication
pub struct SignatureGenerator {
    secret: String,
}

impl SignatureGenerator {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Hex HMAC-SHA256 over `"{timestamp}.{body}"`.
    pub fn sign_payload(&self, timestamp: &str, body: &str) -> Result<String, ServiceError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("Invalid webhook secret: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Delivers events to the agent platform over HTTPS with bounded retries.
pub struct HttpWebhookPublisher {
    client: reqwest::Client,
    webhook_url: String,
    signature_generator: Option<SignatureGenerator>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
    base_backoff: Duration,
}

impl HttpWebhookPublisher {
    pub fn new(
        webhook_url: String,
        webhook_secret: Option<String>,
        max_retries: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("Webhook client setup failed: {}", e)))?;

        Ok(Self {
            client,
            webhook_url,
            signature_generator: webhook_secret.map(SignatureGenerator::new),
            clock,
            max_retries: max_retries.max(1),
            base_backoff: Duration::from_secs(1),
        })
    }

    /// Overrides the first retry delay; later attempts double it.
    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }
}

#[async_trait]
impl WebhookPublisher for HttpWebhookPublisher {
    #[instrument(skip(self, event), fields(event = event.name(), url = %self.webhook_url))]
    async fn publish(&self, event: &WebhookEvent) -> Result<(), ServiceError> {
        let body = serde_json::to_string(event)?;
        let timestamp = self.clock.now().to_rfc3339();
        let signature = self
            .signature_generator
            .as_ref()
            .map(|generator| generator.sign_payload(&timestamp, &body))
            .transpose()?;

        for attempt in 1..=self.max_retries {
            let mut request = self
                .client
                .post(&self.webhook_url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header(TIMESTAMP_HEADER, &timestamp)
                .body(body.clone());

            if let Some(ref sig) = signature {
                request = request.header(SIGNATURE_HEADER, sig);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(attempt, "Webhook delivered");
                    return Ok(());
                }
                Ok(response) => {
                    warn!(
                        status = %response.status(),
                        "Webhook delivery rejected (attempt {}/{})",
                        attempt,
                        self.max_retries
                    );
                }
                Err(e) => {
                    warn!(
                        "Webhook delivery error: {} (attempt {}/{})",
                        e, attempt, self.max_retries
                    );
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.base_backoff * 2_u32.pow(attempt - 1)).await;
            }
        }

        error!("Webhook delivery failed after {} attempts", self.max_retries);
        Err(ServiceError::ExternalServiceError(format!(
            "Failed to deliver {} webhook after {} attempts",
            event.name(),
            self.max_retries
        )))
    }
}
