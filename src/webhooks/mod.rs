pub mod agentic_commerce;

pub use agentic_commerce::{HttpWebhookPublisher, OrderEventData, SignatureGenerator, WebhookEvent};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use crate::errors::ServiceError;

/// Outbound order notifications.
#[async_trait]
pub trait WebhookPublisher: Send + Sync {
    async fn publish(&self, event: &WebhookEvent) -> Result<(), ServiceError>;
}

/// Used when no webhook endpoint is configured: events are only logged.
#[derive(Debug, Default)]
pub struct LoggingWebhookPublisher;

#[async_trait]
impl WebhookPublisher for LoggingWebhookPublisher {
    async fn publish(&self, event: &WebhookEvent) -> Result<(), ServiceError> {
        let data = event.data();
        info!(
            event = event.name(),
            checkout_session_id = %data.checkout_session_id,
            status = ?data.status,
            "Webhook endpoint not configured; event logged only"
        );
        Ok(())
    }
}

/// Keeps published events in memory. Can be switched into a failing mode or
/// made to stall each delivery like a slow endpoint.
#[derive(Debug, Default)]
pub struct RecordingWebhookPublisher {
    events: Mutex<Vec<WebhookEvent>>,
    failing: AtomicBool,
    latency: Option<Duration>,
}

impl RecordingWebhookPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<WebhookEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WebhookPublisher for RecordingWebhookPublisher {
    async fn publish(&self, event: &WebhookEvent) -> Result<(), ServiceError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(format!(
                "{} delivery refused",
                event.name()
            )));
        }
        self.events
            .lock()
            .map_err(|_| ServiceError::InternalError("webhook recorder poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}
