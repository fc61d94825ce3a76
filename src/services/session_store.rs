use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::errors::ServiceError;
use crate::models::CheckoutSession;
use crate::webhooks::WebhookEvent;

/// A stored session plus delivery bookkeeping that never goes over the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session: CheckoutSession,
    /// Order events committed but not yet acknowledged by the webhook endpoint, oldest first.
    pub pending_events: Vec<WebhookEvent>,
}

impl SessionRecord {
    pub fn new(session: CheckoutSession) -> Self {
        Self {
            session,
            pending_events: Vec::new(),
        }
    }
}

/// In-process session map with per-session serialization.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<AsyncMutex<SessionRecord>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: CheckoutSession) -> Result<(), ServiceError> {
        match self.sessions.entry(session.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ServiceError::InternalError(
                format!("Checkout session {} already exists", session.id),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(AsyncMutex::new(SessionRecord::new(session))));
                Ok(())
            }
        }
    }

    pub async fn get(&self, session_id: &str) -> Result<CheckoutSession, ServiceError> {
        let slot = self.slot(session_id)?;
        let record = slot.lock().await;
        Ok(record.session.clone())
    }

    /// Runs `apply` against a copy of the record and commits the copy only on success.
    pub async fn update_if_present<T, F>(&self, session_id: &str, apply: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut SessionRecord) -> Result<T, ServiceError>,
    {
        let mut record = self.lock(session_id).await?;
        let mut draft = record.clone();
        let output = apply(&mut draft)?;
        *record = draft;
        Ok(output)
    }

    /// Exclusive access for critical sections that must await while holding the session.
    pub async fn lock(&self, session_id: &str) -> Result<OwnedMutexGuard<SessionRecord>, ServiceError> {
        Ok(self.slot(session_id)?.lock_owned().await)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn slot(&self, session_id: &str) -> Result<Arc<AsyncMutex<SessionRecord>>, ServiceError> {
        self.sessions
            .get(session_id)
            .map(|slot| slot.value().clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Checkout session {} not found", session_id))
            })
    }
}
