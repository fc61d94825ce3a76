use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::errors::ServiceError;

pub const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 255;

/// Logical operation an idempotency key is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdempotencyBucket {
    CreateCheckoutSession,
    CompleteCheckoutSession(String),
    DelegatePayment,
}

impl fmt::Display for IdempotencyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateCheckoutSession => f.write_str("create_checkout_session"),
            Self::CompleteCheckoutSession(session_id) => {
                write!(f, "complete_checkout_session/{}", session_id)
            }
            Self::DelegatePayment => f.write_str("delegate_payment"),
        }
    }
}

/// Operation output plus whether it came from the ledger instead of a fresh run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotentResult<T> {
    pub value: T,
    pub replayed: bool,
}

impl<T> IdempotentResult<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            replayed: false,
        }
    }

    pub fn replayed(value: T) -> Self {
        Self {
            value,
            replayed: true,
        }
    }
}

struct LedgerEntry<Req, Res> {
    request: Req,
    response: Res,
}

type Slot<Req, Res> = Arc<AsyncMutex<Option<LedgerEntry<Req, Res>>>>;

/// At-most-once guard for keyed operations.
///
/// Each `(bucket, key)` pair owns a slot behind its own async mutex, so the
/// check-then-run sequence is atomic per key while distinct keys proceed in
/// parallel. Only successful outcomes are recorded; a failed run releases its
/// slot and the next retry executes again.
pub struct IdempotencyLedger<Req, Res> {
    slots: DashMap<String, Slot<Req, Res>>,
}

impl<Req, Res> Default for IdempotencyLedger<Req, Res> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<Req, Res> IdempotencyLedger<Req, Res>
where
    Req: PartialEq + Clone + Send,
    Res: Clone + Send,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn execute<F, Fut>(
        &self,
        bucket: &IdempotencyBucket,
        key: Option<&str>,
        request: &Req,
        operation: F,
    ) -> Result<IdempotentResult<Res>, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Res, ServiceError>>,
    {
        let Some(key) = key.map(str::trim).filter(|key| !key.is_empty()) else {
            return operation().await.map(IdempotentResult::fresh);
        };

        let slot_key = format!("{}:{}", bucket, hash_idempotency_key(key)?);
        let slot = self
            .slots
            .entry(slot_key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone();

        let mut entry = slot.lock().await;
        if let Some(existing) = entry.as_ref() {
            if existing.request == *request {
                debug!(%bucket, "Replaying stored idempotent result");
                return Ok(IdempotentResult::replayed(existing.response.clone()));
            }
            warn!(%bucket, "Idempotency key reused with a different request");
            return Err(ServiceError::IdempotencyConflict(
                "Idempotency key reused with different request".to_string(),
            ));
        }

        let response = match operation().await {
            Ok(response) => response,
            Err(err) => {
                drop(entry);
                self.release_unused(&slot_key, &slot);
                return Err(err);
            }
        };
        *entry = Some(LedgerEntry {
            request: request.clone(),
            response: response.clone(),
        });
        Ok(IdempotentResult::fresh(response))
    }

    /// Drops an empty slot nobody else is waiting on. Callers that cloned the
    /// slot keep it alive, so a concurrent retry still runs against it.
    fn release_unused(&self, slot_key: &str, slot: &Slot<Req, Res>) {
        self.slots.remove_if(slot_key, |_, stored| {
            Arc::ptr_eq(stored, slot)
                && Arc::strong_count(stored) == 2
                && stored.try_lock().map(|entry| entry.is_none()).unwrap_or(false)
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn hash_idempotency_key(key: &str) -> Result<String, ServiceError> {
    if key.len() > MAX_IDEMPOTENCY_KEY_LENGTH {
        return Err(ServiceError::validation(format!(
            "Idempotency key must be {} characters or fewer",
            MAX_IDEMPOTENCY_KEY_LENGTH
        )));
    }
    if !key.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ServiceError::validation(
            "Idempotency key must contain visible ASCII characters only",
        ));
    }

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
