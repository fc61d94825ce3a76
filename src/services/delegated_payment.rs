use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::ids::{IdGenerator, IdKind};
use crate::models::{Amount, DelegatePaymentRequest, DelegatePaymentResponse, VaultToken};
use crate::services::idempotency::{IdempotencyBucket, IdempotencyLedger, IdempotentResult};

/// Issues and redeems single-use vault tokens bounded by an allowance.
pub struct DelegatedPaymentService {
    ledger: IdempotencyLedger<DelegatePaymentRequest, DelegatePaymentResponse>,
    tokens: DashMap<String, Arc<AsyncMutex<VaultToken>>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl DelegatedPaymentService {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ledger: IdempotencyLedger::new(),
            tokens: DashMap::new(),
            clock,
            ids,
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Process a delegated payment request and return a vault token
    #[instrument(skip(self, request, idempotency_key))]
    pub async fn delegate_payment(
        &self,
        request: DelegatePaymentRequest,
        idempotency_key: Option<&str>,
    ) -> Result<IdempotentResult<DelegatePaymentResponse>, ServiceError> {
        self.ledger
            .execute(
                &IdempotencyBucket::DelegatePayment,
                idempotency_key,
                &request,
                || async { self.issue_token(&request) },
            )
            .await
    }

    fn issue_token(
        &self,
        request: &DelegatePaymentRequest,
    ) -> Result<DelegatePaymentResponse, ServiceError> {
        let now = self.clock.now();
        let (max_amount, currency) = request.validate(now).map_err(|err| {
            warn!(error = %err, "Rejected delegated payment request");
            err
        })?;

        let allowance = &request.allowance;
        let mut metadata = request.metadata.clone();
        metadata
            .entry("merchant_id".to_string())
            .or_insert_with(|| allowance.merchant_id.clone());

        let token = VaultToken {
            id: self.ids.next_id(IdKind::VaultToken),
            max_amount,
            currency,
            checkout_session_id: allowance.checkout_session_id.clone(),
            merchant_id: allowance.merchant_id.clone(),
            expires_at: allowance.expires_at,
            display_brand: request.payment_method.display_brand.clone(),
            display_last4: request.payment_method.display_last4.clone(),
            created: now,
            metadata: metadata.clone(),
            redeemed_at: None,
            redeemed_amount: None,
        };

        let response = DelegatePaymentResponse {
            id: token.id.clone(),
            created: now,
            metadata,
        };
        self.tokens
            .insert(token.id.clone(), Arc::new(AsyncMutex::new(token)));

        info!(
            token_id = %response.id,
            checkout_session_id = %allowance.checkout_session_id,
            "Created vault token"
        );
        Ok(response)
    }

    /// Consume a token for `amount` against `checkout_session_id`. A token can be redeemed once.
    #[instrument(skip(self))]
    pub async fn redeem(
        &self,
        token_id: &str,
        amount: i64,
        checkout_session_id: &str,
    ) -> Result<VaultToken, ServiceError> {
        let slot = self
            .tokens
            .get(token_id)
            .map(|slot| slot.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Vault token {} not found", token_id)))?;
        let mut token = slot.lock().await;

        if token.redeemed_at.is_some() {
            warn!(%token_id, "Vault token reuse attempted");
            return Err(ServiceError::Conflict(format!(
                "Vault token {} has already been used",
                token_id
            )));
        }
        let now = self.clock.now();
        if token.expires_at <= now {
            return Err(ServiceError::invalid_field(
                "$.allowance.expires_at",
                format!("Vault token {} expired at {}", token_id, token.expires_at),
            ));
        }
        if token.checkout_session_id != checkout_session_id {
            return Err(ServiceError::Conflict(
                "Token is not valid for this checkout session".to_string(),
            ));
        }
        let amount = Amount::new(amount)
            .map_err(|err| ServiceError::invalid_field("$.amount", err.response_message()))?;
        if amount > token.max_amount {
            return Err(ServiceError::invalid_field(
                "$.allowance.max_amount",
                format!(
                    "Amount {} exceeds max allowance {}",
                    amount, token.max_amount
                ),
            ));
        }

        token.redeemed_at = Some(now);
        token.redeemed_amount = Some(amount);
        info!(%token_id, %amount, "Consumed vault token");
        Ok(token.clone())
    }
}
