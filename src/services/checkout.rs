use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::ids::{IdGenerator, IdKind};
use crate::models::{
    Amount, CheckoutSession, CheckoutSessionCompleteRequest, CheckoutSessionCreateRequest,
    CheckoutSessionStatus, CheckoutSessionUpdateRequest, Currency, Item, Link, LinkType, Message,
    Order, OrderStatus, PaymentProvider, Refund, TotalType,
};
use crate::services::idempotency::{IdempotencyBucket, IdempotencyLedger, IdempotentResult};
use crate::services::pricing::{PricedCart, PricingEngine};
use crate::services::session_store::{SessionRecord, SessionStore};
use crate::webhooks::{WebhookEvent, WebhookPublisher};

/// Merchant-level values stamped onto every session.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: Currency,
    pub payment_provider: PaymentProvider,
    pub merchant_base_url: String,
}

/// Checkout session lifecycle: create, update, retrieve, complete, cancel and
/// post-completion order updates.
pub struct CheckoutService {
    store: SessionStore,
    pricing: PricingEngine,
    create_ledger: IdempotencyLedger<CheckoutSessionCreateRequest, CheckoutSession>,
    complete_ledger: IdempotencyLedger<CheckoutSessionCompleteRequest, CheckoutSession>,
    publisher: Arc<dyn WebhookPublisher>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        pricing: PricingEngine,
        publisher: Arc<dyn WebhookPublisher>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store: SessionStore::new(),
            pricing,
            create_ledger: IdempotencyLedger::new(),
            complete_ledger: IdempotencyLedger::new(),
            publisher,
            clock,
            ids,
            settings,
        }
    }

    /// Create checkout session
    #[instrument(skip(self, request, idempotency_key))]
    pub async fn create_session(
        &self,
        request: CheckoutSessionCreateRequest,
        idempotency_key: Option<&str>,
    ) -> Result<IdempotentResult<CheckoutSession>, ServiceError> {
        self.create_ledger
            .execute(
                &IdempotencyBucket::CreateCheckoutSession,
                idempotency_key,
                &request,
                || async { self.create_session_inner(&request) },
            )
            .await
    }

    fn create_session_inner(
        &self,
        request: &CheckoutSessionCreateRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        request.validate()?;
        let priced = self
            .pricing
            .price(&request.items, None, request.fulfillment_address.as_ref())?;

        let now = self.clock.now();
        let mut session = CheckoutSession {
            id: self.ids.next_id(IdKind::CheckoutSession),
            buyer: request.buyer.clone(),
            payment_provider: self.settings.payment_provider.clone(),
            status: CheckoutSessionStatus::NotReadyForPayment,
            currency: self.settings.currency.clone(),
            line_items: Vec::new(),
            fulfillment_address: request.fulfillment_address.clone(),
            fulfillment_options: Vec::new(),
            fulfillment_option_id: None,
            totals: Vec::new(),
            messages: Vec::new(),
            links: self.links(),
            order: None,
            created_at: now,
            updated_at: now,
        };
        apply_pricing(&mut session, priced)?;

        self.store.insert(session.clone())?;
        info!(session_id = %session.id, status = %session.status, "Created checkout session");
        Ok(session)
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Get checkout session
    pub async fn get_session(&self, session_id: &str) -> Result<CheckoutSession, ServiceError> {
        self.store.get(session_id).await
    }

    /// Update checkout session
    #[instrument(skip(self, request))]
    pub async fn update_session(
        &self,
        session_id: &str,
        request: CheckoutSessionUpdateRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        request.validate()?;
        let now = self.clock.now();

        let session = self
            .store
            .update_if_present(session_id, |record| {
                let session = &mut record.session;
                if session.status.is_terminal() {
                    return Err(ServiceError::Conflict(format!(
                        "Checkout session is immutable in status {}",
                        session.status
                    )));
                }

                if let Some(buyer) = request.buyer {
                    session.buyer = Some(buyer);
                }
                if let Some(address) = request.fulfillment_address {
                    session.fulfillment_address = Some(address);
                }
                let items = request.items.unwrap_or_else(|| requested_items(session));
                let option_id = request
                    .fulfillment_option_id
                    .or_else(|| session.fulfillment_option_id.clone());

                let priced = self.pricing.price(
                    &items,
                    option_id.as_deref(),
                    session.fulfillment_address.as_ref(),
                )?;
                apply_pricing(session, priced)?;
                session.updated_at = now;
                Ok(session.clone())
            })
            .await
            .map_err(|err| {
                warn!(%session_id, error = %err, "Rejected checkout session update");
                err
            })?;

        info!(session_id = %session.id, status = %session.status, "Updated checkout session");
        Ok(session)
    }

    /// Complete checkout session
    #[instrument(skip(self, request, idempotency_key))]
    pub async fn complete_session(
        &self,
        session_id: &str,
        request: CheckoutSessionCompleteRequest,
        idempotency_key: Option<&str>,
    ) -> Result<IdempotentResult<CheckoutSession>, ServiceError> {
        self.complete_ledger
            .execute(
                &IdempotencyBucket::CompleteCheckoutSession(session_id.to_string()),
                idempotency_key,
                &request,
                || self.complete_session_inner(session_id, &request),
            )
            .await
    }

    async fn complete_session_inner(
        &self,
        session_id: &str,
        request: &CheckoutSessionCompleteRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        request.validate()?;
        let mut record = self.store.lock(session_id).await?;

        match record.session.status {
            CheckoutSessionStatus::Completed => {
                self.flush_pending_events(&mut record).await?;
                return Ok(record.session.clone());
            }
            CheckoutSessionStatus::Canceled => {
                warn!(%session_id, "Attempt to complete a canceled session");
                return Err(ServiceError::Conflict(
                    "Cannot complete a canceled session".to_string(),
                ));
            }
            _ => {}
        }

        let mut draft = record.session.clone();
        if let Some(buyer) = &request.buyer {
            draft.buyer = Some(buyer.clone());
        }
        let priced = self.pricing.price(
            &requested_items(&draft),
            draft.fulfillment_option_id.as_deref(),
            draft.fulfillment_address.as_ref(),
        )?;
        apply_pricing(&mut draft, priced)?;

        if draft.status != CheckoutSessionStatus::ReadyForPayment {
            return Err(ServiceError::Conflict(format!(
                "Checkout session {} is not ready for payment",
                session_id
            )));
        }
        if draft.payment_provider.provider != request.payment_data.provider {
            return Err(ServiceError::Conflict(format!(
                "Payment provider {} is not supported for this session",
                request.payment_data.provider
            )));
        }

        transition(&mut draft, CheckoutSessionStatus::InProgress)?;
        transition(&mut draft, CheckoutSessionStatus::Completed)?;

        let order = self.issue_order(&draft.id);
        draft.order = Some(order.clone());
        draft.updated_at = self.clock.now();

        record.session = draft;
        record.pending_events.push(WebhookEvent::order_created(&order));
        info!(%session_id, order_id = %order.id, "Completed checkout session");

        self.flush_pending_events(&mut record).await?;
        Ok(record.session.clone())
    }

    /// Cancel checkout session
    #[instrument(skip(self))]
    pub async fn cancel_session(&self, session_id: &str) -> Result<CheckoutSession, ServiceError> {
        let now = self.clock.now();

        let session = self
            .store
            .update_if_present(session_id, |record| {
                let session = &mut record.session;
                match session.status {
                    CheckoutSessionStatus::Completed => {
                        return Err(ServiceError::Conflict(
                            "Cannot cancel a completed session".to_string(),
                        ))
                    }
                    CheckoutSessionStatus::Canceled => {
                        return Err(ServiceError::Conflict(
                            "Session is already canceled".to_string(),
                        ))
                    }
                    _ => {}
                }

                transition(session, CheckoutSessionStatus::Canceled)?;
                session.messages = vec![Message::info("Checkout session canceled")];
                session.order = None;
                session.updated_at = now;
                Ok(session.clone())
            })
            .await
            .map_err(|err| {
                warn!(%session_id, error = %err, "Rejected checkout session cancel");
                err
            })?;

        info!(session_id = %session.id, "Canceled checkout session");
        Ok(session)
    }

    /// Moves the order of a completed session to `status` and emits `order_updated`.
    #[instrument(skip(self, refunds))]
    pub async fn update_order(
        &self,
        session_id: &str,
        status: OrderStatus,
        refunds: Vec<Refund>,
    ) -> Result<CheckoutSession, ServiceError> {
        let mut record = self.store.lock(session_id).await?;
        if record.session.status != CheckoutSessionStatus::Completed {
            return Err(ServiceError::Conflict(format!(
                "Order updates require a completed session; {} is {}",
                session_id, record.session.status
            )));
        }

        let refunded = Amount::sum(refunds.iter().map(|refund| refund.amount))
            .map_err(|_| ServiceError::invalid_field("$.refunds", "Refund total is too large"))?;
        let charged = record
            .session
            .total_of(TotalType::Total)
            .unwrap_or(Amount::ZERO);
        if refunded > charged {
            return Err(ServiceError::invalid_field(
                "$.refunds",
                format!("Refunds of {} exceed the order total of {}", refunded, charged),
            ));
        }

        let now = self.clock.now();
        let event = {
            let order = record.session.order.as_mut().ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Completed session {} has no order",
                    session_id
                ))
            })?;
            order.status = status;
            WebhookEvent::order_updated(order, refunds)
        };
        record.session.updated_at = now;
        record.pending_events.push(event);
        info!(%session_id, ?status, "Updated order");

        self.flush_pending_events(&mut record).await?;
        Ok(record.session.clone())
    }

    /// Publishes queued events in order, stopping at the first failure.
    /// Undelivered events stay queued for the next flush.
    async fn flush_pending_events(&self, record: &mut SessionRecord) -> Result<(), ServiceError> {
        while let Some(event) = record.pending_events.first() {
            if let Err(err) = self.publisher.publish(event).await {
                warn!(
                    session_id = %record.session.id,
                    event = event.name(),
                    error = %err,
                    "Order webhook delivery failed; event kept pending"
                );
                return Err(err);
            }
            record.pending_events.remove(0);
        }
        Ok(())
    }

    fn issue_order(&self, session_id: &str) -> Order {
        let order_id = self.ids.next_id(IdKind::Order);
        Order {
            permalink_url: format!(
                "{}/orders/{}",
                self.settings.merchant_base_url.trim_end_matches('/'),
                order_id
            ),
            id: order_id,
            checkout_session_id: session_id.to_string(),
            status: OrderStatus::Created,
        }
    }

    fn links(&self) -> Vec<Link> {
        let base = self.settings.merchant_base_url.trim_end_matches('/');
        vec![
            Link {
                link_type: LinkType::TermsOfUse,
                url: format!("{}/terms", base),
            },
            Link {
                link_type: LinkType::PrivacyPolicy,
                url: format!("{}/privacy", base),
            },
        ]
    }
}

fn requested_items(session: &CheckoutSession) -> Vec<Item> {
    session
        .line_items
        .iter()
        .map(|line| line.item.clone())
        .collect()
}

fn transition(
    session: &mut CheckoutSession,
    next: CheckoutSessionStatus,
) -> Result<(), ServiceError> {
    if !session.status.can_transition_to(next) {
        return Err(ServiceError::Conflict(format!(
            "Checkout session cannot move from {} to {}",
            session.status, next
        )));
    }
    session.status = next;
    Ok(())
}

fn apply_pricing(session: &mut CheckoutSession, priced: PricedCart) -> Result<(), ServiceError> {
    let next = if priced.is_ready() {
        CheckoutSessionStatus::ReadyForPayment
    } else {
        CheckoutSessionStatus::NotReadyForPayment
    };
    transition(session, next)?;

    session.line_items = priced.line_items;
    session.fulfillment_options = priced.fulfillment_options;
    session.fulfillment_option_id = priced.fulfillment_option_id;
    session.totals = priced.totals;
    session.messages = priced.messages;
    Ok(())
}
