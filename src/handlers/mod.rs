pub mod commerce;
pub mod common;
pub mod health;

use std::sync::Arc;

use crate::services::{CheckoutService, DelegatedPaymentService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub agentic_checkout: Arc<CheckoutService>,
    pub delegated_payment: Arc<DelegatedPaymentService>,
}

impl AppServices {
    pub fn new(
        agentic_checkout: Arc<CheckoutService>,
        delegated_payment: Arc<DelegatedPaymentService>,
    ) -> Self {
        Self {
            agentic_checkout,
            delegated_payment,
        }
    }
}
