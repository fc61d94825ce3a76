pub mod checkout;
pub mod delegated_payment;
pub mod idempotency;
pub mod pricing;
pub mod session_store;

pub use checkout::{CheckoutService, CheckoutSettings};
pub use delegated_payment::DelegatedPaymentService;
pub use idempotency::{IdempotencyBucket, IdempotencyLedger, IdempotentResult};
pub use pricing::{PriceBook, PricingEngine, StaticPriceBook, UnknownItemPolicy};
