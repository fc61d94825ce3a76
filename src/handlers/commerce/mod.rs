pub mod agentic_checkout;
pub mod delegate_payment;

pub use agentic_checkout::agentic_checkout_routes;
pub use delegate_payment::delegate_payment_routes;
