pub mod checkout;
pub mod delegated_payment;
pub mod money;
pub mod validation;

pub use checkout::*;
pub use delegated_payment::*;
pub use money::{Amount, Currency, TaxRate};
