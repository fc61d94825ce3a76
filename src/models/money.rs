use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ServiceError;

/// Largest amount, in minor units, accepted anywhere in the service.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Non-negative integer amount in the currency's smallest unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(value: i64) -> Result<Self, ServiceError> {
        if !(0..=MAX_AMOUNT).contains(&value) {
            return Err(ServiceError::validation(format!(
                "Amount {} is outside the supported range 0..={}",
                value, MAX_AMOUNT
            )));
        }
        Ok(Self(value))
    }

    /// Compile-time checked constructor for literal amounts.
    pub const fn from_const(value: i64) -> Self {
        assert!(value >= 0 && value <= MAX_AMOUNT, "amount out of range");
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount, ServiceError> {
        self.0
            .checked_add(other.0)
            .ok_or_else(overflow)
            .and_then(Amount::new)
    }

    pub fn checked_sub(self, other: Amount) -> Result<Amount, ServiceError> {
        self.0
            .checked_sub(other.0)
            .ok_or_else(overflow)
            .and_then(Amount::new)
    }

    pub fn checked_mul(self, factor: u32) -> Result<Amount, ServiceError> {
        self.0
            .checked_mul(i64::from(factor))
            .ok_or_else(overflow)
            .and_then(Amount::new)
    }

    pub fn sum<I>(amounts: I) -> Result<Amount, ServiceError>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

fn overflow() -> ServiceError {
    ServiceError::validation("Amount arithmetic overflowed")
}

impl TryFrom<i64> for Amount {
    type Error = ServiceError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 alphabetic code, normalized to lowercase as ACP transmits it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> Result<Self, ServiceError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ServiceError::validation(format!(
                "Currency '{}' must be a three-letter ISO 4217 code",
                code
            )));
        }
        Ok(Self(code.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Currency {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flat tax rate expressed as a fraction (0.0825 for 8.25%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TaxRate(Decimal);

impl TaxRate {
    pub fn new(rate: Decimal) -> Result<Self, ServiceError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(ServiceError::validation(format!(
                "Tax rate {} must be between 0 and 1",
                rate
            )));
        }
        Ok(Self(rate))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    /// `round_half_up(rate × amount)`, computed exactly in decimal.
    pub fn tax_on(self, amount: Amount) -> Result<Amount, ServiceError> {
        let product = self
            .0
            .checked_mul(Decimal::from(amount.value()))
            .ok_or_else(overflow)?;
        let rounded = product.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let minor = rounded.to_i64().ok_or_else(overflow)?;
        Amount::new(minor)
    }
}

impl TryFrom<Decimal> for TaxRate {
    type Error = ServiceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        TaxRate::new(value)
    }
}

impl From<TaxRate> for Decimal {
    fn from(rate: TaxRate) -> Self {
        rate.0
    }
}
