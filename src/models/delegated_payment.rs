use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::ServiceError;
use crate::models::money::{Amount, Currency};
use crate::models::validation::{ensure_ascii_identifier, ensure_country_code, ensure_non_empty};

pub type Metadata = BTreeMap<String, String>;

// Request types

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegatePaymentRequest {
    pub payment_method: PaymentMethod,
    pub allowance: Allowance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<BillingAddress>,
    #[serde(default)]
    pub risk_signals: Vec<RiskSignal>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DelegatePaymentRequest {
    /// Structural and temporal checks against `now`. Returns the parsed allowance
    /// amount and currency so the caller never re-parses them.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(Amount, Currency), ServiceError> {
        self.payment_method.validate(now)?;
        let bounds = self.allowance.validate(now)?;
        if let Some(address) = &self.billing_address {
            address.validate()?;
        }
        if let Some(signal) = self
            .risk_signals
            .iter()
            .find(|signal| signal.action == RiskAction::Blocked)
        {
            return Err(ServiceError::invalid_field(
                "$.risk_signals",
                format!("Payment blocked due to risk signal: {}", signal.signal_type),
            ));
        }
        Ok(bounds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegatePaymentResponse {
    pub id: String,
    pub created: DateTime<Utc>,
    pub metadata: Metadata,
}

// Data models

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub payment_type: String,
    pub card_number_type: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cryptogram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eci_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks_performed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iin: Option<String>,
    pub display_card_funding_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_wallet_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_last4: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PaymentMethod {
    fn validate(&self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if self.payment_type != "card" {
            return Err(ServiceError::invalid_field(
                "$.payment_method.type",
                "Only card payment methods are supported",
            ));
        }
        if self.card_number_type != "fpan" && self.card_number_type != "network_token" {
            return Err(ServiceError::invalid_field(
                "$.payment_method.card_number_type",
                "card_number_type must be 'fpan' or 'network_token'",
            ));
        }
        if !matches!(
            self.display_card_funding_type.as_str(),
            "credit" | "debit" | "prepaid"
        ) {
            return Err(ServiceError::invalid_field(
                "$.payment_method.display_card_funding_type",
                "display_card_funding_type must be 'credit', 'debit' or 'prepaid'",
            ));
        }

        let digits: String = self
            .number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if !(13..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ServiceError::invalid_field(
                "$.payment_method.number",
                "Invalid card number length",
            ));
        }

        match (&self.exp_month, &self.exp_year) {
            (Some(month), Some(year)) => Self::validate_expiry(month, year, now),
            (None, None) => Ok(()),
            _ => Err(ServiceError::invalid_field(
                "$.payment_method.exp_month",
                "exp_month and exp_year must be supplied together",
            )),
        }
    }

    fn validate_expiry(month: &str, year: &str, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let month: u32 = month
            .trim()
            .parse()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| {
                ServiceError::invalid_field("$.payment_method.exp_month", "Invalid expiry month")
            })?;
        let year: i32 = year.trim().parse().map_err(|_| {
            ServiceError::invalid_field("$.payment_method.exp_year", "Invalid expiry year")
        })?;

        if year < now.year() || (year == now.year() && month < now.month()) {
            return Err(ServiceError::invalid_field(
                "$.payment_method.exp_year",
                "Card is expired",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillingAddress {
    pub name: String,
    pub line_one: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_two: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub country: String,
    pub postal_code: String,
}

impl BillingAddress {
    fn validate(&self) -> Result<(), ServiceError> {
        ensure_non_empty("$.billing_address.name", &self.name, 120)?;
        ensure_non_empty("$.billing_address.line_one", &self.line_one, 120)?;
        ensure_non_empty("$.billing_address.city", &self.city, 120)?;
        ensure_non_empty("$.billing_address.postal_code", &self.postal_code, 20)?;
        ensure_country_code("$.billing_address.country", &self.country)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allowance {
    pub reason: String,
    pub max_amount: i64,
    pub currency: String,
    pub checkout_session_id: String,
    pub merchant_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Allowance {
    fn validate(&self, now: DateTime<Utc>) -> Result<(Amount, Currency), ServiceError> {
        if self.reason != "one_time" {
            return Err(ServiceError::invalid_field(
                "$.allowance.reason",
                "Only 'one_time' allowance reason is supported",
            ));
        }
        if self.max_amount <= 0 {
            return Err(ServiceError::invalid_field(
                "$.allowance.max_amount",
                "max_amount must be greater than zero",
            ));
        }
        let max_amount = Amount::new(self.max_amount).map_err(|_| {
            ServiceError::invalid_field("$.allowance.max_amount", "max_amount is too large")
        })?;
        let currency = Currency::parse(&self.currency).map_err(|err| {
            ServiceError::invalid_field("$.allowance.currency", err.response_message())
        })?;
        ensure_ascii_identifier(
            "$.allowance.checkout_session_id",
            &self.checkout_session_id,
            128,
        )?;
        ensure_ascii_identifier("$.allowance.merchant_id", &self.merchant_id, 128)?;
        if self.expires_at <= now {
            return Err(ServiceError::invalid_field(
                "$.allowance.expires_at",
                "expires_at must be in the future",
            ));
        }
        Ok((max_amount, currency))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAction {
    Blocked,
    ManualReview,
    Authorized,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskSignal {
    #[serde(rename = "type")]
    pub signal_type: String,
    pub score: i32,
    pub action: RiskAction,
}

/// What the vault keeps for an issued token. The card number itself is never retained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultToken {
    pub id: String,
    pub max_amount: Amount,
    pub currency: Currency,
    pub checkout_session_id: String,
    pub merchant_id: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_last4: Option<String>,
    pub created: DateTime<Utc>,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_amount: Option<Amount>,
}
