use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ServiceError;
use crate::models::money::{Amount, Currency};
use crate::models::validation::{
    ensure_ascii_identifier, ensure_country_code, ensure_email, ensure_length, ensure_non_empty,
    ensure_phone, MAX_ADDRESS_FIELD_LENGTH, MAX_NAME_LENGTH,
};

pub const MAX_LINE_ITEMS: usize = 50;
pub const MAX_ITEM_QUANTITY: i32 = 99;
pub const MAX_ITEM_ID_LENGTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutSessionStatus {
    NotReadyForPayment,
    ReadyForPayment,
    InProgress,
    Completed,
    Canceled,
}

impl CheckoutSessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }

    /// Edges of the session lifecycle. Re-entering the current state is allowed
    /// for the two open states so a re-priced session can stay where it is.
    pub fn can_transition_to(self, next: Self) -> bool {
        use CheckoutSessionStatus::*;
        matches!(
            (self, next),
            (NotReadyForPayment, NotReadyForPayment)
                | (NotReadyForPayment, ReadyForPayment)
                | (ReadyForPayment, ReadyForPayment)
                | (ReadyForPayment, NotReadyForPayment)
                | (ReadyForPayment, InProgress)
                | (InProgress, Completed)
                | (NotReadyForPayment, Canceled)
                | (ReadyForPayment, Canceled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotReadyForPayment => "not_ready_for_payment",
            Self::ReadyForPayment => "ready_for_payment",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for CheckoutSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub name: String,
    pub line_one: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_two: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
}

impl Address {
    pub fn validate(&self, path: &str) -> Result<(), ServiceError> {
        ensure_non_empty(&format!("{path}.name"), &self.name, MAX_NAME_LENGTH)?;
        ensure_non_empty(
            &format!("{path}.line_one"),
            &self.line_one,
            MAX_ADDRESS_FIELD_LENGTH,
        )?;
        if let Some(line_two) = &self.line_two {
            ensure_length(&format!("{path}.line_two"), line_two, MAX_ADDRESS_FIELD_LENGTH)?;
        }
        ensure_non_empty(&format!("{path}.city"), &self.city, MAX_ADDRESS_FIELD_LENGTH)?;
        ensure_non_empty(&format!("{path}.state"), &self.state, MAX_ADDRESS_FIELD_LENGTH)?;
        ensure_non_empty(
            &format!("{path}.postal_code"),
            &self.postal_code,
            MAX_ADDRESS_FIELD_LENGTH,
        )?;
        ensure_country_code(&format!("{path}.country"), &self.country)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Buyer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl Buyer {
    pub fn validate(&self) -> Result<(), ServiceError> {
        ensure_non_empty("$.buyer.first_name", &self.first_name, MAX_NAME_LENGTH)?;
        ensure_non_empty("$.buyer.last_name", &self.last_name, MAX_NAME_LENGTH)?;
        ensure_email("$.buyer.email", &self.email)?;
        if let Some(phone) = &self.phone_number {
            ensure_phone("$.buyer.phone_number", phone)?;
        }
        Ok(())
    }
}

/// Catalog reference plus quantity as requested by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub quantity: i32,
}

impl Item {
    fn validate(&self, index: usize) -> Result<(), ServiceError> {
        if self.quantity < 1 || self.quantity > MAX_ITEM_QUANTITY {
            return Err(ServiceError::invalid_field(
                format!("$.items[{index}].quantity"),
                format!(
                    "Quantity for item {} must be between 1 and {}",
                    self.id, MAX_ITEM_QUANTITY
                ),
            ));
        }
        ensure_ascii_identifier(&format!("$.items[{index}].id"), &self.id, MAX_ITEM_ID_LENGTH)
    }
}

pub fn validate_items(items: &[Item]) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::invalid_field(
            "$.items",
            "At least one item is required",
        ));
    }
    if items.len() > MAX_LINE_ITEMS {
        return Err(ServiceError::invalid_field(
            "$.items",
            format!("A maximum of {} line items are supported", MAX_LINE_ITEMS),
        ));
    }
    items
        .iter()
        .enumerate()
        .try_for_each(|(index, item)| item.validate(index))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentProvider {
    pub provider: String,
    pub supported_payment_methods: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub id: String,
    pub item: Item,
    pub base_amount: Amount,
    pub discount: Amount,
    pub subtotal: Amount,
    pub tax: Amount,
    pub total: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalType {
    ItemsBaseAmount,
    ItemsDiscount,
    Subtotal,
    Discount,
    Fulfillment,
    Tax,
    Fee,
    Total,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Total {
    #[serde(rename = "type")]
    pub total_type: TotalType,
    pub display_text: String,
    pub amount: Amount,
}

impl Total {
    pub fn new(total_type: TotalType, display_text: &str, amount: Amount) -> Self {
        Self {
            total_type,
            display_text: display_text.to_string(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FulfillmentOption {
    Shipping(FulfillmentOptionShipping),
    Digital(FulfillmentOptionDigital),
}

impl FulfillmentOption {
    pub fn id(&self) -> &str {
        match self {
            Self::Shipping(option) => &option.id,
            Self::Digital(option) => &option.id,
        }
    }

    pub fn total(&self) -> Amount {
        match self {
            Self::Shipping(option) => option.total,
            Self::Digital(option) => option.total,
        }
    }

    pub fn requires_address(&self) -> bool {
        match self {
            Self::Shipping(_) => true,
            Self::Digital(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentOptionShipping {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub carrier: String,
    pub earliest_delivery_time: DateTime<Utc>,
    pub latest_delivery_time: DateTime<Utc>,
    pub subtotal: Amount,
    pub tax: Amount,
    pub total: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentOptionDigital {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub subtotal: Amount,
    pub tax: Amount,
    pub total: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Plain,
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCode {
    Missing,
    Invalid,
    OutOfStock,
    PaymentDeclined,
    RequiresSignIn,
    #[serde(rename = "requires_3ds")]
    Requires3ds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Info(MessageInfo),
    Error(MessageError),
}

impl Message {
    pub fn info(content: impl Into<String>) -> Self {
        Self::Info(MessageInfo {
            param: None,
            content_type: ContentType::Plain,
            content: content.into(),
        })
    }

    pub fn error(code: MessageCode, param: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Error(MessageError {
            code,
            param: Some(param.into()),
            content_type: ContentType::Plain,
            content: content.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub content_type: ContentType,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageError {
    pub code: MessageCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub content_type: ContentType,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    TermsOfUse,
    PrivacyPolicy,
    SellerShopPolicies,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentData {
    pub token: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
}

impl PaymentData {
    pub fn validate(&self) -> Result<(), ServiceError> {
        ensure_non_empty("$.payment_data.token", &self.token, 256)?;
        ensure_ascii_identifier("$.payment_data.provider", &self.provider, 64)?;
        if let Some(address) = &self.billing_address {
            address.validate("$.payment_data.billing_address")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    ManualReview,
    Confirmed,
    Canceled,
    Shipped,
    Fulfilled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub checkout_session_id: String,
    pub permalink_url: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundType {
    StoreCredit,
    OriginalPayment,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Refund {
    #[serde(rename = "type")]
    pub refund_type: RefundType,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<Buyer>,
    pub payment_provider: PaymentProvider,
    pub status: CheckoutSessionStatus,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_address: Option<Address>,
    pub fulfillment_options: Vec<FulfillmentOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_option_id: Option<String>,
    pub totals: Vec<Total>,
    pub messages: Vec<Message>,
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn total_of(&self, total_type: TotalType) -> Option<Amount> {
        self.totals
            .iter()
            .find(|total| total.total_type == total_type)
            .map(|total| total.amount)
    }
}

// Request types

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSessionCreateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<Buyer>,
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_address: Option<Address>,
}

impl CheckoutSessionCreateRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_items(&self.items)?;
        if let Some(buyer) = &self.buyer {
            buyer.validate()?;
        }
        if let Some(address) = &self.fulfillment_address {
            address.validate("$.fulfillment_address")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSessionUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<Buyer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_option_id: Option<String>,
}

impl CheckoutSessionUpdateRequest {
    pub fn is_empty(&self) -> bool {
        self.buyer.is_none()
            && self.items.is_none()
            && self.fulfillment_address.is_none()
            && self.fulfillment_option_id.is_none()
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.is_empty() {
            return Err(ServiceError::validation(
                "At least one field must be supplied to update a checkout session",
            ));
        }
        if let Some(items) = &self.items {
            validate_items(items)?;
        }
        if let Some(buyer) = &self.buyer {
            buyer.validate()?;
        }
        if let Some(address) = &self.fulfillment_address {
            address.validate("$.fulfillment_address")?;
        }
        if let Some(option_id) = &self.fulfillment_option_id {
            if option_id.trim().is_empty() {
                return Err(ServiceError::invalid_field(
                    "$.fulfillment_option_id",
                    "Fulfillment option id cannot be blank",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSessionCompleteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<Buyer>,
    pub payment_data: PaymentData,
}

impl CheckoutSessionCompleteRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(buyer) = &self.buyer {
            buyer.validate()?;
        }
        self.payment_data.validate()
    }
}
