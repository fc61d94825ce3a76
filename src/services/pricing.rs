use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::ids::{IdGenerator, IdKind};
use crate::models::{
    Address, Amount, FulfillmentOption, FulfillmentOptionDigital, FulfillmentOptionShipping, Item,
    LineItem, Message, MessageCode, TaxRate, Total, TotalType,
};

/// Unit price lookup by catalog item id.
pub trait PriceBook: Send + Sync {
    fn unit_price(&self, item_id: &str) -> Option<Amount>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticPriceBook {
    prices: HashMap<String, Amount>,
}

impl StaticPriceBook {
    pub fn new(prices: HashMap<String, Amount>) -> Self {
        Self { prices }
    }

    pub fn with_price(mut self, item_id: impl Into<String>, price: Amount) -> Self {
        self.prices.insert(item_id.into(), price);
        self
    }
}

impl PriceBook for StaticPriceBook {
    fn unit_price(&self, item_id: &str) -> Option<Amount> {
        self.prices.get(item_id).copied()
    }
}

/// What to do with an item id the price book does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownItemPolicy {
    DefaultPrice(Amount),
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentKind {
    Shipping {
        carrier: String,
        min_days: i64,
        max_days: i64,
    },
    Digital,
}

/// A catalog entry before it is stamped with delivery windows and tax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentRate {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub kind: FulfillmentKind,
    pub price: Amount,
}

impl FulfillmentRate {
    pub fn shipping(
        id: &str,
        title: &str,
        carrier: &str,
        min_days: i64,
        max_days: i64,
        price: Amount,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            subtitle: Some(format!("{}-{} business days", min_days, max_days)),
            kind: FulfillmentKind::Shipping {
                carrier: carrier.to_string(),
                min_days,
                max_days,
            },
            price,
        }
    }

    pub fn digital(id: &str, title: &str, price: Amount) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            subtitle: None,
            kind: FulfillmentKind::Digital,
            price,
        }
    }

    fn to_option(&self, now: DateTime<Utc>, tax_rate: TaxRate) -> Result<FulfillmentOption, ServiceError> {
        let subtotal = self.price;
        let tax = tax_rate.tax_on(subtotal)?;
        let total = subtotal.checked_add(tax)?;
        Ok(match &self.kind {
            FulfillmentKind::Shipping {
                carrier,
                min_days,
                max_days,
            } => FulfillmentOption::Shipping(FulfillmentOptionShipping {
                id: self.id.clone(),
                title: self.title.clone(),
                subtitle: self.subtitle.clone(),
                carrier: carrier.clone(),
                earliest_delivery_time: now + Duration::days(*min_days),
                latest_delivery_time: now + Duration::days(*max_days),
                subtotal,
                tax,
                total,
            }),
            FulfillmentKind::Digital => FulfillmentOption::Digital(FulfillmentOptionDigital {
                id: self.id.clone(),
                title: self.title.clone(),
                subtitle: self.subtitle.clone(),
                subtotal,
                tax,
                total,
            }),
        })
    }
}

const STANDARD_SHIPPING_PRICE: Amount = Amount::from_const(500);
const EXPRESS_SHIPPING_PRICE: Amount = Amount::from_const(1500);

pub fn default_fulfillment_catalog() -> Vec<FulfillmentRate> {
    vec![
        FulfillmentRate::shipping(
            "standard_shipping",
            "Standard Shipping",
            "USPS",
            5,
            7,
            STANDARD_SHIPPING_PRICE,
        ),
        FulfillmentRate::shipping(
            "express_shipping",
            "Express Shipping",
            "UPS",
            1,
            2,
            EXPRESS_SHIPPING_PRICE,
        ),
        FulfillmentRate::digital("digital_delivery", "Digital Delivery", Amount::ZERO),
    ]
}

/// Everything the pricing pass derives for a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub line_items: Vec<LineItem>,
    pub fulfillment_options: Vec<FulfillmentOption>,
    pub fulfillment_option_id: Option<String>,
    pub totals: Vec<Total>,
    pub messages: Vec<Message>,
}

impl PricedCart {
    pub fn is_ready(&self) -> bool {
        !self.messages.iter().any(Message::is_error)
    }
}

/// Pure pricing: line items, fulfillment catalog, totals ladder and readiness messages.
#[derive(Clone)]
pub struct PricingEngine {
    price_book: Arc<dyn PriceBook>,
    tax_rate: TaxRate,
    unknown_item_policy: UnknownItemPolicy,
    catalog: Vec<FulfillmentRate>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl PricingEngine {
    pub fn new(
        price_book: Arc<dyn PriceBook>,
        tax_rate: TaxRate,
        unknown_item_policy: UnknownItemPolicy,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            price_book,
            tax_rate,
            unknown_item_policy,
            catalog: default_fulfillment_catalog(),
            clock,
            ids,
        }
    }

    pub fn price(
        &self,
        items: &[Item],
        requested_option: Option<&str>,
        address: Option<&Address>,
    ) -> Result<PricedCart, ServiceError> {
        let line_items = self.build_line_items(items)?;
        let fulfillment_options = self.fulfillment_options()?;

        let resolved = match requested_option {
            Some(option_id) => Some(
                fulfillment_options
                    .iter()
                    .find(|option| option.id() == option_id)
                    .ok_or_else(|| {
                        ServiceError::Conflict(format!(
                            "Unknown fulfillment option {}",
                            option_id
                        ))
                    })?,
            ),
            None => fulfillment_options.first(),
        };

        let mut messages = Vec::new();
        if resolved.map(FulfillmentOption::requires_address).unwrap_or(false) && address.is_none() {
            messages.push(Message::error(
                MessageCode::Missing,
                "$.fulfillment_address",
                "A fulfillment address is required for shipping",
            ));
        }

        let fulfillment = resolved.map(FulfillmentOption::total).unwrap_or(Amount::ZERO);
        let totals = Self::totals_ladder(&line_items, fulfillment)?;
        let fulfillment_option_id = resolved.map(|option| option.id().to_string());

        Ok(PricedCart {
            line_items,
            fulfillment_options,
            fulfillment_option_id,
            totals,
            messages,
        })
    }

    fn build_line_items(&self, items: &[Item]) -> Result<Vec<LineItem>, ServiceError> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let unit_price = self.unit_price(index, &item.id)?;
                let quantity = u32::try_from(item.quantity).map_err(|_| {
                    ServiceError::invalid_field(
                        format!("$.items[{index}].quantity"),
                        "Quantity must be positive",
                    )
                })?;
                let base_amount = unit_price.checked_mul(quantity)?;
                let discount = Amount::ZERO;
                let subtotal = base_amount.checked_sub(discount)?;
                let tax = self.tax_rate.tax_on(subtotal)?;
                let total = subtotal.checked_add(tax)?;

                Ok(LineItem {
                    id: self.ids.next_id(IdKind::LineItem),
                    item: item.clone(),
                    base_amount,
                    discount,
                    subtotal,
                    tax,
                    total,
                })
            })
            .collect()
    }

    fn unit_price(&self, index: usize, item_id: &str) -> Result<Amount, ServiceError> {
        match (self.price_book.unit_price(item_id), self.unknown_item_policy) {
            (Some(price), _) => Ok(price),
            (None, UnknownItemPolicy::DefaultPrice(price)) => Ok(price),
            (None, UnknownItemPolicy::Reject) => Err(ServiceError::invalid_field(
                format!("$.items[{index}].id"),
                format!("Unknown item {}", item_id),
            )),
        }
    }

    fn fulfillment_options(&self) -> Result<Vec<FulfillmentOption>, ServiceError> {
        let now = self.clock.now();
        self.catalog
            .iter()
            .map(|rate| rate.to_option(now, self.tax_rate))
            .collect()
    }

    fn totals_ladder(line_items: &[LineItem], fulfillment: Amount) -> Result<Vec<Total>, ServiceError> {
        let items_base = Amount::sum(line_items.iter().map(|line| line.base_amount))?;
        let items_discount = Amount::sum(line_items.iter().map(|line| line.discount))?;
        let subtotal = Amount::sum(line_items.iter().map(|line| line.subtotal))?;
        let tax = Amount::sum(line_items.iter().map(|line| line.tax))?;
        let total = subtotal.checked_add(tax)?.checked_add(fulfillment)?;

        Ok(vec![
            Total::new(TotalType::ItemsBaseAmount, "Item(s) total", items_base),
            Total::new(TotalType::ItemsDiscount, "Discount", items_discount),
            Total::new(TotalType::Subtotal, "Subtotal", subtotal),
            Total::new(TotalType::Tax, "Tax", tax),
            Total::new(TotalType::Fulfillment, "Fulfillment", fulfillment),
            Total::new(TotalType::Total, "Total", total),
        ])
    }
}
