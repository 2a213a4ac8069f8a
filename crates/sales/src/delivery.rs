//! Delivery: destination addresses, carrier quotes and the free-shipping rule.

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, PickupPointId, ProductId, VariantId};

use crate::catalog::PackageDimensions;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    Shipping,
    PickupPoint,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Shipping => "shipping",
            DeliveryType::PickupPoint => "pickup_point",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shipping" => Some(DeliveryType::Shipping),
            "pickup_point" => Some(DeliveryType::PickupPoint),
            _ => None,
        }
    }
}

/// Postal code normalised to exactly [`PostalCode::DIGITS`] ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    pub const DIGITS: usize = 8;

    /// Accepts the usual separators (`01310-100`, `01310 100`, `01.310-100`).
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, '-' | '.' | ' '))
            .collect();
        if digits.len() != Self::DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation(format!(
                "postal code must have {} digits",
                Self::DIGITS
            )));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PostalCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(value: PostalCode) -> Self {
        value.0
    }
}

impl core::fmt::Display for PostalCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured shipping destination.
///
/// `postal_code` stays a plain string on the wire so malformed input reaches
/// validation instead of failing deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient_name: Option<String>,
    pub postal_code: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: Option<String>,
    pub city: String,
    pub state: String,
}

impl ShippingAddress {
    pub fn postal_code(&self) -> DomainResult<PostalCode> {
        PostalCode::parse(&self.postal_code)
    }
}

/// Validated delivery choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryRequest {
    Shipping {
        option_id: String,
        postal_code: PostalCode,
        address: ShippingAddress,
    },
    PickupPoint {
        pickup_point_id: PickupPointId,
    },
}

impl DeliveryRequest {
    pub fn delivery_type(&self) -> DeliveryType {
        match self {
            DeliveryRequest::Shipping { .. } => DeliveryType::Shipping,
            DeliveryRequest::PickupPoint { .. } => DeliveryType::PickupPoint,
        }
    }
}

/// One parcel line sent to the shipping cost resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub unit_price: u64,
    pub dimensions: Option<PackageDimensions>,
}

/// A priced delivery option returned by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub option_id: String,
    pub name: String,
    pub carrier: Option<String>,
    pub price: u64,
    pub delivery_days: Option<u32>,
}

pub fn select_quote<'a>(quotes: &'a [ShippingQuote], option_id: &str) -> Option<&'a ShippingQuote> {
    quotes.iter().find(|q| q.option_id == option_id)
}

/// Store-level rule: a subtotal at or above the threshold ships for free.
pub fn shipping_cost(quoted: u64, subtotal: u64, free_shipping_min_total: Option<u64>) -> u64 {
    match free_shipping_min_total {
        Some(threshold) if subtotal >= threshold => 0,
        _ => quoted,
    }
}
