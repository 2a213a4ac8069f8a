//! Shipping cost resolution port.

use async_trait::async_trait;
use thiserror::Error;

use storefront_core::TenantId;
use storefront_sales::{PostalCode, ShippingItem, ShippingQuote};

#[derive(Debug, Error)]
pub enum ShippingError {
    /// The resolver could not answer (network, carrier outage).
    #[error("shipping resolver unavailable: {0}")]
    Unavailable(String),

    /// The resolver answered but cannot serve this destination or parcel.
    #[error("destination not serviceable: {0}")]
    Unserviceable(String),
}

/// External carrier integration. Calls may be slow; the checkout bounds them
/// with a timeout.
#[async_trait]
pub trait ShippingCostResolver: Send + Sync {
    async fn quote(
        &self,
        tenant_id: TenantId,
        destination: &PostalCode,
        items: &[ShippingItem],
    ) -> Result<Vec<ShippingQuote>, ShippingError>;
}

/// Resolver answering every request with the same fixed quotes.
///
/// Used for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticShippingResolver {
    quotes: Vec<ShippingQuote>,
}

impl StaticShippingResolver {
    pub fn new(quotes: Vec<ShippingQuote>) -> Self {
        Self { quotes }
    }
}

#[async_trait]
impl ShippingCostResolver for StaticShippingResolver {
    async fn quote(
        &self,
        _tenant_id: TenantId,
        _destination: &PostalCode,
        items: &[ShippingItem],
    ) -> Result<Vec<ShippingQuote>, ShippingError> {
        if items.is_empty() {
            return Err(ShippingError::Unserviceable("no items to ship".to_string()));
        }
        Ok(self.quotes.clone())
    }
}
