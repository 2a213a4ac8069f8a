//! Read-side data supplied by collaborators (catalog, pickup points, carts,
//! store settings). Owned elsewhere; this core only reads them.

use serde::{Deserialize, Serialize};

use storefront_core::{CartId, CustomerId, PickupPointId, ProductId, TenantId, VariantId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Inactive,
    Draft,
    Archived,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDimensions {
    pub weight_grams: u32,
    pub height_cm: u32,
    pub width_cm: u32,
    pub length_cm: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    pub status: ProductStatus,
    pub variants: Vec<ProductVariant>,
    pub dimensions: Option<PackageDimensions>,
}

impl Product {
    pub fn is_orderable(&self) -> bool {
        self.status == ProductStatus::Active
    }

    pub fn variant(&self, id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupPoint {
    pub id: PickupPointId,
    pub tenant_id: TenantId,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    Active,
    Converted,
    Abandoned,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "active",
            CartStatus::Converted => "converted",
            CartStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(CartStatus::Active),
            "converted" => Some(CartStatus::Converted),
            "abandoned" => Some(CartStatus::Abandoned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub tenant_id: TenantId,
    pub customer_id: Option<CustomerId>,
    pub status: CartStatus,
}

/// Per-tenant storefront settings relevant to checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Subtotal (minor units) from which shipping is free.
    pub free_shipping_min_total: Option<u64>,
}
