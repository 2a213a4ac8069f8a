//! Read/write ports to collaborators the checkout depends on.
//!
//! Every lookup is tenant-scoped: an entity that exists under another tenant
//! is reported as absent.

use async_trait::async_trait;

use storefront_core::{CartId, CouponId, PickupPointId, ProductId, TenantId};
use storefront_sales::{Cart, Coupon, PickupPoint, Product, StoreSettings};

use crate::error::StoreError;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Option<Product>, StoreError>;
}

#[async_trait]
pub trait PickupPointDirectory: Send + Sync {
    async fn find_pickup_point(
        &self,
        tenant_id: TenantId,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<PickupPoint>, StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_cart(&self, tenant_id: TenantId, cart_id: CartId) -> Result<Option<Cart>, StoreError>;

    /// Transition an active cart to converted. Returns `false` when the cart
    /// is missing or no longer active.
    async fn mark_converted(&self, tenant_id: TenantId, cart_id: CartId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Look up by code; matching ignores surrounding whitespace and case.
    async fn find_by_code(&self, tenant_id: TenantId, code: &str) -> Result<Option<Coupon>, StoreError>;

    /// Consume one use. Returns `false` when the coupon is missing, inactive
    /// or already at `max_uses`.
    async fn increment_used(&self, tenant_id: TenantId, coupon_id: CouponId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait StoreSettingsDirectory: Send + Sync {
    /// Settings for the tenant; defaults when none were configured.
    async fn find_settings(&self, tenant_id: TenantId) -> Result<StoreSettings, StoreError>;
}
