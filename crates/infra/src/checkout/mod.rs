//! Checkout orchestration: online orders and point-of-sale sales.
//!
//! Both flows validate and price outside any lock, then hand a fully built
//! [`OrderCommit`] to the [`OrderStore`], which re-checks stock, coupon and
//! cart under serialisation and writes everything in one unit.

mod coupon;
mod error;
mod order;
mod physical_sale;

pub use coupon::CouponValidator;
pub use error::{CheckoutError, ErrorBody, ErrorKind};
pub use order::OrderOrchestrator;
pub use physical_sale::PhysicalSaleOrchestrator;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::error;

use storefront_core::{CartId, Clock, OrderId, OrderItemId, SystemClock, TenantId, UserId};
use storefront_inventory::{MovementOrigin, NewStockMovement, StockKey};
use storefront_sales::{
    AppliedCoupon, CartStatus, CouponRejection, OrderItem, OrderLineInput, OrderWithItems, PackageDimensions, ShippingItem,
    evaluate_coupon, line_total, normalize_code,
};

use crate::ledger::StockLedger;
use crate::ports::{CartStore, CouponStore, PickupPointDirectory, ProductCatalog, StoreSettingsDirectory};
use crate::shipping::ShippingCostResolver;
use crate::store::{OrderCommit, OrderStore};

/// Collaborators shared by the checkout flows.
#[derive(Clone)]
pub struct CheckoutDeps {
    pub catalog: Arc<dyn ProductCatalog>,
    pub pickup_points: Arc<dyn PickupPointDirectory>,
    pub shipping: Arc<dyn ShippingCostResolver>,
    pub carts: Arc<dyn CartStore>,
    pub coupons: Arc<dyn CouponStore>,
    pub settings: Arc<dyn StoreSettingsDirectory>,
    pub ledger: Arc<dyn StockLedger>,
    pub orders: Arc<dyn OrderStore>,
    pub clock: Arc<dyn Clock>,
}

impl CheckoutDeps {
    /// Wire every port to one store implementing all of them.
    pub fn from_store<S>(store: Arc<S>, shipping: Arc<dyn ShippingCostResolver>) -> Self
    where
        S: ProductCatalog
            + PickupPointDirectory
            + CartStore
            + CouponStore
            + StoreSettingsDirectory
            + StockLedger
            + OrderStore
            + 'static,
    {
        Self {
            catalog: store.clone(),
            pickup_points: store.clone(),
            shipping,
            carts: store.clone(),
            coupons: store.clone(),
            settings: store.clone(),
            ledger: store.clone(),
            orders: store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Check every line against the catalog and the ledger, and price it.
    ///
    /// Quantities are summed per stock track before comparing with the
    /// available stock, so two lines for the same track cannot each pass on
    /// their own.
    async fn price_lines(&self, tenant_id: TenantId, items: &[OrderLineInput]) -> Result<PricedCart, CheckoutError> {
        let mut lines = Vec::with_capacity(items.len());
        let mut subtotal: u64 = 0;
        let mut required: BTreeMap<StockKey, u64> = BTreeMap::new();

        for input in items {
            let product = self
                .catalog
                .find_product(tenant_id, input.product_id)
                .await?
                .ok_or_else(|| CheckoutError::not_found("product", input.product_id))?;
            if !product.is_orderable() {
                return Err(CheckoutError::ProductUnavailable(product.id));
            }
            if let Some(variant_id) = input.variant_id {
                let variant = product
                    .variant(variant_id)
                    .ok_or_else(|| CheckoutError::not_found("variant", variant_id))?;
                if !variant.active {
                    return Err(CheckoutError::ProductUnavailable(product.id));
                }
            }

            let total = line_total(input.unit_price, input.quantity)?;
            subtotal = subtotal
                .checked_add(total)
                .ok_or_else(|| CheckoutError::Validation("order subtotal overflows".to_string()))?;
            *required
                .entry(StockKey::new(tenant_id, input.product_id, input.variant_id))
                .or_insert(0) += u64::from(input.quantity);

            lines.push(PricedLine {
                input: input.clone(),
                dimensions: product.dimensions,
                line_total: total,
            });
        }

        for (key, requested) in required {
            let available = self.ledger.current_stock(&key).await?.current_stock;
            if available < requested {
                return Err(CheckoutError::InsufficientStock {
                    product_id: key.product_id,
                    variant_id: key.variant_id,
                    requested,
                    available,
                });
            }
        }

        Ok(PricedCart { lines, subtotal })
    }

    async fn apply_coupon(
        &self,
        tenant_id: TenantId,
        code: Option<&str>,
        subtotal: u64,
    ) -> Result<Option<AppliedCoupon>, CheckoutError> {
        let Some(code) = code else {
            return Ok(None);
        };
        let coupon = self.coupons.find_by_code(tenant_id, code).await?;
        match evaluate_coupon(coupon.as_ref(), subtotal, self.clock.now()) {
            Ok(applied) => Ok(Some(applied)),
            Err(CouponRejection::NotFound) => Err(CheckoutError::not_found("coupon", normalize_code(code))),
            Err(rejection) => Err(rejection.into()),
        }
    }

    async fn ensure_cart_active(&self, tenant_id: TenantId, cart_id: Option<CartId>) -> Result<(), CheckoutError> {
        let Some(cart_id) = cart_id else {
            return Ok(());
        };
        match self.carts.find_cart(tenant_id, cart_id).await? {
            None => Err(CheckoutError::not_found("cart", cart_id)),
            Some(cart) if cart.status != CartStatus::Active => Err(CheckoutError::CartNotActive(cart_id)),
            Some(_) => Ok(()),
        }
    }

    /// Commit, then read the order back as stored.
    async fn commit(&self, commit: OrderCommit) -> Result<OrderWithItems, CheckoutError> {
        let tenant_id = commit.tenant_id();
        let order_id = commit.order.id;

        self.orders.commit_order(commit).await?;

        self.orders.find_order(tenant_id, order_id).await?.ok_or_else(|| {
            error!(tenant_id = %tenant_id, order_id = %order_id, "committed order not found on re-read");
            CheckoutError::Internal
        })
    }
}

struct PricedLine {
    input: OrderLineInput,
    dimensions: Option<PackageDimensions>,
    line_total: u64,
}

struct PricedCart {
    lines: Vec<PricedLine>,
    subtotal: u64,
}

impl PricedCart {
    fn line_totals(&self) -> Vec<u64> {
        self.lines.iter().map(|l| l.line_total).collect()
    }

    fn shipping_items(&self) -> Vec<ShippingItem> {
        self.lines
            .iter()
            .map(|l| ShippingItem {
                product_id: l.input.product_id,
                variant_id: l.input.variant_id,
                quantity: l.input.quantity,
                unit_price: l.input.unit_price,
                dimensions: l.dimensions,
            })
            .collect()
    }

    /// Order items and their OUT movements, pairwise.
    ///
    /// `discounts[i]` is the share of line `i`; missing entries count as 0.
    fn into_commit_lines(
        self,
        tenant_id: TenantId,
        order_id: OrderId,
        discounts: &[u64],
        origin: MovementOrigin,
        actor_id: Option<UserId>,
        occurred_at: DateTime<Utc>,
    ) -> (Vec<OrderItem>, Vec<NewStockMovement>) {
        let mut items = Vec::with_capacity(self.lines.len());
        let mut movements = Vec::with_capacity(self.lines.len());

        for (idx, line) in self.lines.into_iter().enumerate() {
            let discount = discounts.get(idx).copied().unwrap_or(0);
            let input = line.input;
            items.push(OrderItem {
                id: OrderItemId::new(),
                order_id,
                product_id: input.product_id,
                variant_id: input.variant_id,
                quantity: input.quantity,
                unit_price: input.unit_price,
                discount,
                total: line.line_total.saturating_sub(discount),
            });
            movements.push(
                NewStockMovement::outbound(
                    StockKey::new(tenant_id, input.product_id, input.variant_id),
                    origin.clone(),
                    input.quantity,
                    occurred_at,
                )
                .with_actor(actor_id),
            );
        }

        (items, movements)
    }
}
