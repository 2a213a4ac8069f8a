//! Order persistence and the atomic checkout commit.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryCommerceStore;
pub use postgres::PostgresCommerceStore;

use std::collections::BTreeMap;

use async_trait::async_trait;

use storefront_core::{OrderId, TenantId};
use storefront_inventory::{MovementKind, NewStockMovement, StockKey};
use storefront_sales::{Order, OrderItem, OrderWithItems};

use crate::error::{CommitError, StoreError};

/// Everything a checkout writes, applied all-or-nothing.
///
/// `movements[i]` is the OUT movement for `items[i]`. The coupon use and the
/// cart conversion are taken from `order.coupon_id` and `order.cart_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCommit {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub movements: Vec<NewStockMovement>,
}

impl OrderCommit {
    pub fn tenant_id(&self) -> TenantId {
        self.order.tenant_id
    }

    /// Requested quantity per stock track, summed over lines. Ordered by key,
    /// which is also the lock acquisition order.
    pub fn requirements(&self) -> BTreeMap<StockKey, u64> {
        let mut required = BTreeMap::new();
        for movement in &self.movements {
            *required.entry(movement.key()).or_insert(0u64) += u64::from(movement.quantity);
        }
        required
    }

    /// Structural checks on the commit itself, independent of stored state.
    pub fn validate(&self) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id();

        if self.items.is_empty() {
            return Err(StoreError::Invalid("order has no items".to_string()));
        }
        if self.items.len() != self.movements.len() {
            return Err(StoreError::Invalid(format!(
                "{} items but {} stock movements",
                self.items.len(),
                self.movements.len()
            )));
        }

        for (idx, (item, movement)) in self.items.iter().zip(&self.movements).enumerate() {
            if item.order_id != self.order.id {
                return Err(StoreError::Invalid(format!("items[{idx}] belongs to another order")));
            }
            if movement.tenant_id != tenant_id {
                return Err(StoreError::TenantIsolation(format!(
                    "movements[{idx}] tenant_id mismatch: expected {tenant_id}, got {}",
                    movement.tenant_id
                )));
            }
            movement.validate()?;
            if movement.kind != MovementKind::Out
                || movement.product_id != item.product_id
                || movement.variant_id != item.variant_id
                || movement.quantity != item.quantity
            {
                return Err(StoreError::Invalid(format!(
                    "movements[{idx}] does not match items[{idx}]"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Re-check stock for every track under serialisation, then write the
    /// order, its items, the movements, the coupon use and the cart
    /// conversion in one unit. On any error nothing is written.
    async fn commit_order(&self, commit: OrderCommit) -> Result<(), CommitError>;

    async fn find_order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Option<OrderWithItems>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use storefront_core::{OrderItemId, ProductId};
    use storefront_inventory::MovementOrigin;
    use storefront_sales::{OrderStatus, PaymentStatus, SalesChannel};

    fn order(tenant_id: TenantId) -> Order {
        Order {
            id: OrderId::new(),
            tenant_id,
            customer_id: None,
            channel: SalesChannel::Online,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            subtotal: 3_000,
            discount: 0,
            coupon_id: None,
            coupon_code: None,
            shipping_cost: 0,
            total: 3_000,
            delivery_type: None,
            delivery_option_id: None,
            shipping_address: None,
            cart_id: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    fn line(order: &Order, product_id: ProductId, quantity: u32) -> (OrderItem, NewStockMovement) {
        let item = OrderItem {
            id: OrderItemId::new(),
            order_id: order.id,
            product_id,
            variant_id: None,
            quantity,
            unit_price: 1_000,
            discount: 0,
            total: 1_000 * u64::from(quantity),
        };
        let movement = NewStockMovement::outbound(
            StockKey::base(order.tenant_id, product_id),
            MovementOrigin::Order,
            quantity,
            order.created_at,
        );
        (item, movement)
    }

    #[test]
    fn requirements_sum_lines_sharing_a_track() {
        let order = order(TenantId::new());
        let product_id = ProductId::new();
        let (i1, m1) = line(&order, product_id, 2);
        let (i2, m2) = line(&order, product_id, 1);
        let commit = OrderCommit {
            order: order.clone(),
            items: vec![i1, i2],
            movements: vec![m1, m2],
        };

        commit.validate().unwrap();
        let required = commit.requirements();
        assert_eq!(required.len(), 1);
        assert_eq!(required[&StockKey::base(order.tenant_id, product_id)], 3);
    }

    #[test]
    fn movement_from_another_tenant_is_an_isolation_error() {
        let order = order(TenantId::new());
        let (item, mut movement) = line(&order, ProductId::new(), 1);
        movement.tenant_id = TenantId::new();
        let commit = OrderCommit {
            order,
            items: vec![item],
            movements: vec![movement],
        };

        match commit.validate() {
            Err(StoreError::TenantIsolation(_)) => {}
            other => panic!("expected tenant isolation error, got {other:?}"),
        }
    }

    #[test]
    fn movement_must_mirror_its_item() {
        let order = order(TenantId::new());
        let (item, mut movement) = line(&order, ProductId::new(), 2);
        movement.quantity = 1;
        let commit = OrderCommit {
            order,
            items: vec![item],
            movements: vec![movement],
        };

        assert!(matches!(commit.validate(), Err(StoreError::Invalid(_))));
    }
}
