use tracing::{info, instrument};

use storefront_core::{OrderId, TenantId};
use storefront_inventory::MovementOrigin;
use storefront_sales::{
    Order, OrderStatus, OrderTotals, OrderWithItems, PaymentStatus, PhysicalSaleInput, SalesChannel,
    distribute_discount,
};

use super::{CheckoutDeps, CheckoutError};
use crate::store::OrderCommit;

/// Point-of-sale checkout: paid and completed on the spot, no delivery.
#[derive(Clone)]
pub struct PhysicalSaleOrchestrator {
    deps: CheckoutDeps,
}

impl PhysicalSaleOrchestrator {
    pub fn new(deps: CheckoutDeps) -> Self {
        Self { deps }
    }

    #[instrument(
        skip(self, input),
        fields(tenant_id = %tenant_id, item_count = input.items.len(), payment_method = input.payment_method.as_str()),
        err
    )]
    pub async fn create_sale(
        &self,
        tenant_id: TenantId,
        input: PhysicalSaleInput,
    ) -> Result<OrderWithItems, CheckoutError> {
        input.validate()?;

        let cart = self.deps.price_lines(tenant_id, &input.items).await?;
        let coupon = self
            .deps
            .apply_coupon(tenant_id, input.coupon_code(), cart.subtotal)
            .await?;

        // Coupon and manual discount stack, together capped at the subtotal.
        let coupon_discount = coupon.as_ref().map_or(0, |c| c.discount);
        let discount = coupon_discount
            .saturating_add(input.manual_discount.unwrap_or(0))
            .min(cart.subtotal);
        let totals = OrderTotals::compute(cart.subtotal, discount, 0)?;
        let shares = distribute_discount(&cart.line_totals(), totals.discount);

        self.deps.ensure_cart_active(tenant_id, input.cart_id).await?;

        let now = self.deps.clock.now();
        let order_id = OrderId::new();
        let order = Order {
            id: order_id,
            tenant_id,
            customer_id: input.customer_id,
            channel: SalesChannel::Physical,
            status: OrderStatus::Completed,
            payment_status: PaymentStatus::Paid,
            payment_method: Some(input.payment_method),
            subtotal: totals.subtotal,
            discount: totals.discount,
            coupon_id: coupon.as_ref().map(|c| c.coupon_id),
            coupon_code: coupon.map(|c| c.code),
            shipping_cost: 0,
            total: totals.total,
            delivery_type: None,
            delivery_option_id: None,
            shipping_address: None,
            cart_id: input.cart_id,
            created_by: input.seller_id,
            created_at: now,
        };
        let (items, movements) = cart.into_commit_lines(
            tenant_id,
            order_id,
            &shares,
            MovementOrigin::PhysicalSale,
            input.seller_id,
            now,
        );

        let created = self.deps.commit(OrderCommit { order, items, movements }).await?;
        info!(order_id = %created.order.id, total = created.order.total, "physical sale recorded");
        Ok(created)
    }
}
