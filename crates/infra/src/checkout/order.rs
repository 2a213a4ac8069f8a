use tracing::{info, instrument, warn};

use storefront_core::{OrderId, TenantId};
use storefront_inventory::MovementOrigin;
use storefront_sales::{
    CreateOrderInput, DeliveryRequest, Order, OrderStatus, OrderTotals, OrderWithItems, PaymentStatus, PostalCode,
    SalesChannel, ShippingQuote, select_quote, shipping_cost,
};

use super::{CheckoutDeps, CheckoutError, PricedCart};
use crate::config::CheckoutConfig;
use crate::shipping::ShippingError;
use crate::store::OrderCommit;

/// Online checkout: validate, price, resolve delivery, commit.
#[derive(Clone)]
pub struct OrderOrchestrator {
    deps: CheckoutDeps,
    config: CheckoutConfig,
}

impl OrderOrchestrator {
    pub fn new(deps: CheckoutDeps, config: CheckoutConfig) -> Self {
        Self { deps, config }
    }

    #[instrument(
        skip(self, input),
        fields(tenant_id = %tenant_id, item_count = input.items.len(), delivery_type = input.delivery_type.as_str()),
        err
    )]
    pub async fn create_order(
        &self,
        tenant_id: TenantId,
        input: CreateOrderInput,
    ) -> Result<OrderWithItems, CheckoutError> {
        let delivery = input.validate()?;

        let cart = self.deps.price_lines(tenant_id, &input.items).await?;
        let quoted_shipping = self.resolve_delivery(tenant_id, &delivery, &cart).await?;
        let settings = self.deps.settings.find_settings(tenant_id).await?;
        let shipping = shipping_cost(quoted_shipping, cart.subtotal, settings.free_shipping_min_total);

        let coupon = self
            .deps
            .apply_coupon(tenant_id, input.coupon_code(), cart.subtotal)
            .await?;
        let discount = coupon.as_ref().map_or(0, |c| c.discount);
        let totals = OrderTotals::compute(cart.subtotal, discount, shipping)?;

        self.deps.ensure_cart_active(tenant_id, input.cart_id).await?;

        // Read after the delivery quote, which may take a while.
        let now = self.deps.clock.now();
        let order_id = OrderId::new();
        let (delivery_option_id, shipping_address) = match delivery {
            DeliveryRequest::Shipping { option_id, address, .. } => (option_id, Some(address)),
            DeliveryRequest::PickupPoint { pickup_point_id } => (pickup_point_id.to_string(), None),
        };
        let order = Order {
            id: order_id,
            tenant_id,
            customer_id: input.customer_id,
            channel: SalesChannel::Online,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            subtotal: totals.subtotal,
            discount: totals.discount,
            coupon_id: coupon.as_ref().map(|c| c.coupon_id),
            coupon_code: coupon.map(|c| c.code),
            shipping_cost: totals.shipping_cost,
            total: totals.total,
            delivery_type: Some(input.delivery_type),
            delivery_option_id: Some(delivery_option_id),
            shipping_address,
            cart_id: input.cart_id,
            created_by: None,
            created_at: now,
        };
        let (items, movements) = cart.into_commit_lines(tenant_id, order_id, &[], MovementOrigin::Order, None, now);

        let created = self.deps.commit(OrderCommit { order, items, movements }).await?;
        info!(order_id = %created.order.id, total = created.order.total, "order created");
        Ok(created)
    }

    /// Delivery cost before the free-shipping rule. Pickup is always free.
    async fn resolve_delivery(
        &self,
        tenant_id: TenantId,
        delivery: &DeliveryRequest,
        cart: &PricedCart,
    ) -> Result<u64, CheckoutError> {
        match delivery {
            DeliveryRequest::PickupPoint { pickup_point_id } => {
                let point = self
                    .deps
                    .pickup_points
                    .find_pickup_point(tenant_id, *pickup_point_id)
                    .await?
                    .ok_or_else(|| CheckoutError::not_found("pickup_point", pickup_point_id))?;
                if !point.active {
                    return Err(CheckoutError::InvalidDeliveryOption(format!(
                        "pickup point {} is inactive",
                        point.id
                    )));
                }
                Ok(0)
            }
            DeliveryRequest::Shipping {
                option_id,
                postal_code,
                ..
            } => {
                let quotes = self.quote(tenant_id, postal_code, cart).await?;
                select_quote(&quotes, option_id)
                    .map(|q| q.price)
                    .ok_or_else(|| {
                        CheckoutError::InvalidDeliveryOption(format!(
                            "shipping option '{option_id}' is not available for {postal_code}"
                        ))
                    })
            }
        }
    }

    async fn quote(
        &self,
        tenant_id: TenantId,
        postal_code: &PostalCode,
        cart: &PricedCart,
    ) -> Result<Vec<ShippingQuote>, CheckoutError> {
        let items = cart.shipping_items();
        let timeout = self.config.shipping_quote_timeout;

        match tokio::time::timeout(timeout, self.deps.shipping.quote(tenant_id, postal_code, &items)).await {
            Ok(Ok(quotes)) => Ok(quotes),
            Ok(Err(ShippingError::Unserviceable(reason))) => Err(CheckoutError::InvalidDeliveryOption(reason)),
            Ok(Err(err @ ShippingError::Unavailable(_))) => {
                warn!(error = %err, postal_code = %postal_code, "shipping resolver failed");
                Err(CheckoutError::ShippingUnavailable)
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, postal_code = %postal_code, "shipping quote timed out");
                Err(CheckoutError::ShippingUnavailable)
            }
        }
    }
}
