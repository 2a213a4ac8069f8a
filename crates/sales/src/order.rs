use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{
    CartId, CouponId, CustomerId, DomainError, DomainResult, OrderId, OrderItemId, PickupPointId, ProductId, TenantId,
    UserId, VariantId,
};

use crate::delivery::{DeliveryRequest, DeliveryType, ShippingAddress};

/// Text-backed enums: `as_str`/`parse` mirror the serde names so storage
/// columns and the wire agree.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:tt),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

text_enum!(
    /// Where the sale happened.
    SalesChannel {
        Online => "online",
        Physical => "physical",
    }
);

text_enum!(
    /// Fulfilment lifecycle. Transitions after creation are owned elsewhere.
    OrderStatus {
        Pending => "pending",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

text_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

text_enum!(PaymentMethod {
    Cash => "cash",
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    Pix => "pix",
    Other => "other",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub tenant_id: TenantId,
    pub customer_id: Option<CustomerId>,
    pub channel: SalesChannel,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub subtotal: u64,
    pub discount: u64,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<String>,
    pub shipping_cost: u64,
    pub total: u64,
    pub delivery_type: Option<DeliveryType>,
    pub delivery_option_id: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    pub cart_id: Option<CartId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    /// Price in smallest currency unit, as supplied by the caller.
    pub unit_price: u64,
    /// This line's share of the order-level discount.
    pub discount: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// One requested line: product, optional variant, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub unit_price: u64,
}

fn validate_lines(items: &[OrderLineInput]) -> DomainResult<()> {
    if items.is_empty() {
        return Err(DomainError::validation("order must contain at least one item"));
    }
    for (idx, line) in items.iter().enumerate() {
        if line.quantity == 0 {
            return Err(DomainError::validation(format!(
                "items[{idx}]: quantity must be positive"
            )));
        }
    }
    Ok(())
}

fn non_empty_code(code: &Option<String>) -> Option<&str> {
    code.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

/// Online checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderInput {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub items: Vec<OrderLineInput>,
    pub delivery_type: DeliveryType,
    pub delivery_option_id: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub cart_id: Option<CartId>,
}

impl CreateOrderInput {
    pub fn coupon_code(&self) -> Option<&str> {
        non_empty_code(&self.coupon_code)
    }

    /// Shape checks plus delivery resolution into its tagged form.
    pub fn validate(&self) -> DomainResult<DeliveryRequest> {
        validate_lines(&self.items)?;

        let option_id = self.delivery_option_id.trim();
        if option_id.is_empty() {
            return Err(DomainError::validation("delivery_option_id is required"));
        }

        match self.delivery_type {
            DeliveryType::Shipping => {
                let address = self
                    .shipping_address
                    .clone()
                    .ok_or_else(|| DomainError::validation("shipping_address is required for shipping"))?;
                let postal_code = address.postal_code()?;
                Ok(DeliveryRequest::Shipping {
                    option_id: option_id.to_string(),
                    postal_code,
                    address,
                })
            }
            DeliveryType::PickupPoint => {
                if self.shipping_address.is_some() {
                    return Err(DomainError::validation(
                        "shipping_address must be omitted for pickup_point delivery",
                    ));
                }
                let pickup_point_id: PickupPointId = option_id
                    .parse()
                    .map_err(|_| DomainError::validation("delivery_option_id must be a pickup point id"))?;
                Ok(DeliveryRequest::PickupPoint { pickup_point_id })
            }
        }
    }
}

/// Point-of-sale checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalSaleInput {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub seller_id: Option<UserId>,
    pub items: Vec<OrderLineInput>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    /// Cart-level manual discount in minor units.
    #[serde(default)]
    pub manual_discount: Option<u64>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub cart_id: Option<CartId>,
}

impl PhysicalSaleInput {
    pub fn coupon_code(&self) -> Option<&str> {
        non_empty_code(&self.coupon_code)
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_lines(&self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> OrderLineInput {
        OrderLineInput {
            product_id: ProductId::new(),
            variant_id: None,
            quantity: 1,
            unit_price: 1_000,
        }
    }

    fn address(postal_code: &str) -> ShippingAddress {
        ShippingAddress {
            recipient_name: Some("Ana".to_string()),
            postal_code: postal_code.to_string(),
            street: "Av. Paulista".to_string(),
            number: "1000".to_string(),
            complement: None,
            district: Some("Bela Vista".to_string()),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
        }
    }

    fn shipping_input() -> CreateOrderInput {
        CreateOrderInput {
            customer_id: None,
            items: vec![line()],
            delivery_type: DeliveryType::Shipping,
            delivery_option_id: "2".to_string(),
            coupon_code: None,
            shipping_address: Some(address("01310-100")),
            cart_id: None,
        }
    }

    #[test]
    fn shipping_input_resolves_to_tagged_request() {
        match shipping_input().validate().unwrap() {
            DeliveryRequest::Shipping {
                option_id,
                postal_code,
                ..
            } => {
                assert_eq!(option_id, "2");
                assert_eq!(postal_code.as_str(), "01310100");
            }
            other => panic!("unexpected delivery: {other:?}"),
        }
    }

    #[test]
    fn empty_items_are_rejected() {
        let mut input = shipping_input();
        input.items.clear();
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn zero_quantity_names_the_line() {
        let mut input = shipping_input();
        input.items.push(OrderLineInput { quantity: 0, ..line() });
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("items[1]"));
    }

    #[test]
    fn free_line_is_accepted() {
        let mut input = shipping_input();
        input.items.push(OrderLineInput { unit_price: 0, ..line() });
        assert!(input.validate().is_ok());
    }

    #[test]
    fn shipping_requires_address() {
        let mut input = shipping_input();
        input.shipping_address = None;
        assert!(input.validate().is_err());
    }

    #[test]
    fn malformed_postal_code_is_rejected() {
        let mut input = shipping_input();
        input.shipping_address = Some(address("1234"));
        assert!(input.validate().unwrap_err().to_string().contains("postal code"));
    }

    #[test]
    fn pickup_requires_pickup_point_id_and_no_address() {
        let id = PickupPointId::new();
        let mut input = shipping_input();
        input.delivery_type = DeliveryType::PickupPoint;
        input.delivery_option_id = id.to_string();
        assert!(input.validate().is_err());

        input.shipping_address = None;
        assert_eq!(
            input.validate().unwrap(),
            DeliveryRequest::PickupPoint { pickup_point_id: id }
        );

        input.delivery_option_id = "locker-7".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn blank_coupon_code_counts_as_absent() {
        let mut input = shipping_input();
        input.coupon_code = Some("   ".to_string());
        assert_eq!(input.coupon_code(), None);
        input.coupon_code = Some(" promo ".to_string());
        assert_eq!(input.coupon_code(), Some("promo"));
    }

    #[test]
    fn wire_field_names_are_preserved() {
        let json = serde_json::json!({
            "items": [{ "product_id": ProductId::new(), "quantity": 2, "unit_price": 1990 }],
            "delivery_type": "pickup_point",
            "delivery_option_id": PickupPointId::new().to_string(),
        });
        let input: CreateOrderInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.items[0].variant_id, None);
        assert_eq!(input.items[0].unit_price, 1_990);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn status_text_round_trips() {
        assert_eq!(OrderStatus::parse(OrderStatus::Completed.as_str()), Some(OrderStatus::Completed));
        assert_eq!(PaymentMethod::parse("credit_card"), Some(PaymentMethod::CreditCard));
        assert_eq!(serde_json::to_value(PaymentStatus::Paid).unwrap(), "paid");
    }
}
