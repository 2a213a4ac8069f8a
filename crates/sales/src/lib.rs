//! Sales domain module: orders, coupons, pricing and delivery rules.
//!
//! Pure, deterministic business logic (no IO, no HTTP, no storage). The
//! orchestration that touches stores lives in `storefront-infra`.

pub mod catalog;
pub mod coupon;
pub mod delivery;
pub mod order;
pub mod pricing;

pub use catalog::{Cart, CartStatus, PackageDimensions, PickupPoint, Product, ProductStatus, ProductVariant, StoreSettings};
pub use coupon::{AppliedCoupon, Coupon, CouponKind, CouponRejection, CouponValidation, evaluate_coupon, normalize_code};
pub use delivery::{
    DeliveryRequest, DeliveryType, PostalCode, ShippingAddress, ShippingItem, ShippingQuote, select_quote,
    shipping_cost,
};
pub use order::{
    CreateOrderInput, Order, OrderItem, OrderLineInput, OrderStatus, OrderWithItems, PaymentMethod, PaymentStatus,
    PhysicalSaleInput, SalesChannel,
};
pub use pricing::{OrderTotals, distribute_discount, line_total};
