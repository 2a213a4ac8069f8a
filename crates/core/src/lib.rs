//! `storefront-core`: shared domain building blocks.
//!
//! Identifiers, the domain error model and the clock abstraction. No
//! infrastructure concerns live here.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{
    CartId, CouponId, CustomerId, MovementId, OrderId, OrderItemId, PickupPointId, ProductId,
    TenantId, UserId, VariantId,
};
