//! Checkout error taxonomy and its mapping from lower layers.

use serde::Serialize;
use thiserror::Error;

use storefront_core::{CartId, DomainError, ProductId, VariantId};
use storefront_sales::CouponRejection;

use crate::error::{CommitError, StoreError};

/// Error class used by transports to pick a status code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    BusinessRule,
    Internal,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        variant_id: Option<VariantId>,
        requested: u64,
        available: u64,
    },

    #[error("product {0} is not available for sale")]
    ProductUnavailable(ProductId),

    #[error("cart {0} is not active")]
    CartNotActive(CartId),

    #[error("invalid coupon: {0}")]
    InvalidCoupon(CouponRejection),

    #[error("invalid delivery option: {0}")]
    InvalidDeliveryOption(String),

    #[error("shipping quotes are currently unavailable")]
    ShippingUnavailable,

    /// Storage or unexpected failure. Detail is logged, never returned.
    #[error("internal error")]
    Internal,
}

impl CheckoutError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CheckoutError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Validation(_) => ErrorKind::Validation,
            CheckoutError::NotFound { .. } => ErrorKind::NotFound,
            CheckoutError::InsufficientStock { .. }
            | CheckoutError::ProductUnavailable(_)
            | CheckoutError::CartNotActive(_)
            | CheckoutError::InvalidCoupon(_)
            | CheckoutError::InvalidDeliveryOption(_)
            | CheckoutError::ShippingUnavailable => ErrorKind::BusinessRule,
            CheckoutError::Internal => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::Validation(_) => "validation_error",
            CheckoutError::NotFound { .. } => "not_found",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::ProductUnavailable(_) => "product_unavailable",
            CheckoutError::CartNotActive(_) => "cart_not_active",
            CheckoutError::InvalidCoupon(_) => "invalid_coupon",
            CheckoutError::InvalidDeliveryOption(_) => "invalid_delivery_option",
            CheckoutError::ShippingUnavailable => "shipping_unavailable",
            CheckoutError::Internal => "internal_error",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code(),
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// JSON error payload for transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<DomainError> for CheckoutError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => CheckoutError::Validation(msg),
            DomainError::InvariantViolation(msg) => {
                tracing::error!(error = %msg, "domain invariant violated during checkout");
                CheckoutError::Internal
            }
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(value: StoreError) -> Self {
        tracing::error!(error = %value, "store failure during checkout");
        CheckoutError::Internal
    }
}

impl From<CommitError> for CheckoutError {
    fn from(value: CommitError) -> Self {
        match value {
            CommitError::InsufficientStock {
                key,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                product_id: key.product_id,
                variant_id: key.variant_id,
                requested,
                available,
            },
            CommitError::CouponUnavailable(_) => CheckoutError::InvalidCoupon(CouponRejection::Exhausted),
            CommitError::CartNotActive(cart_id) => CheckoutError::CartNotActive(cart_id),
            CommitError::Store(err) => err.into(),
        }
    }
}

impl From<CouponRejection> for CheckoutError {
    fn from(value: CouponRejection) -> Self {
        CheckoutError::InvalidCoupon(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storefront_core::TenantId;
    use storefront_inventory::StockKey;

    #[test]
    fn commit_stock_failure_keeps_product_and_quantities() {
        let key = StockKey::base(TenantId::new(), ProductId::new());
        let err: CheckoutError = CommitError::InsufficientStock {
            key,
            requested: 6,
            available: 5,
        }
        .into();

        match err {
            CheckoutError::InsufficientStock {
                product_id,
                variant_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, key.product_id);
                assert_eq!(variant_id, None);
                assert_eq!((requested, available), (6, 5));
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn store_failures_are_opaque() {
        let err: CheckoutError = StoreError::Backend("connection reset by peer".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.body().message.contains("connection reset"));
    }

    #[test]
    fn classes_and_codes() {
        assert_eq!(CheckoutError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(CheckoutError::not_found("product", ProductId::new()).kind(), ErrorKind::NotFound);
        assert_eq!(CheckoutError::ShippingUnavailable.kind(), ErrorKind::BusinessRule);
        assert_eq!(CheckoutError::ShippingUnavailable.code(), "shipping_unavailable");

        let body = serde_json::to_value(CheckoutError::InvalidCoupon(CouponRejection::Expired).body()).unwrap();
        assert_eq!(body["error"], "invalid_coupon");
        assert_eq!(body["kind"], "business_rule");
    }
}
