//! Storage-layer errors.

use thiserror::Error;

use storefront_core::{CartId, CouponId, DomainError};
use storefront_inventory::StockKey;

/// Store operation error.
///
/// Infrastructure failures (backend, isolation) as opposed to business
/// rejections; callers above the store never see backend detail.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        StoreError::Invalid(value.to_string())
    }
}

/// Why an atomic order commit was refused. Nothing was written in any case.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("insufficient stock for {key}: requested {requested}, available {available}")]
    InsufficientStock {
        key: StockKey,
        requested: u64,
        available: u64,
    },

    #[error("coupon {0} can no longer be used")]
    CouponUnavailable(CouponId),

    #[error("cart {0} is not active")]
    CartNotActive(CartId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
