use std::sync::Arc;

use tracing::instrument;

use storefront_core::{Clock, TenantId};
use storefront_sales::{CouponValidation, evaluate_coupon};

use super::{CheckoutDeps, CheckoutError};
use crate::ports::CouponStore;

/// Answers "would this code apply to this subtotal?" without consuming it.
#[derive(Clone)]
pub struct CouponValidator {
    coupons: Arc<dyn CouponStore>,
    clock: Arc<dyn Clock>,
}

impl CouponValidator {
    pub fn new(coupons: Arc<dyn CouponStore>, clock: Arc<dyn Clock>) -> Self {
        Self { coupons, clock }
    }

    pub fn from_deps(deps: &CheckoutDeps) -> Self {
        Self::new(deps.coupons.clone(), deps.clock.clone())
    }

    /// Rejections are part of the answer (`valid = false` plus a message).
    /// A blank code matches nothing and is answered as not found. Only a
    /// store failure is an error.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn validate(
        &self,
        tenant_id: TenantId,
        code: &str,
        subtotal: u64,
    ) -> Result<CouponValidation, CheckoutError> {
        let code = code.trim();
        let coupon = if code.is_empty() {
            None
        } else {
            self.coupons.find_by_code(tenant_id, code).await?
        };
        Ok(evaluate_coupon(coupon.as_ref(), subtotal, self.clock.now()).into())
    }
}
