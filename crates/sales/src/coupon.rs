//! Coupon validation.
//!
//! The decision is a pure function of the coupon record, the order subtotal
//! and the current time. Checks run in a fixed order and the first failure
//! wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{CouponId, TenantId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    Percent,
    Fixed,
}

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponKind::Percent => "percent",
            CouponKind::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percent" => Some(CouponKind::Percent),
            "fixed" => Some(CouponKind::Fixed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub tenant_id: TenantId,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    /// Percentage points for `percent`, minor units for `fixed`.
    pub value: u64,
    pub min_value: Option<u64>,
    pub max_uses: Option<u32>,
    pub used_count: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl Coupon {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.used_count >= max)
    }

    /// Discount for `subtotal`, never more than the subtotal itself.
    pub fn discount_for(&self, subtotal: u64) -> u64 {
        let raw = match self.kind {
            CouponKind::Percent => {
                let scaled = u128::from(subtotal) * u128::from(self.value) / 100;
                u64::try_from(scaled).unwrap_or(u64::MAX)
            }
            CouponKind::Fixed => self.value,
        };
        raw.min(subtotal)
    }
}

/// Canonical form used for lookups: surrounding whitespace dropped, upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon not found")]
    NotFound,

    #[error("coupon is inactive")]
    Inactive,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon usage limit reached")]
    Exhausted,

    #[error("order subtotal is below the coupon minimum of {min_value}")]
    BelowMinimum { min_value: u64 },
}

/// A coupon that passed validation, with its computed effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon_id: CouponId,
    pub code: String,
    pub kind: CouponKind,
    pub value: u64,
    pub discount: u64,
    pub final_price: u64,
}

pub fn evaluate_coupon(
    coupon: Option<&Coupon>,
    subtotal: u64,
    now: DateTime<Utc>,
) -> Result<AppliedCoupon, CouponRejection> {
    let coupon = coupon.ok_or(CouponRejection::NotFound)?;

    if !coupon.active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.is_expired(now) {
        return Err(CouponRejection::Expired);
    }
    if coupon.is_exhausted() {
        return Err(CouponRejection::Exhausted);
    }
    if let Some(min_value) = coupon.min_value {
        if subtotal < min_value {
            return Err(CouponRejection::BelowMinimum { min_value });
        }
    }

    let discount = coupon.discount_for(subtotal);
    Ok(AppliedCoupon {
        coupon_id: coupon.id,
        code: coupon.code.clone(),
        kind: coupon.kind,
        value: coupon.value,
        discount,
        final_price: subtotal - discount,
    })
}

/// Wire shape of a validation answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponValidation {
    pub valid: bool,
    pub discount_type: Option<CouponKind>,
    pub discount_value: Option<u64>,
    pub discount_amount: Option<u64>,
    pub final_price: Option<u64>,
    pub message: String,
}

impl From<Result<AppliedCoupon, CouponRejection>> for CouponValidation {
    fn from(value: Result<AppliedCoupon, CouponRejection>) -> Self {
        match value {
            Ok(applied) => Self {
                valid: true,
                discount_type: Some(applied.kind),
                discount_value: Some(applied.value),
                discount_amount: Some(applied.discount),
                final_price: Some(applied.final_price),
                message: "coupon applied".to_string(),
            },
            Err(rejection) => Self {
                valid: false,
                discount_type: None,
                discount_value: None,
                discount_amount: None,
                final_price: None,
                message: rejection.to_string(),
            },
        }
    }
}
