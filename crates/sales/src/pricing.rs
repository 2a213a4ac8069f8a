//! Order arithmetic in integer minor units.

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult};

pub fn line_total(unit_price: u64, quantity: u32) -> DomainResult<u64> {
    unit_price
        .checked_mul(u64::from(quantity))
        .ok_or_else(|| DomainError::validation("line total overflows"))
}

/// Priced order summary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: u64,
    pub discount: u64,
    pub shipping_cost: u64,
    pub total: u64,
}

impl OrderTotals {
    /// total = (subtotal − discount) + shipping_cost
    pub fn compute(subtotal: u64, discount: u64, shipping_cost: u64) -> DomainResult<Self> {
        if discount > subtotal {
            return Err(DomainError::invariant("discount cannot exceed subtotal"));
        }
        let total = (subtotal - discount)
            .checked_add(shipping_cost)
            .ok_or_else(|| DomainError::validation("order total overflows"))?;
        Ok(Self {
            subtotal,
            discount,
            shipping_cost,
            total,
        })
    }
}

/// Split `discount` across lines proportionally to each line total.
///
/// Largest-remainder rounding: every share is floored, then the leftover minor
/// units go one each to the lines with the largest fractional remainder (ties
/// to the earlier line). Shares sum exactly to `min(discount, Σ lines)` and no
/// share exceeds its line total.
pub fn distribute_discount(line_totals: &[u64], discount: u64) -> Vec<u64> {
    let subtotal: u128 = line_totals.iter().map(|&v| u128::from(v)).sum();
    if subtotal == 0 || discount == 0 {
        return vec![0; line_totals.len()];
    }
    let discount = u128::from(discount).min(subtotal);

    let mut shares = Vec::with_capacity(line_totals.len());
    let mut remainders = Vec::with_capacity(line_totals.len());
    for (idx, &line) in line_totals.iter().enumerate() {
        let scaled = discount * u128::from(line);
        shares.push(scaled / subtotal);
        remainders.push((scaled % subtotal, idx));
    }

    let allotted: u128 = shares.iter().sum();
    let leftover = (discount - allotted) as usize;

    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, idx) in remainders.iter().take(leftover) {
        shares[idx] += 1;
    }

    shares.into_iter().map(|s| s as u64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn totals_apply_discount_then_shipping() {
        let t = OrderTotals::compute(10_000, 1_000, 500).unwrap();
        assert_eq!(t.total, 9_500);
    }

    #[test]
    fn discount_above_subtotal_is_an_invariant_violation() {
        assert!(matches!(
            OrderTotals::compute(100, 101, 0),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn line_total_overflow_is_rejected() {
        assert!(line_total(u64::MAX, 2).is_err());
        assert_eq!(line_total(1_250, 4).unwrap(), 5_000);
    }

    #[test]
    fn even_split() {
        assert_eq!(distribute_discount(&[1_000, 1_000], 500), vec![250, 250]);
    }

    #[test]
    fn leftover_cents_go_to_largest_remainders() {
        // 100 over three equal lines: 33.33 each, one leftover to the first
        assert_eq!(distribute_discount(&[300, 300, 300], 100), vec![34, 33, 33]);
        // 10 over 1:2 gives 3.33 and 6.66; leftover goes to the larger remainder
        assert_eq!(distribute_discount(&[100, 200], 10), vec![3, 7]);
    }

    #[test]
    fn discount_is_capped_at_subtotal() {
        assert_eq!(distribute_discount(&[100, 50], 1_000), vec![100, 50]);
    }

    #[test]
    fn zero_subtotal_or_discount_gives_zero_shares() {
        assert_eq!(distribute_discount(&[0, 0], 10), vec![0, 0]);
        assert_eq!(distribute_discount(&[10, 20], 0), vec![0, 0]);
        assert!(distribute_discount(&[], 10).is_empty());
    }

    proptest! {
        #[test]
        fn shares_sum_exactly_and_stay_within_lines(
            lines in prop::collection::vec(0u64..1_000_000, 1..20),
            discount in 0u64..5_000_000,
        ) {
            let shares = distribute_discount(&lines, discount);
            let subtotal: u64 = lines.iter().sum();
            prop_assert_eq!(shares.len(), lines.len());
            prop_assert_eq!(shares.iter().sum::<u64>(), discount.min(subtotal));
            for (share, line) in shares.iter().zip(&lines) {
                prop_assert!(share <= line);
            }
        }
    }
}
