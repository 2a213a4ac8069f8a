//! Stock fold: ledger events → current on-hand quantity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{ProductId, VariantId};

use crate::movement::{MovementKind, StockKey, StockMovement};

/// Current stock for one track. Derived, never a source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockProjection {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub current_stock: u64,
    pub last_movement_at: Option<DateTime<Utc>>,
}

impl StockProjection {
    pub fn empty(key: &StockKey) -> Self {
        Self {
            product_id: key.product_id,
            variant_id: key.variant_id,
            current_stock: 0,
            last_movement_at: None,
        }
    }
}

/// Running accumulator of a fold, as kept by the materialised stock cache.
///
/// `raw` is deliberately signed and unclamped: the clamp applies to the
/// observed result only, so an IN after an oversold OUT continues from the
/// negative baseline exactly as a full replay would.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningTotal {
    pub raw: i64,
    pub last_movement_at: Option<DateTime<Utc>>,
    pub last_sequence: u64,
}

impl RunningTotal {
    /// Apply one movement. Callers are responsible for replay order.
    pub fn apply(&mut self, movement: &StockMovement) {
        let quantity = i64::from(movement.quantity);
        self.raw = match (movement.kind, movement.final_quantity) {
            (MovementKind::In, _) => self.raw.saturating_add(quantity),
            (MovementKind::Out, _) => self.raw.saturating_sub(quantity),
            (MovementKind::Adjust, Some(checkpoint)) => i64::from(checkpoint),
            (MovementKind::Adjust, None) => self.raw.saturating_add(quantity),
        };
        self.last_movement_at = Some(movement.occurred_at);
        self.last_sequence = movement.sequence;
    }

    /// Whether `movement` can be applied incrementally without breaking
    /// ascending replay order. Out-of-order arrivals require a full refold.
    pub fn is_in_order(&self, movement: &StockMovement) -> bool {
        match self.last_movement_at {
            None => true,
            Some(last) => (movement.occurred_at, movement.sequence) > (last, self.last_sequence),
        }
    }

    /// Replay every movement of `key` in ascending (timestamp, sequence) order.
    pub fn replay<'a>(key: &StockKey, movements: impl IntoIterator<Item = &'a StockMovement>) -> Self {
        let mut relevant: Vec<&StockMovement> = movements
            .into_iter()
            .filter(|m| m.key() == *key)
            .collect();
        relevant.sort_by_key(|m| m.replay_position());

        let mut total = Self::default();
        for m in relevant {
            total.apply(m);
        }
        total
    }

    pub fn current_stock(&self) -> u64 {
        self.raw.max(0) as u64
    }

    pub fn projection(&self, key: &StockKey) -> StockProjection {
        StockProjection {
            product_id: key.product_id,
            variant_id: key.variant_id,
            current_stock: self.current_stock(),
            last_movement_at: self.last_movement_at,
        }
    }
}

/// Fold all movements for `key` into its current stock.
///
/// Movements for other keys are ignored, so a whole tenant's ledger can be
/// passed in.
pub fn fold<'a>(key: &StockKey, movements: impl IntoIterator<Item = &'a StockMovement>) -> StockProjection {
    RunningTotal::replay(key, movements).projection(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{MovementOrigin, NewStockMovement};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use storefront_core::{MovementId, TenantId};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn stored(m: NewStockMovement, sequence: u64) -> StockMovement {
        m.into_stored(MovementId::new(), sequence)
    }

    fn key() -> StockKey {
        StockKey::base(TenantId::new(), ProductId::new())
    }

    #[test]
    fn empty_history_is_zero_without_timestamp() {
        let k = key();
        let p = fold(&k, std::iter::empty());
        assert_eq!(p.current_stock, 0);
        assert_eq!(p.last_movement_at, None);
    }

    #[test]
    fn in_and_out_accumulate() {
        let k = key();
        let history = vec![
            stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 10, t(0)), 1),
            stored(NewStockMovement::outbound(k, MovementOrigin::Order, 4, t(1)), 2),
        ];
        let p = fold(&k, &history);
        assert_eq!(p.current_stock, 6);
        assert_eq!(p.last_movement_at, Some(t(1)));
    }

    #[test]
    fn checkpoint_replaces_then_accumulation_resumes() {
        let k = key();
        let history = vec![
            stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 10, t(0)), 1),
            stored(NewStockMovement::checkpoint(k, MovementOrigin::Adjustment, 7, 3, t(1)), 2),
            stored(NewStockMovement::inbound(k, MovementOrigin::Return, 2, t(2)), 3),
        ];
        assert_eq!(fold(&k, &history).current_stock, 5);
    }

    #[test]
    fn relative_adjust_adds() {
        let k = key();
        let history = vec![
            stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 1, t(0)), 1),
            stored(NewStockMovement::adjust_by(k, MovementOrigin::Manual, 4, t(1)), 2),
        ];
        assert_eq!(fold(&k, &history).current_stock, 5);
    }

    #[test]
    fn result_is_clamped_but_raw_total_carries_on() {
        let k = key();
        let history = vec![
            stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 2, t(0)), 1),
            stored(NewStockMovement::outbound(k, MovementOrigin::Order, 5, t(1)), 2),
        ];
        assert_eq!(fold(&k, &history).current_stock, 0);

        let mut more = history.clone();
        more.push(stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 4, t(2)), 3));
        assert_eq!(fold(&k, &more).current_stock, 1);
    }

    #[test]
    fn variant_and_base_tracks_never_mix() {
        let tenant = TenantId::new();
        let product = ProductId::new();
        let base = StockKey::base(tenant, product);
        let variant = StockKey::variant(tenant, product, VariantId::new());
        let history = vec![
            stored(NewStockMovement::inbound(base, MovementOrigin::Purchase, 3, t(0)), 1),
            stored(NewStockMovement::inbound(variant, MovementOrigin::Purchase, 8, t(1)), 2),
        ];
        assert_eq!(fold(&base, &history).current_stock, 3);
        assert_eq!(fold(&variant, &history).current_stock, 8);
    }

    #[test]
    fn replay_uses_timestamp_order_not_slice_order() {
        let k = key();
        let history = vec![
            stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 5, t(5)), 2),
            stored(NewStockMovement::checkpoint(k, MovementOrigin::Adjustment, 1, 1, t(1)), 1),
        ];
        // checkpoint at t1 first, then +5
        assert_eq!(fold(&k, &history).current_stock, 6);
    }

    #[test]
    fn equal_timestamps_replay_by_sequence() {
        let k = key();
        let history = vec![
            stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 4, t(0)), 2),
            stored(NewStockMovement::checkpoint(k, MovementOrigin::Adjustment, 1, 9, t(0)), 1),
        ];
        assert_eq!(fold(&k, &history).current_stock, 13);
    }

    #[test]
    fn out_of_order_movement_is_detected() {
        let k = key();
        let mut total = RunningTotal::default();
        let first = stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 1, t(10)), 1);
        total.apply(&first);

        let late = stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 1, t(5)), 2);
        let same_instant = stored(NewStockMovement::inbound(k, MovementOrigin::Purchase, 1, t(10)), 3);
        assert!(!total.is_in_order(&late));
        assert!(total.is_in_order(&same_instant));
    }

    fn arb_history(k: StockKey) -> impl Strategy<Value = Vec<StockMovement>> {
        prop::collection::vec((0u8..4, 1u32..50, 0u32..60, 0i64..20), 0..40).prop_map(move |specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(idx, (kind, qty, fin, at))| {
                    let m = match kind {
                        0 => NewStockMovement::inbound(k, MovementOrigin::Purchase, qty, t(at)),
                        1 => NewStockMovement::outbound(k, MovementOrigin::Order, qty, t(at)),
                        2 => NewStockMovement::adjust_by(k, MovementOrigin::Manual, qty, t(at)),
                        _ => NewStockMovement::checkpoint(k, MovementOrigin::Adjustment, qty, fin, t(at)),
                    };
                    stored(m, idx as u64 + 1)
                })
                .collect()
        })
    }

    fn fixed_key() -> StockKey {
        StockKey::base(
            TenantId::from_uuid(uuid::Uuid::from_u128(1)),
            ProductId::from_uuid(uuid::Uuid::from_u128(2)),
        )
    }

    proptest! {
        #[test]
        fn fold_never_negative_and_independent_of_input_order(
            history in arb_history(fixed_key()),
            rotation in any::<usize>(),
        ) {
            let k = fixed_key();
            let mut rotated = history.clone();
            if !rotated.is_empty() {
                let n = rotation % rotated.len();
                rotated.rotate_left(n);
            }
            let a = fold(&k, &history);
            let b = fold(&k, &rotated);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a, &fold(&k, &history));
            prop_assert_eq!(a.current_stock as i64, RunningTotal::replay(&k, &history).raw.max(0));
        }

        #[test]
        fn incremental_application_matches_full_replay(history in arb_history(fixed_key())) {
            let k = fixed_key();
            let mut ordered = history.clone();
            ordered.sort_by_key(|m| m.replay_position());

            let mut running = RunningTotal::default();
            for m in &ordered {
                prop_assert!(running.is_in_order(m));
                running.apply(m);
            }
            prop_assert_eq!(running.projection(&k), fold(&k, &history));
        }
    }
}
