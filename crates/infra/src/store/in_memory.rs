//! In-memory implementation of every store port.
//!
//! Intended for tests/dev. A single lock guards all state, so the stock
//! re-check and the writes of one commit happen under one write guard and
//! concurrent commits are serialised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use storefront_core::{CartId, CouponId, MovementId, OrderId, PickupPointId, ProductId, TenantId};
use storefront_inventory::{NewStockMovement, RunningTotal, StockKey, StockMovement, StockProjection};
use storefront_sales::{
    Cart, CartStatus, Coupon, Order, OrderItem, OrderWithItems, PickupPoint, Product, StoreSettings, normalize_code,
};

use crate::error::{CommitError, StoreError};
use crate::ledger::StockLedger;
use crate::ports::{CartStore, CouponStore, PickupPointDirectory, ProductCatalog, StoreSettingsDirectory};
use crate::store::{OrderCommit, OrderStore};

#[derive(Debug, Default)]
struct State {
    products: HashMap<(TenantId, ProductId), Product>,
    pickup_points: HashMap<(TenantId, PickupPointId), PickupPoint>,
    carts: HashMap<(TenantId, CartId), Cart>,
    coupons: HashMap<(TenantId, CouponId), Coupon>,
    settings: HashMap<TenantId, StoreSettings>,
    movements: Vec<StockMovement>,
    levels: HashMap<StockKey, RunningTotal>,
    orders: HashMap<(TenantId, OrderId), Order>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
    last_sequence: u64,
}

impl State {
    fn level(&self, key: &StockKey) -> RunningTotal {
        self.levels.get(key).copied().unwrap_or_default()
    }

    fn append_movement(&mut self, movement: NewStockMovement) -> StockMovement {
        self.last_sequence += 1;
        let stored = movement.into_stored(MovementId::new(), self.last_sequence);
        let key = stored.key();

        let level = self.level(&key);
        let updated = if level.is_in_order(&stored) {
            let mut level = level;
            level.apply(&stored);
            level
        } else {
            debug!(key = %key, sequence = stored.sequence, "out-of-order movement, refolding track");
            RunningTotal::replay(&key, self.movements.iter().chain(std::iter::once(&stored)))
        };

        self.levels.insert(key, updated);
        self.movements.push(stored.clone());
        stored
    }

    fn find_coupon_by_code(&self, tenant_id: TenantId, code: &str) -> Option<&Coupon> {
        let code = normalize_code(code);
        self.coupons
            .values()
            .find(|c| c.tenant_id == tenant_id && normalize_code(&c.code) == code)
    }

    fn coupon_usable(&self, tenant_id: TenantId, coupon_id: CouponId) -> bool {
        self.coupons
            .get(&(tenant_id, coupon_id))
            .is_some_and(|c| c.active && !c.is_exhausted())
    }

    fn cart_active(&self, tenant_id: TenantId, cart_id: CartId) -> bool {
        self.carts
            .get(&(tenant_id, cart_id))
            .is_some_and(|c| c.status == CartStatus::Active)
    }
}

/// All ports over one shared in-process state.
#[derive(Debug, Default)]
pub struct InMemoryCommerceStore {
    state: RwLock<State>,
    fail_next_commit: AtomicBool,
}

impl InMemoryCommerceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    pub fn insert_product(&self, product: Product) -> Result<(), StoreError> {
        self.write()?.products.insert((product.tenant_id, product.id), product);
        Ok(())
    }

    pub fn insert_pickup_point(&self, pickup_point: PickupPoint) -> Result<(), StoreError> {
        self.write()?
            .pickup_points
            .insert((pickup_point.tenant_id, pickup_point.id), pickup_point);
        Ok(())
    }

    pub fn insert_cart(&self, cart: Cart) -> Result<(), StoreError> {
        self.write()?.carts.insert((cart.tenant_id, cart.id), cart);
        Ok(())
    }

    pub fn insert_coupon(&self, coupon: Coupon) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.find_coupon_by_code(coupon.tenant_id, &coupon.code).is_some_and(|c| c.id != coupon.id) {
            return Err(StoreError::Invalid(format!(
                "coupon code '{}' already exists for tenant {}",
                coupon.code, coupon.tenant_id
            )));
        }
        state.coupons.insert((coupon.tenant_id, coupon.id), coupon);
        Ok(())
    }

    pub fn set_settings(&self, tenant_id: TenantId, settings: StoreSettings) -> Result<(), StoreError> {
        self.write()?.settings.insert(tenant_id, settings);
        Ok(())
    }

    /// Make the next `commit_order` fail with a backend error after all
    /// checks pass, as a crashed transaction would.
    #[cfg(test)]
    pub(crate) fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn order_count(&self, tenant_id: TenantId) -> Result<usize, StoreError> {
        Ok(self.read()?.orders.keys().filter(|(t, _)| *t == tenant_id).count())
    }

    pub fn movement_count(&self, tenant_id: TenantId) -> Result<usize, StoreError> {
        Ok(self.read()?.movements.iter().filter(|m| m.tenant_id == tenant_id).count())
    }

    #[cfg(test)]
    pub(crate) fn overwrite_cached_level(&self, key: StockKey, raw: i64) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let mut level = state.level(&key);
        level.raw = raw;
        state.levels.insert(key, level);
        Ok(())
    }
}

#[async_trait]
impl StockLedger for InMemoryCommerceStore {
    async fn append(&self, movement: NewStockMovement) -> Result<StockMovement, StoreError> {
        movement.validate()?;
        let mut state = self.write()?;
        Ok(state.append_movement(movement))
    }

    async fn movements(&self, key: &StockKey) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.read()?;
        let mut movements: Vec<StockMovement> = state.movements.iter().filter(|m| m.key() == *key).cloned().collect();
        movements.sort_by_key(|m| m.replay_position());
        Ok(movements)
    }

    async fn current_stock(&self, key: &StockKey) -> Result<StockProjection, StoreError> {
        Ok(self.read()?.level(key).projection(key))
    }

    async fn reconcile(&self, key: &StockKey) -> Result<StockProjection, StoreError> {
        let mut state = self.write()?;
        let cached = state.level(key);
        let recomputed = RunningTotal::replay(key, &state.movements);
        if cached != recomputed {
            warn!(
                key = %key,
                cached = cached.raw,
                recomputed = recomputed.raw,
                "stock cache diverged from ledger, overwriting"
            );
        }
        state.levels.insert(*key, recomputed);
        Ok(recomputed.projection(key))
    }
}

#[async_trait]
impl OrderStore for InMemoryCommerceStore {
    async fn commit_order(&self, commit: OrderCommit) -> Result<(), CommitError> {
        commit.validate()?;
        let tenant_id = commit.tenant_id();
        let requirements = commit.requirements();

        let mut state = self.write()?;

        let mut floors = HashMap::with_capacity(requirements.len());
        for (key, requested) in &requirements {
            let level = state.level(key);
            floors.insert(*key, level.last_movement_at);
            let available = level.current_stock();
            if available < *requested {
                return Err(CommitError::InsufficientStock {
                    key: *key,
                    requested: *requested,
                    available,
                });
            }
        }
        if let Some(coupon_id) = commit.order.coupon_id {
            if !state.coupon_usable(tenant_id, coupon_id) {
                return Err(CommitError::CouponUnavailable(coupon_id));
            }
        }
        if let Some(cart_id) = commit.order.cart_id {
            if !state.cart_active(tenant_id, cart_id) {
                return Err(CommitError::CartNotActive(cart_id));
            }
        }
        if state.orders.contains_key(&(tenant_id, commit.order.id)) {
            return Err(StoreError::Invalid(format!("order {} already exists", commit.order.id)).into());
        }
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".to_string()).into());
        }

        // Every check passed; nothing below can fail.
        for movement in commit.movements {
            let floor = floors.get(&movement.key()).copied().flatten();
            state.append_movement(movement.not_before(floor));
        }
        if let Some(coupon_id) = commit.order.coupon_id {
            if let Some(coupon) = state.coupons.get_mut(&(tenant_id, coupon_id)) {
                coupon.used_count += 1;
            }
        }
        if let Some(cart_id) = commit.order.cart_id {
            if let Some(cart) = state.carts.get_mut(&(tenant_id, cart_id)) {
                cart.status = CartStatus::Converted;
            }
        }
        state.order_items.insert(commit.order.id, commit.items);
        state.orders.insert((tenant_id, commit.order.id), commit.order);
        Ok(())
    }

    async fn find_order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Option<OrderWithItems>, StoreError> {
        let state = self.read()?;
        Ok(state.orders.get(&(tenant_id, order_id)).map(|order| OrderWithItems {
            order: order.clone(),
            items: state.order_items.get(&order_id).cloned().unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCommerceStore {
    async fn find_product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&(tenant_id, product_id)).cloned())
    }
}

#[async_trait]
impl PickupPointDirectory for InMemoryCommerceStore {
    async fn find_pickup_point(
        &self,
        tenant_id: TenantId,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<PickupPoint>, StoreError> {
        Ok(self.read()?.pickup_points.get(&(tenant_id, pickup_point_id)).cloned())
    }
}

#[async_trait]
impl CartStore for InMemoryCommerceStore {
    async fn find_cart(&self, tenant_id: TenantId, cart_id: CartId) -> Result<Option<Cart>, StoreError> {
        Ok(self.read()?.carts.get(&(tenant_id, cart_id)).cloned())
    }

    async fn mark_converted(&self, tenant_id: TenantId, cart_id: CartId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        match state.carts.get_mut(&(tenant_id, cart_id)) {
            Some(cart) if cart.status == CartStatus::Active => {
                cart.status = CartStatus::Converted;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CouponStore for InMemoryCommerceStore {
    async fn find_by_code(&self, tenant_id: TenantId, code: &str) -> Result<Option<Coupon>, StoreError> {
        Ok(self.read()?.find_coupon_by_code(tenant_id, code).cloned())
    }

    async fn increment_used(&self, tenant_id: TenantId, coupon_id: CouponId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        match state.coupons.get_mut(&(tenant_id, coupon_id)) {
            Some(coupon) if coupon.active && !coupon.is_exhausted() => {
                coupon.used_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl StoreSettingsDirectory for InMemoryCommerceStore {
    async fn find_settings(&self, tenant_id: TenantId) -> Result<StoreSettings, StoreError> {
        Ok(self.read()?.settings.get(&tenant_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone, Utc};
    use storefront_inventory::MovementOrigin;
    use storefront_sales::CouponKind;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn coupon(tenant_id: TenantId, code: &str, max_uses: Option<u32>) -> Coupon {
        Coupon {
            id: CouponId::new(),
            tenant_id,
            code: code.to_string(),
            kind: CouponKind::Percent,
            value: 10,
            min_value: None,
            max_uses,
            used_count: 0,
            expires_at: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn appends_assign_increasing_sequences_and_update_stock() {
        let store = InMemoryCommerceStore::new();
        let key = StockKey::base(test_tenant_id(), ProductId::new());
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();

        let first = store
            .append(NewStockMovement::inbound(key, MovementOrigin::Purchase, 10, at))
            .await
            .unwrap();
        let second = store
            .append(NewStockMovement::outbound(key, MovementOrigin::Order, 4, at))
            .await
            .unwrap();

        assert!(second.sequence > first.sequence);
        assert_eq!(store.current_stock(&key).await.unwrap().current_stock, 6);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_and_not_stored() {
        let store = InMemoryCommerceStore::new();
        let tenant_id = test_tenant_id();
        let key = StockKey::base(tenant_id, ProductId::new());

        let err = store
            .append(NewStockMovement::inbound(key, MovementOrigin::Purchase, 0, Utc::now()))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(store.movement_count(tenant_id).unwrap(), 0);
    }

    #[tokio::test]
    async fn out_of_order_append_refolds_the_track() {
        let store = InMemoryCommerceStore::new();
        let key = StockKey::base(test_tenant_id(), ProductId::new());
        let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        store
            .append(NewStockMovement::checkpoint(key, MovementOrigin::Adjustment, 5, 5, t1))
            .await
            .unwrap();
        // Backdated receipt lands before the checkpoint and is overridden by it.
        store
            .append(NewStockMovement::inbound(key, MovementOrigin::Purchase, 7, t1 - Duration::hours(1)))
            .await
            .unwrap();

        let projection = store.current_stock(&key).await.unwrap();
        assert_eq!(projection.current_stock, 5);
        assert_eq!(projection.last_movement_at, Some(t1));

        let movements = store.movements(&key).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements[0].occurred_at < movements[1].occurred_at);
    }

    #[tokio::test]
    async fn reconcile_repairs_a_diverged_cache() {
        let store = InMemoryCommerceStore::new();
        let key = StockKey::base(test_tenant_id(), ProductId::new());
        store
            .append(NewStockMovement::inbound(key, MovementOrigin::Purchase, 8, Utc::now()))
            .await
            .unwrap();
        store.overwrite_cached_level(key, 1).unwrap();
        assert_eq!(store.current_stock(&key).await.unwrap().current_stock, 1);

        let repaired = store.reconcile(&key).await.unwrap();

        assert_eq!(repaired.current_stock, 8);
        assert_eq!(store.current_stock(&key).await.unwrap().current_stock, 8);
    }

    #[tokio::test]
    async fn lookups_are_tenant_scoped() {
        let store = InMemoryCommerceStore::new();
        let tenant_a = test_tenant_id();
        let tenant_b = test_tenant_id();
        let c = coupon(tenant_a, "SAVE10", None);
        store.insert_coupon(c.clone()).unwrap();

        assert!(store.find_by_code(tenant_a, " save10 ").await.unwrap().is_some());
        assert!(store.find_by_code(tenant_b, "SAVE10").await.unwrap().is_none());
        assert!(!store.increment_used(tenant_b, c.id).await.unwrap());
    }

    #[tokio::test]
    async fn increment_used_stops_at_max_uses() {
        let store = InMemoryCommerceStore::new();
        let tenant_id = test_tenant_id();
        let c = coupon(tenant_id, "ONCE", Some(1));
        store.insert_coupon(c.clone()).unwrap();

        assert!(store.increment_used(tenant_id, c.id).await.unwrap());
        assert!(!store.increment_used(tenant_id, c.id).await.unwrap());
        let stored = store.find_by_code(tenant_id, "ONCE").await.unwrap().unwrap();
        assert_eq!(stored.used_count, 1);
    }

    #[tokio::test]
    async fn duplicate_coupon_code_is_rejected() {
        let store = InMemoryCommerceStore::new();
        let tenant_id = test_tenant_id();
        store.insert_coupon(coupon(tenant_id, "DUP", None)).unwrap();

        let err = store.insert_coupon(coupon(tenant_id, "dup", None)).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn mark_converted_only_moves_active_carts() {
        let store = InMemoryCommerceStore::new();
        let tenant_id = test_tenant_id();
        let cart = Cart {
            id: CartId::new(),
            tenant_id,
            customer_id: None,
            status: CartStatus::Active,
        };
        store.insert_cart(cart.clone()).unwrap();

        assert!(store.mark_converted(tenant_id, cart.id).await.unwrap());
        assert!(!store.mark_converted(tenant_id, cart.id).await.unwrap());
        let stored = store.find_cart(tenant_id, cart.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CartStatus::Converted);
    }
}
