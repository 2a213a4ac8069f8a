//! Manual stock operations on top of the ledger.

use std::sync::Arc;

use tracing::{info, instrument};

use storefront_core::{Clock, UserId};
use storefront_inventory::{MovementOrigin, NewStockMovement, StockKey, StockProjection};

use crate::error::StoreError;
use crate::ledger::StockLedger;

/// Receipts, returns and corrections, timestamped by the injected clock.
#[derive(Clone)]
pub struct StockService {
    ledger: Arc<dyn StockLedger>,
    clock: Arc<dyn Clock>,
}

impl StockService {
    pub fn new(ledger: Arc<dyn StockLedger>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Goods received from a supplier.
    #[instrument(skip(self), fields(key = %key), err)]
    pub async fn receive(
        &self,
        key: StockKey,
        quantity: u32,
        actor_id: Option<UserId>,
    ) -> Result<StockProjection, StoreError> {
        let movement = NewStockMovement::inbound(key, MovementOrigin::Purchase, quantity, self.clock.now());
        self.record(movement.with_actor(actor_id)).await
    }

    /// Goods returned by a customer.
    #[instrument(skip(self), fields(key = %key), err)]
    pub async fn record_return(
        &self,
        key: StockKey,
        quantity: u32,
        actor_id: Option<UserId>,
    ) -> Result<StockProjection, StoreError> {
        let movement = NewStockMovement::inbound(key, MovementOrigin::Return, quantity, self.clock.now());
        self.record(movement.with_actor(actor_id)).await
    }

    /// Relative correction upwards. Decreases go through [`Self::set_absolute`].
    #[instrument(skip(self), fields(key = %key), err)]
    pub async fn adjust_by(
        &self,
        key: StockKey,
        quantity: u32,
        actor_id: Option<UserId>,
    ) -> Result<StockProjection, StoreError> {
        let movement = NewStockMovement::adjust_by(key, MovementOrigin::Manual, quantity, self.clock.now());
        self.record(movement.with_actor(actor_id)).await
    }

    /// Stock count: pin the track to `target` with a checkpoint.
    ///
    /// The checkpoint is written even when the track already reads `target`;
    /// the count still fixes the level against movements racing with it.
    /// `quantity` holds the size of the correction seen here, at least 1.
    #[instrument(skip(self), fields(key = %key), err)]
    pub async fn set_absolute(
        &self,
        key: StockKey,
        target: u32,
        actor_id: Option<UserId>,
    ) -> Result<StockProjection, StoreError> {
        let current = self.ledger.current_stock(&key).await?.current_stock;
        let delta = current.abs_diff(u64::from(target)).max(1);
        let quantity = u32::try_from(delta).unwrap_or(u32::MAX);
        let movement =
            NewStockMovement::checkpoint(key, MovementOrigin::Adjustment, quantity, target, self.clock.now());
        info!(from = current, to = target, "stock count checkpoint");
        self.record(movement.with_actor(actor_id)).await
    }

    async fn record(&self, movement: NewStockMovement) -> Result<StockProjection, StoreError> {
        let key = movement.key();
        self.ledger.append(movement).await?;
        self.ledger.current_stock(&key).await
    }
}
