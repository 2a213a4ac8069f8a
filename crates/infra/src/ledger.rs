//! Stock ledger port.

use async_trait::async_trait;

use storefront_inventory::{NewStockMovement, StockKey, StockMovement, StockProjection};

use crate::error::StoreError;

/// Append-only log of stock movements plus the derived per-track stock.
///
/// Movements are never updated or deleted. `current_stock` must always equal
/// the fold of `movements` for the same key, whichever way an implementation
/// caches it.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Validate and append one movement, returning it with its assigned id
    /// and sequence.
    async fn append(&self, movement: NewStockMovement) -> Result<StockMovement, StoreError>;

    /// Every movement of one track in replay order.
    async fn movements(&self, key: &StockKey) -> Result<Vec<StockMovement>, StoreError>;

    /// Current stock for one track. A track with no movements has stock 0.
    async fn current_stock(&self, key: &StockKey) -> Result<StockProjection, StoreError>;

    /// Recompute the track from the full ledger and overwrite any cached
    /// level. Returns the recomputed projection.
    async fn reconcile(&self, key: &StockKey) -> Result<StockProjection, StoreError>;
}
