use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, MovementId, ProductId, TenantId, UserId, VariantId};

/// Identity of one independent stock track.
///
/// `variant_id = None` is the base-product track; each variant has its own
/// track and the two never mix.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

impl StockKey {
    pub fn new(tenant_id: TenantId, product_id: ProductId, variant_id: Option<VariantId>) -> Self {
        Self {
            tenant_id,
            product_id,
            variant_id,
        }
    }

    pub fn base(tenant_id: TenantId, product_id: ProductId) -> Self {
        Self::new(tenant_id, product_id, None)
    }

    pub fn variant(tenant_id: TenantId, product_id: ProductId, variant_id: VariantId) -> Self {
        Self::new(tenant_id, product_id, Some(variant_id))
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.variant_id {
            Some(v) => write!(f, "{}/{}/{}", self.tenant_id, self.product_id, v),
            None => write!(f, "{}/{}", self.tenant_id, self.product_id),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementKind {
    In,
    Out,
    Adjust,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "IN",
            MovementKind::Out => "OUT",
            MovementKind::Adjust => "ADJUST",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "IN" => Ok(MovementKind::In),
            "OUT" => Ok(MovementKind::Out),
            "ADJUST" => Ok(MovementKind::Adjust),
            other => Err(DomainError::validation(format!("unknown movement kind '{other}'"))),
        }
    }
}

/// Provenance of a movement.
///
/// Known producers get their own variant; anything else is kept verbatim in
/// `Other` so imported history is never rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MovementOrigin {
    Order,
    PhysicalSale,
    Purchase,
    Return,
    Manual,
    Adjustment,
    Other(String),
}

impl MovementOrigin {
    pub fn as_str(&self) -> &str {
        match self {
            MovementOrigin::Order => "order",
            MovementOrigin::PhysicalSale => "physical_sale",
            MovementOrigin::Purchase => "purchase",
            MovementOrigin::Return => "return",
            MovementOrigin::Manual => "manual",
            MovementOrigin::Adjustment => "adjustment",
            MovementOrigin::Other(tag) => tag,
        }
    }
}

impl From<String> for MovementOrigin {
    fn from(value: String) -> Self {
        match value.as_str() {
            "order" => MovementOrigin::Order,
            "physical_sale" => MovementOrigin::PhysicalSale,
            "purchase" => MovementOrigin::Purchase,
            "return" => MovementOrigin::Return,
            "manual" => MovementOrigin::Manual,
            "adjustment" => MovementOrigin::Adjustment,
            _ => MovementOrigin::Other(value),
        }
    }
}

impl From<MovementOrigin> for String {
    fn from(value: MovementOrigin) -> Self {
        match value {
            MovementOrigin::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for MovementOrigin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A movement ready to be appended (no id or sequence yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockMovement {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub kind: MovementKind,
    pub origin: MovementOrigin,
    pub quantity: u32,
    pub final_quantity: Option<u32>,
    pub actor_id: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

impl NewStockMovement {
    fn relative(
        key: StockKey,
        kind: MovementKind,
        origin: MovementOrigin,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: key.tenant_id,
            product_id: key.product_id,
            variant_id: key.variant_id,
            kind,
            origin,
            quantity,
            final_quantity: None,
            actor_id: None,
            occurred_at,
        }
    }

    pub fn inbound(key: StockKey, origin: MovementOrigin, quantity: u32, occurred_at: DateTime<Utc>) -> Self {
        Self::relative(key, MovementKind::In, origin, quantity, occurred_at)
    }

    pub fn outbound(key: StockKey, origin: MovementOrigin, quantity: u32, occurred_at: DateTime<Utc>) -> Self {
        Self::relative(key, MovementKind::Out, origin, quantity, occurred_at)
    }

    /// Relative adjustment: adds `quantity` to the running total.
    pub fn adjust_by(key: StockKey, origin: MovementOrigin, quantity: u32, occurred_at: DateTime<Utc>) -> Self {
        Self::relative(key, MovementKind::Adjust, origin, quantity, occurred_at)
    }

    /// Checkpoint: resets the running total to `final_quantity`.
    ///
    /// `quantity` records the size of the correction for audit; it does not
    /// take part in the fold.
    pub fn checkpoint(
        key: StockKey,
        origin: MovementOrigin,
        quantity: u32,
        final_quantity: u32,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            final_quantity: Some(final_quantity),
            ..Self::relative(key, MovementKind::Adjust, origin, quantity, occurred_at)
        }
    }

    pub fn with_actor(mut self, actor_id: Option<UserId>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.tenant_id, self.product_id, self.variant_id)
    }

    /// Move `occurred_at` up to `floor` when it is earlier. With the larger
    /// sequence the store assigns on append, the movement then replays after
    /// everything already recorded on its track.
    pub fn not_before(mut self, floor: Option<DateTime<Utc>>) -> Self {
        if let Some(floor) = floor {
            self.occurred_at = self.occurred_at.max(floor);
        }
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity == 0 {
            return Err(DomainError::validation("movement quantity must be positive"));
        }
        if self.final_quantity.is_some() && self.kind != MovementKind::Adjust {
            return Err(DomainError::validation(format!(
                "final_quantity is only allowed on ADJUST movements (got {})",
                self.kind.as_str()
            )));
        }
        Ok(())
    }

    /// Stamp the movement with its storage identity.
    pub fn into_stored(self, id: MovementId, sequence: u64) -> StockMovement {
        StockMovement {
            id,
            sequence,
            tenant_id: self.tenant_id,
            product_id: self.product_id,
            variant_id: self.variant_id,
            kind: self.kind,
            origin: self.origin,
            quantity: self.quantity,
            final_quantity: self.final_quantity,
            actor_id: self.actor_id,
            occurred_at: self.occurred_at,
        }
    }
}

/// An immutable, persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    /// Store-assigned append position; breaks ties between equal timestamps.
    pub sequence: u64,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub kind: MovementKind,
    pub origin: MovementOrigin,
    pub quantity: u32,
    pub final_quantity: Option<u32>,
    pub actor_id: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.tenant_id, self.product_id, self.variant_id)
    }

    /// Replay order: timestamp, then append sequence.
    pub fn replay_position(&self) -> (DateTime<Utc>, u64) {
        (self.occurred_at, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StockKey {
        StockKey::base(TenantId::new(), ProductId::new())
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let m = NewStockMovement::inbound(key(), MovementOrigin::Manual, 0, Utc::now());
        assert!(matches!(m.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn final_quantity_on_non_adjust_is_rejected() {
        let mut m = NewStockMovement::outbound(key(), MovementOrigin::Order, 1, Utc::now());
        m.final_quantity = Some(3);
        let err = m.validate().unwrap_err();
        assert!(err.to_string().contains("OUT"));
    }

    #[test]
    fn checkpoint_is_a_valid_adjust() {
        let m = NewStockMovement::checkpoint(key(), MovementOrigin::Adjustment, 2, 7, Utc::now());
        assert_eq!(m.kind, MovementKind::Adjust);
        assert_eq!(m.final_quantity, Some(7));
        assert!(m.validate().is_ok());
    }

    #[test]
    fn not_before_only_moves_forward() {
        let at = Utc::now();
        let later = at + chrono::Duration::seconds(5);
        let m = NewStockMovement::outbound(key(), MovementOrigin::Order, 1, at);

        assert_eq!(m.clone().not_before(None).occurred_at, at);
        assert_eq!(m.clone().not_before(Some(later)).occurred_at, later);
        assert_eq!(m.not_before(Some(at - chrono::Duration::seconds(5))).occurred_at, at);
    }

    #[test]
    fn origin_keeps_unknown_tags_verbatim() {
        let origin: MovementOrigin = "marketplace_sync".to_string().into();
        assert_eq!(origin, MovementOrigin::Other("marketplace_sync".to_string()));
        assert_eq!(String::from(origin), "marketplace_sync");
        assert_eq!(MovementOrigin::from("return".to_string()), MovementOrigin::Return);
    }

    #[test]
    fn kind_uses_upper_case_wire_names() {
        assert_eq!(serde_json::to_value(MovementKind::Adjust).unwrap(), "ADJUST");
        assert_eq!(MovementKind::parse("OUT").unwrap(), MovementKind::Out);
        assert!(MovementKind::parse("out").is_err());
    }
}
