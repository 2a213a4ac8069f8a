//! Postgres-backed stock ledger, order store, coupon store and cart store.
//!
//! ## Serialisation
//!
//! Every write touching a stock track first takes a transaction-scoped
//! advisory lock derived from the track key. `commit_order` takes the locks
//! for all of its tracks in key order before re-reading stock, so two
//! checkouts competing for the same units queue instead of both passing the
//! check. Coupon and cart updates are conditional `UPDATE`s whose row locks
//! serialise concurrent uses.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Invalid` |
//! | Database (check constraint violation) | `23514` | `Invalid` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / Io / other | N/A | `Backend` |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row};
use tracing::{Span, info, instrument, warn};
use uuid::Uuid;

use storefront_core::{CartId, CouponId, CustomerId, OrderId, TenantId};
use storefront_inventory::{MovementKind, NewStockMovement, RunningTotal, StockKey, StockMovement, StockProjection};
use storefront_sales::{
    Cart, CartStatus, Coupon, CouponKind, DeliveryType, Order, OrderItem, OrderStatus, OrderWithItems, PaymentMethod,
    PaymentStatus, SalesChannel, normalize_code,
};

use crate::config::DatabaseConfig;
use crate::error::{CommitError, StoreError};
use crate::ledger::StockLedger;
use crate::ports::{CartStore, CouponStore};
use crate::store::{OrderCommit, OrderStore};

const SCHEMA: &str = include_str!("../../migrations/0001_storefront.sql");

const MOVEMENT_COLUMNS: &str = "id, sequence, tenant_id, product_id, variant_id, kind, origin, \
     quantity, final_quantity, actor_id, occurred_at";

/// Postgres implementation of the persistent ports.
#[derive(Debug, Clone)]
pub struct PostgresCommerceStore {
    pool: Arc<PgPool>,
}

impl PostgresCommerceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        info!(max_connections = config.max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    /// Apply the schema. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StockLedger for PostgresCommerceStore {
    #[instrument(
        skip(self, movement),
        fields(key = %movement.key(), kind = movement.kind.as_str(), sequence = tracing::field::Empty),
        err
    )]
    async fn append(&self, movement: NewStockMovement) -> Result<StockMovement, StoreError> {
        movement.validate()?;
        let key = movement.key();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        lock_track(&mut tx, &key).await?;
        let stored = insert_movement(&mut tx, movement).await?;
        apply_to_level(&mut tx, &stored).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("sequence", stored.sequence);
        Ok(stored)
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn movements(&self, key: &StockKey) -> Result<Vec<StockMovement>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        load_movements(&mut conn, key).await
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn current_stock(&self, key: &StockKey) -> Result<StockProjection, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        Ok(level_or_refold(&mut conn, key).await?.projection(key))
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn reconcile(&self, key: &StockKey) -> Result<StockProjection, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        lock_track(&mut tx, key).await?;

        let cached = load_level(&mut tx, key).await?;
        let recomputed = refold(&mut tx, key).await?;
        if cached.is_some_and(|c| c != recomputed) {
            warn!(
                key = %key,
                cached = cached.map(|c| c.raw),
                recomputed = recomputed.raw,
                "stock cache diverged from ledger, overwriting"
            );
        }
        store_level(&mut tx, key, &recomputed).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(recomputed.projection(key))
    }
}

#[async_trait]
impl OrderStore for PostgresCommerceStore {
    #[instrument(
        skip(self, commit),
        fields(
            tenant_id = %commit.order.tenant_id,
            order_id = %commit.order.id,
            item_count = commit.items.len()
        ),
        err
    )]
    async fn commit_order(&self, commit: OrderCommit) -> Result<(), CommitError> {
        commit.validate()?;
        let tenant_id = commit.tenant_id();
        let requirements = commit.requirements();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for key in requirements.keys() {
            lock_track(&mut tx, key).await?;
        }
        let mut floors = HashMap::with_capacity(requirements.len());
        for (key, requested) in &requirements {
            let level = level_or_refold(&mut tx, key).await?;
            floors.insert(*key, level.last_movement_at);
            let available = level.current_stock();
            if available < *requested {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(CommitError::InsufficientStock {
                    key: *key,
                    requested: *requested,
                    available,
                });
            }
        }

        if let Some(coupon_id) = commit.order.coupon_id {
            if !consume_coupon(&mut tx, tenant_id, coupon_id).await? {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(CommitError::CouponUnavailable(coupon_id));
            }
        }
        if let Some(cart_id) = commit.order.cart_id {
            if !convert_cart(&mut tx, tenant_id, cart_id).await? {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(CommitError::CartNotActive(cart_id));
            }
        }

        insert_order(&mut tx, &commit.order).await?;
        for (position, item) in commit.items.iter().enumerate() {
            insert_order_item(&mut tx, tenant_id, position, item).await?;
        }
        for movement in commit.movements {
            let floor = floors.get(&movement.key()).copied().flatten();
            let stored = insert_movement(&mut tx, movement.not_before(floor)).await?;
            apply_to_level(&mut tx, &stored).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    async fn find_order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Option<OrderWithItems>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, customer_id, channel, status, payment_status, payment_method,
                   subtotal, discount, coupon_id, coupon_code, shipping_cost, total,
                   delivery_type, delivery_option_id, shipping_address, cart_id, created_by, created_at
            FROM orders
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(order_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = order_from_row(&row)?;

        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, variant_id, quantity, unit_price, discount, total
            FROM order_items
            WHERE tenant_id = $1 AND order_id = $2
            ORDER BY position ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(order_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_order_items", e))?;

        let items = rows.iter().map(order_item_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(OrderWithItems { order, items }))
    }
}

#[async_trait]
impl CouponStore for PostgresCommerceStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn find_by_code(&self, tenant_id: TenantId, code: &str) -> Result<Option<Coupon>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, code, type, value, min_value, max_uses, used_count, expires_at, active
            FROM coupons
            WHERE tenant_id = $1 AND UPPER(BTRIM(code)) = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(normalize_code(code))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_coupon", e))?;

        row.as_ref().map(coupon_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, coupon_id = %coupon_id), err)]
    async fn increment_used(&self, tenant_id: TenantId, coupon_id: CouponId) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        consume_coupon(&mut conn, tenant_id, coupon_id).await
    }
}

#[async_trait]
impl CartStore for PostgresCommerceStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, cart_id = %cart_id), err)]
    async fn find_cart(&self, tenant_id: TenantId, cart_id: CartId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query("SELECT id, tenant_id, customer_id, status FROM carts WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(cart_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_cart", e))?;

        row.as_ref().map(cart_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, cart_id = %cart_id), err)]
    async fn mark_converted(&self, tenant_id: TenantId, cart_id: CartId) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        convert_cart(&mut conn, tenant_id, cart_id).await
    }
}

async fn lock_track(conn: &mut PgConnection, key: &StockKey) -> Result<(), StoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("stock:{key}"))
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("lock_track", e))?;
    Ok(())
}

fn variant_key(key: &StockKey) -> Uuid {
    key.variant_id.map(|v| *v.as_uuid()).unwrap_or_else(Uuid::nil)
}

async fn insert_movement(conn: &mut PgConnection, movement: NewStockMovement) -> Result<StockMovement, StoreError> {
    // Stored at the column's microsecond precision so the returned movement
    // orders exactly like its persisted row.
    let movement = NewStockMovement {
        occurred_at: movement.occurred_at.trunc_subsecs(6),
        ..movement
    };
    let id = storefront_core::MovementId::new();

    let row = sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, tenant_id, product_id, variant_id, kind, origin,
            quantity, final_quantity, actor_id, occurred_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING sequence
        "#,
    )
    .bind(id.as_uuid())
    .bind(movement.tenant_id.as_uuid())
    .bind(movement.product_id.as_uuid())
    .bind(movement.variant_id.map(|v| *v.as_uuid()))
    .bind(movement.kind.as_str())
    .bind(movement.origin.as_str())
    .bind(to_i32(movement.quantity, "quantity")?)
    .bind(movement.final_quantity.map(|q| to_i32(q, "final_quantity")).transpose()?)
    .bind(movement.actor_id.map(|a| *a.as_uuid()))
    .bind(movement.occurred_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;

    let sequence = to_u64(column::<i64>(&row, "sequence")?, "sequence")?;
    Ok(movement.into_stored(id, sequence))
}

async fn load_movements(conn: &mut PgConnection, key: &StockKey) -> Result<Vec<StockMovement>, StoreError> {
    let sql = format!(
        "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
         WHERE tenant_id = $1 AND product_id = $2 AND variant_id IS NOT DISTINCT FROM $3 \
         ORDER BY occurred_at ASC, sequence ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(key.tenant_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .bind(key.variant_id.map(|v| *v.as_uuid()))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_movements", e))?;

    rows.iter().map(movement_from_row).collect()
}

async fn refold(conn: &mut PgConnection, key: &StockKey) -> Result<RunningTotal, StoreError> {
    let movements = load_movements(conn, key).await?;
    Ok(RunningTotal::replay(key, &movements))
}

async fn load_level(conn: &mut PgConnection, key: &StockKey) -> Result<Option<RunningTotal>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT raw_total, last_movement_at, last_sequence
        FROM stock_levels
        WHERE tenant_id = $1 AND product_id = $2 AND variant_key = $3
        "#,
    )
    .bind(key.tenant_id.as_uuid())
    .bind(key.product_id.as_uuid())
    .bind(variant_key(key))
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_level", e))?;

    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(RunningTotal {
        raw: column(&row, "raw_total")?,
        last_movement_at: column(&row, "last_movement_at")?,
        last_sequence: to_u64(column(&row, "last_sequence")?, "last_sequence")?,
    }))
}

/// Cached level, or a fold of the ledger when the cache row is missing.
async fn level_or_refold(conn: &mut PgConnection, key: &StockKey) -> Result<RunningTotal, StoreError> {
    match load_level(conn, key).await? {
        Some(level) => Ok(level),
        None => refold(conn, key).await,
    }
}

async fn store_level(conn: &mut PgConnection, key: &StockKey, total: &RunningTotal) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO stock_levels (tenant_id, product_id, variant_key, raw_total, last_movement_at, last_sequence)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (tenant_id, product_id, variant_key)
        DO UPDATE SET
            raw_total = EXCLUDED.raw_total,
            last_movement_at = EXCLUDED.last_movement_at,
            last_sequence = EXCLUDED.last_sequence
        "#,
    )
    .bind(key.tenant_id.as_uuid())
    .bind(key.product_id.as_uuid())
    .bind(variant_key(key))
    .bind(total.raw)
    .bind(total.last_movement_at)
    .bind(to_i64(total.last_sequence, "last_sequence")?)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("store_level", e))?;
    Ok(())
}

/// Fold a freshly inserted movement into the cache. Must run in the same
/// transaction as the insert and under the track's lock.
async fn apply_to_level(conn: &mut PgConnection, stored: &StockMovement) -> Result<(), StoreError> {
    let key = stored.key();
    let total = match load_level(conn, &key).await? {
        Some(mut level) if level.is_in_order(stored) => {
            level.apply(stored);
            level
        }
        // Out-of-order or uncached: the new row is visible to this transaction.
        _ => refold(conn, &key).await?,
    };
    store_level(conn, &key, &total).await
}

async fn consume_coupon(conn: &mut PgConnection, tenant_id: TenantId, coupon_id: CouponId) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE coupons
        SET used_count = used_count + 1
        WHERE tenant_id = $1 AND id = $2 AND active
          AND (max_uses IS NULL OR used_count < max_uses)
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(coupon_id.as_uuid())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("consume_coupon", e))?;
    Ok(result.rows_affected() == 1)
}

async fn convert_cart(conn: &mut PgConnection, tenant_id: TenantId, cart_id: CartId) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE carts
        SET status = 'converted', updated_at = NOW()
        WHERE tenant_id = $1 AND id = $2 AND status = 'active'
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(cart_id.as_uuid())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("convert_cart", e))?;
    Ok(result.rows_affected() == 1)
}

async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<(), StoreError> {
    let shipping_address = order
        .shipping_address
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| StoreError::Invalid(format!("failed to serialise shipping_address: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, tenant_id, customer_id, channel, status, payment_status, payment_method,
            subtotal, discount, coupon_id, coupon_code, shipping_cost, total,
            delivery_type, delivery_option_id, shipping_address, cart_id, created_by, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.tenant_id.as_uuid())
    .bind(order.customer_id.map(|c| *c.as_uuid()))
    .bind(order.channel.as_str())
    .bind(order.status.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.payment_method.map(|m| m.as_str()))
    .bind(to_i64(order.subtotal, "subtotal")?)
    .bind(to_i64(order.discount, "discount")?)
    .bind(order.coupon_id.map(|c| *c.as_uuid()))
    .bind(order.coupon_code.as_deref())
    .bind(to_i64(order.shipping_cost, "shipping_cost")?)
    .bind(to_i64(order.total, "total")?)
    .bind(order.delivery_type.map(|d| d.as_str()))
    .bind(order.delivery_option_id.as_deref())
    .bind(shipping_address)
    .bind(order.cart_id.map(|c| *c.as_uuid()))
    .bind(order.created_by.map(|u| *u.as_uuid()))
    .bind(order.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_order", e))?;
    Ok(())
}

async fn insert_order_item(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    position: usize,
    item: &OrderItem,
) -> Result<(), StoreError> {
    let position = i32::try_from(position).map_err(|_| StoreError::Invalid("too many order items".to_string()))?;
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, tenant_id, position, product_id, variant_id,
            quantity, unit_price, discount, total
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(item.id.as_uuid())
    .bind(item.order_id.as_uuid())
    .bind(tenant_id.as_uuid())
    .bind(position)
    .bind(item.product_id.as_uuid())
    .bind(item.variant_id.map(|v| *v.as_uuid()))
    .bind(to_i32(item.quantity, "quantity")?)
    .bind(to_i64(item.unit_price, "unit_price")?)
    .bind(to_i64(item.discount, "discount")?)
    .bind(to_i64(item.total, "total")?)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_order_item", e))?;
    Ok(())
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Backend(format!("failed to read {name}: {e}")))
}

fn text_column<T>(row: &PgRow, name: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T, StoreError> {
    let raw: String = column(row, name)?;
    parse(&raw).ok_or_else(|| StoreError::Backend(format!("unknown {name} '{raw}'")))
}

fn optional_text_column<T>(
    row: &PgRow,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, StoreError> {
    let raw: Option<String> = column(row, name)?;
    raw.map(|raw| parse(&raw).ok_or_else(|| StoreError::Backend(format!("unknown {name} '{raw}'"))))
        .transpose()
}

fn to_i64(value: u64, name: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Invalid(format!("{name} out of range: {value}")))
}

fn to_i32(value: u32, name: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Invalid(format!("{name} out of range: {value}")))
}

fn to_u64(value: i64, name: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Backend(format!("negative {name} in storage: {value}")))
}

fn to_u32(value: i32, name: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Backend(format!("negative {name} in storage: {value}")))
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, StoreError> {
    let kind: String = column(row, "kind")?;
    let origin: String = column(row, "origin")?;
    let final_quantity: Option<i32> = column(row, "final_quantity")?;
    let variant_id: Option<Uuid> = column(row, "variant_id")?;
    let actor_id: Option<Uuid> = column(row, "actor_id")?;

    Ok(StockMovement {
        id: storefront_core::MovementId::from_uuid(column(row, "id")?),
        sequence: to_u64(column(row, "sequence")?, "sequence")?,
        tenant_id: TenantId::from_uuid(column(row, "tenant_id")?),
        product_id: storefront_core::ProductId::from_uuid(column(row, "product_id")?),
        variant_id: variant_id.map(storefront_core::VariantId::from_uuid),
        kind: MovementKind::parse(&kind).map_err(|e| StoreError::Backend(e.to_string()))?,
        origin: origin.into(),
        quantity: to_u32(column(row, "quantity")?, "quantity")?,
        final_quantity: final_quantity.map(|q| to_u32(q, "final_quantity")).transpose()?,
        actor_id: actor_id.map(storefront_core::UserId::from_uuid),
        occurred_at: column::<DateTime<Utc>>(row, "occurred_at")?,
    })
}

fn coupon_from_row(row: &PgRow) -> Result<Coupon, StoreError> {
    let min_value: Option<i64> = column(row, "min_value")?;
    let max_uses: Option<i32> = column(row, "max_uses")?;

    Ok(Coupon {
        id: CouponId::from_uuid(column(row, "id")?),
        tenant_id: TenantId::from_uuid(column(row, "tenant_id")?),
        code: column(row, "code")?,
        kind: text_column(row, "type", CouponKind::parse)?,
        value: to_u64(column(row, "value")?, "value")?,
        min_value: min_value.map(|v| to_u64(v, "min_value")).transpose()?,
        max_uses: max_uses.map(|v| to_u32(v, "max_uses")).transpose()?,
        used_count: to_u32(column(row, "used_count")?, "used_count")?,
        expires_at: column(row, "expires_at")?,
        active: column(row, "active")?,
    })
}

fn cart_from_row(row: &PgRow) -> Result<Cart, StoreError> {
    let customer_id: Option<Uuid> = column(row, "customer_id")?;
    Ok(Cart {
        id: CartId::from_uuid(column(row, "id")?),
        tenant_id: TenantId::from_uuid(column(row, "tenant_id")?),
        customer_id: customer_id.map(CustomerId::from_uuid),
        status: text_column(row, "status", CartStatus::parse)?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let customer_id: Option<Uuid> = column(row, "customer_id")?;
    let coupon_id: Option<Uuid> = column(row, "coupon_id")?;
    let cart_id: Option<Uuid> = column(row, "cart_id")?;
    let created_by: Option<Uuid> = column(row, "created_by")?;
    let shipping_address: Option<serde_json::Value> = column(row, "shipping_address")?;

    Ok(Order {
        id: OrderId::from_uuid(column(row, "id")?),
        tenant_id: TenantId::from_uuid(column(row, "tenant_id")?),
        customer_id: customer_id.map(CustomerId::from_uuid),
        channel: text_column(row, "channel", SalesChannel::parse)?,
        status: text_column(row, "status", OrderStatus::parse)?,
        payment_status: text_column(row, "payment_status", PaymentStatus::parse)?,
        payment_method: optional_text_column(row, "payment_method", PaymentMethod::parse)?,
        subtotal: to_u64(column(row, "subtotal")?, "subtotal")?,
        discount: to_u64(column(row, "discount")?, "discount")?,
        coupon_id: coupon_id.map(CouponId::from_uuid),
        coupon_code: column(row, "coupon_code")?,
        shipping_cost: to_u64(column(row, "shipping_cost")?, "shipping_cost")?,
        total: to_u64(column(row, "total")?, "total")?,
        delivery_type: optional_text_column(row, "delivery_type", DeliveryType::parse)?,
        delivery_option_id: column(row, "delivery_option_id")?,
        shipping_address: shipping_address
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StoreError::Backend(format!("failed to decode shipping_address: {e}")))?,
        cart_id: cart_id.map(CartId::from_uuid),
        created_by: created_by.map(storefront_core::UserId::from_uuid),
        created_at: column(row, "created_at")?,
    })
}

fn order_item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    let variant_id: Option<Uuid> = column(row, "variant_id")?;
    Ok(OrderItem {
        id: storefront_core::OrderItemId::from_uuid(column(row, "id")?),
        order_id: OrderId::from_uuid(column(row, "order_id")?),
        product_id: storefront_core::ProductId::from_uuid(column(row, "product_id")?),
        variant_id: variant_id.map(storefront_core::VariantId::from_uuid),
        quantity: to_u32(column(row, "quantity")?, "quantity")?,
        unit_price: to_u64(column(row, "unit_price")?, "unit_price")?,
        discount: to_u64(column(row, "discount")?, "discount")?,
        total: to_u64(column(row, "total")?, "total")?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23514") => StoreError::Invalid(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        other => StoreError::Backend(format!("sqlx error in {}: {}", operation, other)),
    }
}
