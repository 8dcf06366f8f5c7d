//! # Order Repository (Order Ledger)
//!
//! Append-only ledger of committed orders.
//!
//! ## Ledger Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Ledger                                      │
//! │                                                                         │
//! │  WRITE: only CheckoutEngine, inside its commit transaction             │
//! │     └── insert(tx, order)  → orders row + one order_items row per line │
//! │                                                                         │
//! │  READ:                                                                 │
//! │     ├── get_by_id            (with items, cart order preserved)        │
//! │     ├── get_by_reference     (ORD-YYYYMMDD-NNNNN)                      │
//! │     ├── list_by_cashier      (newest first)                            │
//! │     └── list_by_store_between([from, to) on created_at)                │
//! │                                                                         │
//! │  Line items are never updated. Names are snapshots taken at checkout.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tally_core::{
    Money, Order, OrderItem, OrderStatus, PaymentStatus, Quantity, ORDER_REFERENCE_PREFIX,
};

const ORDER_COLUMNS: &str = r#"
    id, reference, store_id, cashier_id, created_by, total_cents,
    status, payment_status, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    reference: String,
    store_id: String,
    cashier_id: String,
    created_by: String,
    total_cents: i64,
    status: OrderStatus,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            reference: self.reference,
            store: self.store_id,
            cashier: self.cashier_id,
            created_by: self.created_by,
            items,
            total: Money::from_cents(self.total_cents),
            status: self.status,
            payment_status: self.payment_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    product_id: String,
    name_snapshot: String,
    variant_id: Option<String>,
    variant_name_snapshot: Option<String>,
    quantity_milli: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
    unit_label: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            product: row.product_id,
            name: row.name_snapshot,
            quantity: Quantity::from_millis(row.quantity_milli),
            unit_price: Money::from_cents(row.unit_price_cents),
            total: Money::from_cents(row.line_total_cents),
            variant: row.variant_id,
            variant_name: row.variant_name_snapshot,
            unit_label: row.unit_label,
        }
    }
}

/// Repository for reading the order ledger.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Writes an order and its items on the given connection.
    ///
    /// Called by the checkout engine with its open transaction, so the
    /// order, its items and the stock decrements commit or roll back as one.
    pub(crate) async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, reference = %order.reference, items = order.items.len(), "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, reference, store_id, cashier_id, created_by, total_cents,
                status, payment_status, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.reference)
        .bind(&order.store)
        .bind(&order.cashier)
        .bind(&order.created_by)
        .bind(order.total.cents())
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, position, product_id,
                    name_snapshot, variant_id, variant_name_snapshot,
                    quantity_milli, unit_price_cents, line_total_cents, unit_label
                ) VALUES (
                    ?1, ?2, ?3, ?4,
                    ?5, ?6, ?7,
                    ?8, ?9, ?10, ?11
                )
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order.id)
            .bind(position as i64)
            .bind(&item.product)
            .bind(&item.name)
            .bind(&item.variant)
            .bind(&item.variant_name)
            .bind(item.quantity.millis())
            .bind(item.unit_price.cents())
            .bind(item.total.cents())
            .bind(&item.unit_label)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Gets an order with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.with_items(row).await?)),
            None => Ok(None),
        }
    }

    /// Gets an order by its human-readable reference code.
    pub async fn get_by_reference(&self, reference: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE reference = ?1", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.with_items(row).await?)),
            None => Ok(None),
        }
    }

    /// Lists a cashier's orders, newest first.
    pub async fn list_by_cashier(&self, cashier_id: &str, limit: u32) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE cashier_id = ?1 ORDER BY created_at DESC, id LIMIT ?2",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(cashier_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        self.all_with_items(rows).await
    }

    /// Lists a store's orders created in `[from, to)`, oldest first.
    pub async fn list_by_store_between(
        &self,
        store_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {} FROM orders
            WHERE store_id = ?1 AND created_at >= ?2 AND created_at < ?3
            ORDER BY created_at, id
            LIMIT ?4
            "#,
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(store_id)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        self.all_with_items(rows).await
    }

    /// Counts all orders (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn with_items(&self, row: OrderRow) -> DbResult<Order> {
        let items: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT product_id, name_snapshot, variant_id, variant_name_snapshot,
                   quantity_milli, unit_price_cents, line_total_cents, unit_label
            FROM order_items
            WHERE order_id = ?1
            ORDER BY position
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(row.into_order(items.into_iter().map(OrderItem::from).collect()))
    }

    async fn all_with_items(&self, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.with_items(row).await?);
        }
        Ok(orders)
    }
}

/// Generates a reference code in format: ORD-YYYYMMDD-NNNNN
///
/// ## Format
/// - YYYYMMDD: UTC date of the checkout
/// - NNNNN: random, zero-padded
///
/// Collisions are possible and handled by the checkout engine, which retries
/// with a fresh code when the UNIQUE index rejects one.
///
/// ## Example
/// `ORD-20260131-04217`
pub fn generate_reference(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("{}-{}-{:05}", ORDER_REFERENCE_PREFIX, now.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reference_format() {
        let now = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        let reference = generate_reference(now);

        assert_eq!(reference.len(), "ORD-20260131-00000".len());
        assert!(reference.starts_with("ORD-20260131-"));
        assert!(reference[13..].chars().all(|c| c.is_ascii_digit()));
    }
}
