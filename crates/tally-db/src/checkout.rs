//! # Checkout Engine
//!
//! Turns a validated cart into exactly one committed order.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        create_order(request)                            │
//! │                                                                         │
//! │  1. validate_checkout_request      (ids, empty cart, 100-line cap)     │
//! │       │                                                                 │
//! │  2. authorize                      (store exists, staff, active)       │
//! │       │                                                                 │
//! │  3. for each line (index i):                                           │
//! │       ├── fetch product            (not found / inactive / tenant)     │
//! │       ├── stock pre-check          (cumulative per product)            │
//! │       ├── resolve_line             (fuel / variant / dynamic / fixed)  │
//! │       ├── push OrderItem, add to running total                         │
//! │       └── queue decrement          (merged per product)                │
//! │       │                                                                 │
//! │  4. commit, in ONE transaction:                                        │
//! │       ├── UPDATE products SET stock = stock - q                        │
//! │       │     WHERE id = ? AND stock >= q      (0 rows → out of stock)   │
//! │       ├── INSERT orders                      (reference UNIQUE)        │
//! │       └── INSERT order_items                                           │
//! │                                                                         │
//! │  Any failure before COMMIT drops the transaction → full rollback.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! Two checkouts racing for the last unit both pass the pre-check. SQLite
//! serializes their write transactions; the second conditional UPDATE finds
//! `stock_milli < q`, affects zero rows, and the whole commit is rolled back
//! with `INSUFFICIENT_STOCK` for the first line that referenced the product.
//! The decrements are the first statements of the transaction, so it takes
//! the write lock before reading anything.
//!
//! ## Deadline
//! [`CheckoutEngine::create_order_within`] bounds everything before `COMMIT`.
//! `COMMIT` itself is never cancelled: an order that reached it is returned
//! even if the deadline has since passed.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::order::{generate_reference, OrderRepository};
use crate::repository::product::ProductRepository;
use crate::repository::store::StoreRepository;
use tally_core::pricing::{check_stock, requested_quantity, resolve_line};
use tally_core::validation::validate_checkout_request;
use tally_core::{
    CartLine, CheckoutError, CheckoutResult, LineError, Money, Order, OrderItem, OrderStatus,
    PaymentStatus, PricingError, Principal, Product, Quantity, Store,
};

/// Attempts at finding an unused reference code before giving up.
pub const MAX_REFERENCE_ATTEMPTS: u32 = 5;

/// Input to [`CheckoutEngine::create_order`].
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub store_id: String,
    /// Authenticated caller. Becomes both `cashier` and `created_by`.
    pub cashier: Principal,
    pub lines: Vec<CartLine>,
}

/// One queued stock change, applied at commit.
#[derive(Debug, Clone)]
struct StockDecrement {
    product_id: String,
    product_name: String,
    quantity: Quantity,
    /// First cart line that referenced the product.
    line_index: usize,
}

/// Why a single commit attempt did not go through.
enum CommitError {
    ReferenceTaken,
    /// Index into the decrement batch.
    OutOfStock(usize),
    Db(DbError),
}

impl From<DbError> for CommitError {
    fn from(err: DbError) -> Self {
        CommitError::Db(err)
    }
}

impl From<sqlx::Error> for CommitError {
    fn from(err: sqlx::Error) -> Self {
        CommitError::Db(err.into())
    }
}

/// A point in time the pre-commit phase must finish by.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    fn after(limit: Duration) -> Self {
        Deadline {
            at: Instant::now() + limit,
            limit,
        }
    }
}

/// Runs `fut` to completion, or until `deadline` passes.
async fn within<T>(deadline: Option<Deadline>, fut: impl Future<Output = T>) -> CheckoutResult<T> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.at, fut).await.map_err(|_| {
            CheckoutError::Timeout {
                timeout_ms: deadline.limit.as_millis() as u64,
            }
        }),
        None => Ok(fut.await),
    }
}

/// Orchestrates validation, pricing and the atomic commit of an order.
#[derive(Debug, Clone)]
pub struct CheckoutEngine {
    pool: SqlitePool,
    products: ProductRepository,
    stores: StoreRepository,
}

impl CheckoutEngine {
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutEngine {
            products: ProductRepository::new(pool.clone()),
            stores: StoreRepository::new(pool.clone()),
            pool,
        }
    }

    /// Creates an order from a cart, or changes nothing.
    ///
    /// ## Returns
    /// * `Ok(Order)` - committed; stock of every non-fuel product reduced
    /// * `Err(CheckoutError)` - no order written, no stock changed; line
    ///   failures carry the 0-based index of the offending cart line
    pub async fn create_order(&self, request: CheckoutRequest) -> CheckoutResult<Order> {
        self.run(request, None).await
    }

    /// Like [`create_order`](Self::create_order), bounded by `limit`.
    ///
    /// The deadline covers everything up to `COMMIT`: validation, reads,
    /// pricing and the staged writes. If it passes first the transaction is
    /// dropped and `CHECKOUT_TIMEOUT` is returned with nothing written. Once
    /// `COMMIT` has been issued it is awaited to the end and the order is
    /// returned, so a timeout never hides a committed order.
    pub async fn create_order_within(
        &self,
        request: CheckoutRequest,
        limit: Duration,
    ) -> CheckoutResult<Order> {
        self.run(request, Some(Deadline::after(limit))).await
    }

    async fn run(&self, request: CheckoutRequest, deadline: Option<Deadline>) -> CheckoutResult<Order> {
        let (mut order, decrements) = within(deadline, self.prepare(request)).await??;

        for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
            order.reference = generate_reference(order.created_at);

            match within(deadline, self.stage(&order, &decrements)).await? {
                Ok(tx) => {
                    tx.commit().await.map_err(DbError::from)?;
                    info!(
                        order_id = %order.id,
                        reference = %order.reference,
                        store_id = %order.store,
                        cashier = %order.cashier,
                        items = order.items.len(),
                        total = %order.total,
                        "Order committed"
                    );
                    return Ok(order);
                }
                Err(CommitError::ReferenceTaken) => {
                    warn!(attempt, reference = %order.reference, "Order reference already taken, retrying");
                }
                Err(CommitError::OutOfStock(i)) => {
                    let decrement = &decrements[i];
                    let available = self.current_stock(&decrement.product_id).await;
                    warn!(
                        product_id = %decrement.product_id,
                        line = decrement.line_index,
                        requested = %decrement.quantity,
                        available = ?available,
                        "Stock taken by a concurrent checkout, order rolled back"
                    );
                    return Err(CheckoutError::at_line(
                        decrement.line_index,
                        LineError::InsufficientStock {
                            product: decrement.product_name.clone(),
                            available,
                            requested: decrement.quantity,
                        },
                    ));
                }
                Err(CommitError::Db(e)) => return Err(e.into()),
            }
        }

        Err(CheckoutError::ReferenceExhausted {
            attempts: MAX_REFERENCE_ATTEMPTS,
        })
    }

    /// Validation, authorization and per-line pricing. Reads only.
    async fn prepare(&self, request: CheckoutRequest) -> CheckoutResult<(Order, Vec<StockDecrement>)> {
        let CheckoutRequest {
            store_id,
            cashier,
            lines,
        } = request;

        validate_checkout_request(&store_id, &lines)?;
        let store = self.authorize(&store_id, &cashier).await?;

        debug!(
            store_id = %store.id,
            cashier = %cashier.user_id,
            role = ?cashier.role,
            lines = lines.len(),
            "Starting checkout"
        );

        let mut catalog: HashMap<String, Product> = HashMap::new();
        let mut items = Vec::with_capacity(lines.len());
        let mut decrements: Vec<StockDecrement> = Vec::new();
        let mut total = Money::zero();

        for (index, line) in lines.iter().enumerate() {
            if !catalog.contains_key(&line.product) {
                let product = self.load_product(&store, index, &line.product).await?;
                catalog.insert(line.product.clone(), product);
            }
            let product = &catalog[&line.product];

            if product.product_type.tracks_stock() {
                let requested =
                    requested_quantity(product, line).map_err(|e| CheckoutError::at_line(index, e))?;
                let queued = decrements
                    .iter()
                    .find(|d| d.product_id == product.id)
                    .map(|d| d.quantity)
                    .unwrap_or_default();
                let cumulative = queued
                    .checked_add(requested)
                    .ok_or_else(|| CheckoutError::at_line(index, PricingError::AmountOverflow))?;
                check_stock(product, cumulative).map_err(|e| CheckoutError::at_line(index, e))?;
            }

            let resolved = resolve_line(product, line).map_err(|e| CheckoutError::at_line(index, e))?;

            if let Some(fallback) = &resolved.fallback {
                warn!(
                    product_id = %product.id,
                    line = index,
                    rule = fallback.rule.as_deref().unwrap_or("-"),
                    reason = %fallback.reason,
                    "Dynamic pricing fell back to base price"
                );
            }

            debug!(
                line = index,
                product_id = %product.id,
                quantity = %resolved.quantity,
                unit_price = %resolved.unit_price,
                line_total = %resolved.line_total,
                "Line resolved"
            );

            total = total
                .checked_add(resolved.line_total)
                .ok_or_else(|| CheckoutError::at_line(index, PricingError::AmountOverflow))?;

            if product.product_type.tracks_stock() {
                match decrements.iter_mut().find(|d| d.product_id == product.id) {
                    Some(queued) => queued.quantity += resolved.quantity,
                    None => decrements.push(StockDecrement {
                        product_id: product.id.clone(),
                        product_name: product.name.clone(),
                        quantity: resolved.quantity,
                        line_index: index,
                    }),
                }
            }

            items.push(OrderItem {
                product: product.id.clone(),
                name: product.name.clone(),
                quantity: resolved.quantity,
                unit_price: resolved.unit_price,
                total: resolved.line_total,
                variant: resolved.variant.as_ref().map(|v| v.id.clone()),
                variant_name: resolved.variant.map(|v| v.name),
                unit_label: resolved.unit_label,
            });
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            reference: String::new(),
            store: store.id.clone(),
            cashier: cashier.user_id.clone(),
            created_by: cashier.user_id.clone(),
            items,
            total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        Ok((order, decrements))
    }

    /// Loads a store and checks that `principal` may sell for it.
    ///
    /// ## Checks (in order)
    /// 1. store exists          → `STORE_NOT_FOUND`
    /// 2. caller is staff       → `STORE_ACCESS_DENIED`
    /// 3. store is active       → `STORE_INACTIVE`
    pub async fn authorize(&self, store_id: &str, principal: &Principal) -> CheckoutResult<Store> {
        let store = self.authorize_reader(store_id, principal).await?;

        if !store.is_active {
            return Err(CheckoutError::StoreInactive(store.id));
        }

        Ok(store)
    }

    /// Like [`Self::authorize`] without the active check. Staff keep read
    /// access to the ledger of a deactivated store.
    pub async fn authorize_reader(&self, store_id: &str, principal: &Principal) -> CheckoutResult<Store> {
        let store = self
            .stores
            .get_by_id(store_id)
            .await?
            .ok_or_else(|| CheckoutError::StoreNotFound(store_id.to_string()))?;

        if !store.is_staff(&principal.user_id) {
            warn!(store_id = %store.id, user_id = %principal.user_id, "Store access denied");
            return Err(CheckoutError::AccessDenied {
                store_id: store.id,
                user_id: principal.user_id.clone(),
            });
        }

        Ok(store)
    }

    /// Products of another company are reported as not found.
    async fn load_product(&self, store: &Store, index: usize, product_id: &str) -> CheckoutResult<Product> {
        let product = self
            .products
            .get_by_id(product_id)
            .await?
            .filter(|p| p.company_id == store.company_id)
            .ok_or_else(|| CheckoutError::at_line(index, LineError::ProductNotFound(product_id.to_string())))?;

        if !product.is_active {
            return Err(CheckoutError::at_line(index, LineError::ProductInactive(product.id)));
        }

        Ok(product)
    }

    /// Applies the decrements and inserts the order inside an open
    /// transaction, leaving `COMMIT` to the caller. The transaction rolls
    /// back when dropped.
    async fn stage(
        &self,
        order: &Order,
        decrements: &[StockDecrement],
    ) -> Result<Transaction<'static, Sqlite>, CommitError> {
        let mut tx = self.pool.begin().await?;

        for (i, decrement) in decrements.iter().enumerate() {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock_milli = stock_milli - ?1, updated_at = ?2
                WHERE id = ?3 AND stock_milli >= ?1
                "#,
            )
            .bind(decrement.quantity.millis())
            .bind(order.created_at)
            .bind(&decrement.product_id)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(done) if done.rows_affected() == 1 => {}
                Ok(_) => return Err(CommitError::OutOfStock(i)),
                Err(e) => {
                    let err = DbError::from(e);
                    if err.is_check_violation() {
                        return Err(CommitError::OutOfStock(i));
                    }
                    return Err(CommitError::Db(err));
                }
            }
        }

        if let Err(err) = OrderRepository::insert(&mut *tx, order).await {
            if err.is_unique_violation_on("orders.reference") {
                return Err(CommitError::ReferenceTaken);
            }
            return Err(CommitError::Db(err));
        }

        Ok(tx)
    }

    /// Stock as it is now, for the conflict report. `None` if it cannot be
    /// read; the conflict is still reported.
    async fn current_stock(&self, product_id: &str) -> Option<Quantity> {
        match self.products.get_by_id(product_id).await {
            Ok(Some(product)) => Some(product.stock),
            Ok(None) => {
                warn!(product_id, "Product vanished while reporting a stock conflict");
                None
            }
            Err(e) => {
                warn!(product_id, error = %e, "Failed to re-read stock after conflict");
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
