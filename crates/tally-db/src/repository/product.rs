//! # Product Repository (Catalog Store)
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD operations
//! - Stock adjustments that can never go negative
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products                                                               │
//! │                                                                         │
//! │  id │ name  │ product_type │ base_price_cents │ pricing_json │ stock   │
//! │  ───┼───────┼──────────────┼──────────────────┼──────────────┼──────── │
//! │  a1 │ Cola  │ quantity     │ 150              │ {"mode":...} │ 24000   │
//! │  b2 │ Rice  │ weight       │ 299              │ {"mode":...} │ 50000   │
//! │  c3 │ Diesel│ fuel         │ 0                │ {"mode":...} │ 0       │
//! │                                                                         │
//! │  pricing_json and variants_json hold the nested configuration;         │
//! │  stock_milli is thousandths (24000 = 24 units) with CHECK (>= 0).      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::validation::validate_product;
use tally_core::{Money, Pricing, PricingMode, Product, ProductType, Quantity, Variant};

const PRODUCT_COLUMNS: &str = r#"
    id, company_id, name, barcode, product_type,
    base_price_cents, pricing_json, variants_json,
    stock_milli, is_active, created_at, updated_at
"#;

/// Raw `products` row.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    company_id: String,
    name: String,
    barcode: Option<String>,
    product_type: ProductType,
    base_price_cents: i64,
    pricing_json: String,
    variants_json: String,
    stock_milli: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let mode: PricingMode =
            serde_json::from_str(&row.pricing_json).map_err(|e| DbError::Serialization {
                column: "products.pricing_json",
                message: e.to_string(),
            })?;
        let variants: Vec<Variant> =
            serde_json::from_str(&row.variants_json).map_err(|e| DbError::Serialization {
                column: "products.variants_json",
                message: e.to_string(),
            })?;

        Ok(Product {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            barcode: row.barcode,
            product_type: row.product_type,
            pricing: Pricing {
                mode,
                base_price: Money::from_cents(row.base_price_cents),
            },
            variants,
            stock: Quantity::from_millis(row.stock_milli),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = repo.get_by_id("uuid-here").await?;
/// let stock = repo.adjust_stock("uuid-here", Quantity::from_units(12)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID, active or not.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Gets a product by its barcode.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE barcode = ?1", PRODUCT_COLUMNS);
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Lists active products of a company, sorted by name.
    pub async fn list_active(&self, company_id: &str, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE company_id = ?1 AND is_active = 1 ORDER BY name LIMIT ?2",
            PRODUCT_COLUMNS
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(company_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::Validation)` - Product breaks a catalog rule
    /// * `Err(DbError::UniqueViolation)` - Barcode already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        validate_product(product)?;

        let pricing_json =
            serde_json::to_string(&product.pricing.mode).map_err(|e| DbError::Serialization {
                column: "products.pricing_json",
                message: e.to_string(),
            })?;
        let variants_json =
            serde_json::to_string(&product.variants).map_err(|e| DbError::Serialization {
                column: "products.variants_json",
                message: e.to_string(),
            })?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, company_id, name, barcode, product_type,
                base_price_cents, pricing_json, variants_json,
                stock_milli, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11, ?12
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.company_id)
        .bind(product.name.trim())
        .bind(&product.barcode)
        .bind(product.product_type)
        .bind(product.pricing.base_price.cents())
        .bind(pricing_json)
        .bind(variants_json)
        .bind(product.stock.millis())
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Applies a restock or correction delta to a product's stock.
    ///
    /// ## Delta Pattern
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  ❌ WRONG: Absolute update (loses concurrent checkouts)            │
    /// │     UPDATE products SET stock_milli = 7000 WHERE id = ?            │
    /// │                                                                     │
    /// │  ✅ CORRECT: Guarded delta                                          │
    /// │     UPDATE products SET stock_milli = stock_milli + ?              │
    /// │     WHERE id = ? AND stock_milli + ? >= 0                           │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Returns
    /// The new stock level.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - Product doesn't exist
    /// * `DbError::NegativeStock` - The delta would take stock below zero
    pub async fn adjust_stock(&self, id: &str, delta: Quantity) -> DbResult<Quantity> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_milli = stock_milli + ?2,
                updated_at = ?3
            WHERE id = ?1 AND stock_milli + ?2 >= 0
            RETURNING stock_milli
            "#,
        )
        .bind(id)
        .bind(delta.millis())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(stock) => Ok(Quantity::from_millis(stock)),
            None if self.get_by_id(id).await?.is_some() => {
                Err(DbError::NegativeStock { id: id.to_string() })
            }
            None => Err(DbError::not_found("Product", id)),
        }
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// - Historical orders still reference this product
    /// - Checkout rejects inactive products with a precise error
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::FuelConfig;

    fn product(name: &str, stock: i64) -> Product {
        Product {
            id: generate_product_id(),
            company_id: "company-1".to_string(),
            name: name.to_string(),
            barcode: None,
            product_type: ProductType::Quantity,
            pricing: Pricing {
                mode: PricingMode::Fixed,
                base_price: Money::from_cents(150),
            },
            variants: vec![Variant {
                id: Uuid::new_v4().to_string(),
                name: "Chilled".to_string(),
                price_offset: Money::from_cents(20),
            }],
            stock: Quantity::from_units(stock),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = db().await;
        let mut p = product("Cola", 24);
        p.barcode = Some("5449000000996".to_string());
        db.products().insert(&p).await.unwrap();

        let loaded = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Cola");
        assert_eq!(loaded.stock, Quantity::from_units(24));
        assert_eq!(loaded.pricing, p.pricing);
        assert_eq!(loaded.variants, p.variants);

        let by_barcode = db
            .products()
            .get_by_barcode("5449000000996")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_barcode.id, p.id);

        assert!(db.products().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fuel_config_round_trips_through_json_column() {
        let db = db().await;
        let mut p = product("Diesel", 0);
        p.product_type = ProductType::Fuel;
        p.variants.clear();
        p.pricing.mode = PricingMode::Fuel {
            config: FuelConfig {
                price_per_unit: Money::from_cents(600),
                display_unit: "L".to_string(),
            },
        };
        db.products().insert(&p).await.unwrap();

        let loaded = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.pricing.mode, p.pricing.mode);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_product() {
        let db = db().await;
        let mut p = product("Broken", 1);
        p.pricing.base_price = Money::from_cents(-5);

        let err = db.products().insert(&p).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_barcode() {
        let db = db().await;
        let mut a = product("A", 1);
        a.barcode = Some("123".to_string());
        let mut b = product("B", 1);
        b.barcode = Some("123".to_string());

        db.products().insert(&a).await.unwrap();
        let err = db.products().insert(&b).await.unwrap_err();
        assert!(err.is_unique_violation_on("products.barcode"));
    }

    #[tokio::test]
    async fn test_adjust_stock_never_negative() {
        let db = db().await;
        let p = product("Chips", 5);
        db.products().insert(&p).await.unwrap();

        let stock = db
            .products()
            .adjust_stock(&p.id, Quantity::from_units(3))
            .await
            .unwrap();
        assert_eq!(stock, Quantity::from_units(8));

        let err = db
            .products()
            .adjust_stock(&p.id, Quantity::from_units(-9))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NegativeStock { .. }));

        let err = db
            .products()
            .adjust_stock("missing", Quantity::from_units(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_soft_delete_and_listing() {
        let db = db().await;
        let a = product("Apple", 1);
        let b = product("Banana", 1);
        db.products().insert(&a).await.unwrap();
        db.products().insert(&b).await.unwrap();

        db.products().soft_delete(&a.id).await.unwrap();

        let active = db.products().list_active("company-1", 10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Banana");
        assert_eq!(db.products().count().await.unwrap(), 1);

        let inactive = db.products().get_by_id(&a.id).await.unwrap().unwrap();
        assert!(!inactive.is_active);
    }
}
