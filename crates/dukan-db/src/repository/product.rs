//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Search by SKU, name or barcode
//! - CRUD operations
//! - Stock adjustments (delta updates, audited)
//!
//! ## Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  User types: "rice"                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sku = 'RICE' (exact, barcode scanners)                                 │
//! │  OR barcode = 'rice'                                                    │
//! │  OR name / sku LIKE '%rice%'                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Exact matches first, then by name                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use dukan_core::validation::{
    validate_name, validate_optional_text, validate_price, validate_search_query, validate_sku,
};
use dukan_core::{AuditAction, CoreError, Money, Product};

const PRODUCT_COLUMNS: &str = r#"
    id, sku, barcode, name, description,
    price_usd, price_afn, cost_usd,
    stock, reorder_level, is_active,
    created_at, updated_at
"#;

/// Fields needed to create a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price_usd: Money,
    pub price_afn: Option<Money>,
    pub cost_usd: Money,
    pub stock: i64,
    pub reorder_level: i64,
}

impl NewProduct {
    fn validate(&self) -> DbResult<()> {
        validate_sku(&self.sku)?;
        validate_name("name", &self.name, 200)?;
        validate_optional_text("barcode", self.barcode.as_deref(), 64)?;
        validate_optional_text("description", self.description.as_deref(), 1000)?;
        validate_price("price_usd", self.price_usd)?;
        if let Some(afn) = self.price_afn {
            validate_price("price_afn", afn)?;
        }
        validate_price("cost_usd", self.cost_usd)?;
        Ok(())
    }
}

/// A partial product update. `None` leaves the field as it is.
///
/// `price_afn: Some(None)` clears the fixed AFN price.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_usd: Option<Money>,
    pub price_afn: Option<Option<Money>>,
    pub cost_usd: Option<Money>,
    pub reorder_level: Option<i64>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    fn apply(self, mut product: Product) -> DbResult<Product> {
        if let Some(sku) = self.sku {
            validate_sku(&sku)?;
            product.sku = sku.trim().to_uppercase();
        }
        if let Some(barcode) = self.barcode {
            validate_optional_text("barcode", Some(&barcode), 64)?;
            product.barcode = Some(barcode).filter(|b| !b.trim().is_empty());
        }
        if let Some(name) = self.name {
            validate_name("name", &name, 200)?;
            product.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            validate_optional_text("description", Some(&description), 1000)?;
            product.description = Some(description);
        }
        if let Some(price) = self.price_usd {
            validate_price("price_usd", price)?;
            product.price_usd = price;
        }
        if let Some(price_afn) = self.price_afn {
            if let Some(afn) = price_afn {
                validate_price("price_afn", afn)?;
            }
            product.price_afn = price_afn;
        }
        if let Some(cost) = self.cost_usd {
            validate_price("cost_usd", cost)?;
            product.cost_usd = cost;
        }
        if let Some(level) = self.reorder_level {
            product.reorder_level = level.max(0);
        }
        if let Some(active) = self.is_active {
            product.is_active = active;
        }
        Ok(product)
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(product)
}

/// Moves stock by `delta` (negative for sales, positive for returns).
pub(crate) async fn shift_stock(conn: &mut SqliteConnection, id: &str, delta: i64) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(id)
    .bind(delta)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", id));
    }
    Ok(())
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Searches active products by SKU, barcode or name.
    ///
    /// An empty query lists active products by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list(false, limit).await;
        }

        let query = validate_search_query(query)?;
        let pattern = format!("%{}%", query.replace('%', "").replace('_', ""));

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active = 1
              AND (sku = UPPER(?1) OR barcode = ?1 OR name LIKE ?2 OR sku LIKE ?2)
            ORDER BY (sku = UPPER(?1) OR barcode = ?1) DESC, name
            LIMIT ?3
            "#
        ))
        .bind(&query)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists products sorted by name.
    pub async fn list(&self, include_inactive: bool, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE (?1 OR is_active = 1)
            ORDER BY name
            LIMIT ?2
            "#
        ))
        .bind(include_inactive)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, new: NewProduct, user_id: Option<&str>) -> DbResult<Product> {
        new.validate()?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: new.sku.trim().to_uppercase(),
            barcode: new.barcode.filter(|b| !b.trim().is_empty()),
            name: new.name.trim().to_string(),
            description: new.description,
            price_usd: new.price_usd,
            price_afn: new.price_afn,
            cost_usd: new.cost_usd,
            stock: new.stock,
            reorder_level: new.reorder_level.max(0),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name, description,
                price_usd, price_afn, cost_usd,
                stock, reorder_level, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_usd)
        .bind(product.price_afn)
        .bind(product.cost_usd)
        .bind(product.stock)
        .bind(product.reorder_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, product.sku.clone())
            }
            other => other,
        })?;

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::ProductCreated, "product", &product.id)
                .details(json!({ "sku": product.sku, "price_usd": product.price_usd }))
                .by(user_id),
        )
        .await?;
        tx.commit().await?;

        Ok(product)
    }

    /// Applies a partial update and returns the stored product.
    pub async fn update(
        &self,
        id: &str,
        changes: ProductUpdate,
        user_id: Option<&str>,
    ) -> DbResult<Product> {
        debug!(id = %id, "Updating product");

        let mut tx = self.pool.begin().await?;
        let current = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        let mut product = changes.apply(current.clone())?;
        product.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2, barcode = ?3, name = ?4, description = ?5,
                price_usd = ?6, price_afn = ?7, cost_usd = ?8,
                reorder_level = ?9, is_active = ?10, updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_usd)
        .bind(product.price_afn)
        .bind(product.cost_usd)
        .bind(product.reorder_level)
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, product.sku.clone())
            }
            other => other,
        })?;

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::ProductUpdated, "product", id)
                .details(json!({
                    "price_usd": { "from": current.price_usd, "to": product.price_usd },
                    "price_afn": { "from": current.price_afn, "to": product.price_afn },
                    "is_active": product.is_active,
                }))
                .by(user_id),
        )
        .await?;
        tx.commit().await?;

        Ok(product)
    }

    /// Adjusts stock by `delta` outside of a sale (receiving, shrinkage, counts).
    pub async fn adjust_stock(
        &self,
        id: &str,
        delta: i64,
        reason: Option<&str>,
        user_id: Option<&str>,
    ) -> DbResult<Product> {
        let mut tx = self.pool.begin().await?;
        shift_stock(&mut tx, id, delta).await?;
        let product = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        if product.stock < 0 {
            return Err(CoreError::InsufficientStock {
                sku: product.sku,
                available: product.stock - delta,
                requested: -delta,
            }
            .into());
        }

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::StockAdjusted, "product", id)
                .details(json!({ "delta": delta, "stock_after": product.stock, "reason": reason }))
                .by(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(sku = %product.sku, delta, stock = product.stock, "Stock adjusted");
        Ok(product)
    }

    /// Active products at or below their reorder level.
    pub async fn low_stock(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active = 1 AND stock <= reorder_level
            ORDER BY stock, name
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    pub(crate) fn new_product(sku: &str, price_cents: i64, stock: i64) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            barcode: None,
            name: format!("{sku} product"),
            description: None,
            price_usd: Money::from_cents(price_cents),
            price_afn: None,
            cost_usd: Money::from_cents(price_cents / 2),
            stock,
            reorder_level: 2,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = repo.insert(new_product("rice-25kg", 2500, 10), None).await.unwrap();
        assert_eq!(product.sku, "RICE-25KG");

        let fetched = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(fetched.price_usd.cents(), 2500);
        assert!(fetched.created_at <= Utc::now());

        let by_sku = repo.get_by_sku("rice-25kg").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(new_product("TEA", 500, 1), None).await.unwrap();
        let err = db.products().insert(new_product("tea", 600, 1), None).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_search() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.insert(new_product("RICE-5KG", 700, 10), None).await.unwrap();
        repo.insert(new_product("RICE-25KG", 2500, 10), None).await.unwrap();
        repo.insert(new_product("TEA-500", 300, 10), None).await.unwrap();

        let results = repo.search("rice", 10).await.unwrap();
        assert_eq!(results.len(), 2);

        let exact = repo.search("tea-500", 10).await.unwrap();
        assert_eq!(exact[0].sku, "TEA-500");

        let all = repo.search("", 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = repo.insert(new_product("SUGAR", 150, 10), None).await.unwrap();

        let updated = repo
            .update(
                &product.id,
                ProductUpdate {
                    price_afn: Some(Some(Money::from_cents(11_000))),
                    is_active: Some(false),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.price_afn, Some(Money::from_cents(11_000)));
        assert!(!updated.is_active);

        assert!(repo.search("sugar", 10).await.unwrap().is_empty());
        assert_eq!(repo.list(true, 10).await.unwrap().len(), 1);

        let missing = repo.update("nope", ProductUpdate::default(), None).await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_adjust_stock_and_low_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = repo.insert(new_product("OIL-5L", 900, 5), None).await.unwrap();

        let adjusted = repo.adjust_stock(&product.id, -4, Some("damaged"), None).await.unwrap();
        assert_eq!(adjusted.stock, 1);

        let low = repo.low_stock(10).await.unwrap();
        assert_eq!(low.len(), 1);

        let logs = db.audit_logs().for_entity("product", &product.id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].action, AuditAction::StockAdjusted);
    }

    #[tokio::test]
    async fn test_adjust_stock_below_zero_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = repo.insert(new_product("SALT-1KG", 50, 3), None).await.unwrap();

        let err = repo.adjust_stock(&product.id, -5, None, None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 3, requested: 5, .. })
        ));

        let unchanged = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(unchanged.stock, 3);
    }
}
