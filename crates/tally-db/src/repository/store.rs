//! # Store Repository (Store Registry)
//!
//! Stores and the staff allowed to transact for them.
//!
//! A store's access list is the union of `store_employees` and the single
//! `supervisor_id`. The checkout engine only reads it.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::Store;

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: String,
    company_id: String,
    name: String,
    supervisor_id: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl StoreRow {
    fn into_store(self, employees: Vec<String>) -> Store {
        Store {
            id: self.id,
            company_id: self.company_id,
            name: self.name,
            is_active: self.is_active,
            supervisor_id: self.supervisor_id,
            employees,
            created_at: self.created_at,
        }
    }
}

/// Repository for store registry operations.
#[derive(Debug, Clone)]
pub struct StoreRepository {
    pool: SqlitePool,
}

impl StoreRepository {
    /// Creates a new StoreRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StoreRepository { pool }
    }

    /// Inserts a store together with its employee list, atomically.
    pub async fn insert(&self, store: &Store) -> DbResult<Store> {
        debug!(id = %store.id, employees = store.employees.len(), "Inserting store");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO stores (id, company_id, name, supervisor_id, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&store.id)
        .bind(&store.company_id)
        .bind(&store.name)
        .bind(&store.supervisor_id)
        .bind(store.is_active)
        .bind(store.created_at)
        .execute(&mut *tx)
        .await?;

        for user_id in &store.employees {
            sqlx::query(
                "INSERT OR IGNORE INTO store_employees (store_id, user_id, added_at) VALUES (?1, ?2, ?3)",
            )
            .bind(&store.id)
            .bind(user_id)
            .bind(store.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(store.clone())
    }

    /// Gets a store with its employee list.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Store>> {
        let row: Option<StoreRow> = sqlx::query_as(
            r#"
            SELECT id, company_id, name, supervisor_id, is_active, created_at
            FROM stores
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let employees: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM store_employees WHERE store_id = ?1 ORDER BY added_at, user_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_store(employees)))
    }

    /// Grants a user access to a store. Adding an existing employee is a no-op.
    pub async fn add_employee(&self, store_id: &str, user_id: &str) -> DbResult<()> {
        debug!(store_id = %store_id, user_id = %user_id, "Adding store employee");

        let result = sqlx::query(
            "INSERT OR IGNORE INTO store_employees (store_id, user_id, added_at) VALUES (?1, ?2, ?3)",
        )
        .bind(store_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match DbError::from(e) {
                DbError::ForeignKeyViolation { .. } => Err(DbError::not_found("Store", store_id)),
                other => Err(other),
            },
        }
    }

    /// Revokes a user's access. Returns `false` if they were not an employee.
    pub async fn remove_employee(&self, store_id: &str, user_id: &str) -> DbResult<bool> {
        debug!(store_id = %store_id, user_id = %user_id, "Removing store employee");

        let result = sqlx::query("DELETE FROM store_employees WHERE store_id = ?1 AND user_id = ?2")
            .bind(store_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Activates or deactivates a store. Inactive stores reject checkouts.
    pub async fn set_active(&self, store_id: &str, active: bool) -> DbResult<()> {
        debug!(store_id = %store_id, active, "Setting store active flag");

        let result = sqlx::query("UPDATE stores SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(store_id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Store", store_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use uuid::Uuid;

    fn store() -> Store {
        Store {
            id: Uuid::new_v4().to_string(),
            company_id: "company-1".to_string(),
            name: "Downtown".to_string(),
            is_active: true,
            supervisor_id: Some("boss".to_string()),
            employees: vec!["alice".to_string()],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_store_round_trip_and_staff() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let s = store();
        db.stores().insert(&s).await.unwrap();

        db.stores().add_employee(&s.id, "bob").await.unwrap();
        db.stores().add_employee(&s.id, "bob").await.unwrap();

        let loaded = db.stores().get_by_id(&s.id).await.unwrap().unwrap();
        assert_eq!(loaded.employees.len(), 2);
        assert!(loaded.is_staff("alice"));
        assert!(loaded.is_staff("bob"));
        assert!(loaded.is_staff("boss"));

        assert!(db.stores().remove_employee(&s.id, "alice").await.unwrap());
        assert!(!db.stores().remove_employee(&s.id, "alice").await.unwrap());

        let loaded = db.stores().get_by_id(&s.id).await.unwrap().unwrap();
        assert!(!loaded.is_staff("alice"));
    }

    #[tokio::test]
    async fn test_set_active_and_missing_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let s = store();
        db.stores().insert(&s).await.unwrap();

        db.stores().set_active(&s.id, false).await.unwrap();
        let loaded = db.stores().get_by_id(&s.id).await.unwrap().unwrap();
        assert!(!loaded.is_active);

        assert!(db.stores().get_by_id("nope").await.unwrap().is_none());
        assert!(matches!(
            db.stores().set_active("nope", true).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            db.stores().add_employee("nope", "carol").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
