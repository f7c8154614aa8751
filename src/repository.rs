//! Record store abstraction.
//!
//! The record store is the single source of truth for products. Every
//! operation is strongly consistent with respect to the store itself; no
//! cross-record transactions are assumed.
//!
//! # Implementing ProductRepository
//!
//! Implement this trait over a real document or SQL store. Map transport
//! failures to `Error::StoreUnavailable`; report absence as `Ok(None)` /
//! `Ok(false)`, never as an error.
//!
//! ```ignore
//! impl ProductRepository for MongoProducts {
//!     async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
//!         self.collection
//!             .find_one(doc! { "_id": id.to_string() })
//!             .await
//!             .map_err(|e| Error::StoreUnavailable(e.to_string()))
//!     }
//!     // ...
//! }
//! ```

use crate::error::{Error, Result};
use crate::product::{NewProduct, ProductId, ProductRecord};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Trait for product record stores.
#[allow(async_fn_in_trait)]
pub trait ProductRepository: Send + Sync {
    /// Fetch a product by id.
    ///
    /// # Errors
    /// Returns `Err` if the store is unavailable
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>>;

    /// Fetch a product by its unique name.
    ///
    /// # Errors
    /// Returns `Err` if the store is unavailable
    async fn find_by_name(&self, name: &str) -> Result<Option<ProductRecord>>;

    /// Commit a new product. The store assigns `id`, `revision` and
    /// `updated_at` and returns the committed record.
    ///
    /// # Errors
    /// - `Error::Conflict` if the name is already taken
    /// - `Error::StoreUnavailable` if the store is unavailable
    async fn insert(&self, draft: NewProduct) -> Result<ProductRecord>;

    /// Atomically read, modify and commit an existing product.
    ///
    /// `apply` runs against the current committed state; if it returns an
    /// error nothing is committed and the error is returned. On success the
    /// store bumps `revision`, advances `updated_at` and returns the
    /// committed record. Returns `Ok(None)` when `id` does not exist.
    ///
    /// # Errors
    /// - whatever `apply` returns
    /// - `Error::Conflict` if the new name belongs to another product
    /// - `Error::StoreUnavailable` if the store is unavailable
    async fn upsert_with<F>(&self, id: &ProductId, apply: F) -> Result<Option<ProductRecord>>
    where
        F: FnOnce(&mut ProductRecord) -> Result<()> + Send;

    /// Delete a product. Returns `false` if it did not exist.
    ///
    /// # Errors
    /// Returns `Err` if the store is unavailable
    async fn delete_by_id(&self, id: &ProductId) -> Result<bool>;

    /// Health check - verify the store is reachable.
    ///
    /// # Errors
    /// Returns `Err` if the store is not reachable
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Release connections. Called once at shutdown.
    async fn close(&self) {}
}

// ============================================================================
// In-Memory Record Store
// ============================================================================

#[derive(Default)]
struct Tables {
    by_id: HashMap<ProductId, ProductRecord>,
    by_name: HashMap<String, ProductId>,
}

/// In-memory record store.
///
/// Both indexes live under one lock, so every operation observes and
/// commits a consistent state. Can be switched offline to exercise
/// `StoreUnavailable` handling.
#[derive(Default)]
pub struct InMemoryProductRepository {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.by_id.is_empty()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(
                "record store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        self.ensure_online()?;
        Ok(self.tables.read().await.by_id.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ProductRecord>> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .by_name
            .get(name.trim())
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }

    async fn insert(&self, draft: NewProduct) -> Result<ProductRecord> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;

        let name = draft.name.trim().to_string();
        if tables.by_name.contains_key(&name) {
            return Err(Error::Conflict(format!("product name already exists: {}", name)));
        }

        let mut record = ProductRecord {
            id: ProductId::generate(),
            name: String::new(),
            category: None,
            price: 0.0,
            stock_quantity: 0,
            revision: 1,
            updated_at: Utc::now(),
        };
        draft.overwrite(&mut record);

        tables.by_name.insert(record.name.clone(), record.id);
        tables.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    async fn upsert_with<F>(&self, id: &ProductId, apply: F) -> Result<Option<ProductRecord>>
    where
        F: FnOnce(&mut ProductRecord) -> Result<()> + Send,
    {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;

        let current = match tables.by_id.get(id) {
            Some(current) => current.clone(),
            None => return Ok(None),
        };
        let mut next = current.clone();
        apply(&mut next)?;

        let previous_name = current.name;
        if next.name != previous_name {
            if tables.by_name.get(&next.name).is_some_and(|owner| owner != id) {
                return Err(Error::Conflict(format!(
                    "product name already exists: {}",
                    next.name
                )));
            }
            tables.by_name.remove(&previous_name);
            tables.by_name.insert(next.name.clone(), *id);
        }

        next.id = *id;
        next.revision = current.revision + 1;
        next.updated_at = Utc::now().max(current.updated_at);

        tables.by_id.insert(*id, next.clone());
        Ok(Some(next))
    }

    async fn delete_by_id(&self, id: &ProductId) -> Result<bool> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;

        match tables.by_id.remove(id) {
            Some(record) => {
                tables.by_name.remove(&record.name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.offline.load(Ordering::SeqCst))
    }
}
