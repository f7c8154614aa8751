//! Catalog service: the cache-aside orchestration over a record store.
//!
//! Every public operation follows the same rules:
//!
//! - The record store is authoritative. A store failure fails the operation
//!   with `Error::StoreUnavailable`.
//! - The cache is an accelerator. A cache failure never fails an operation;
//!   reads fall through to the store and writes leave the entry absent at
//!   worst.
//! - The cache is only touched after the store has committed.
//!
//! Cache steps are awaited before the operation returns. They are bounded by
//! `cache_timeout`, so a slow cache costs at most that much per step.

use crate::backend::CacheBackend;
use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use crate::expander::CacheAside;
use crate::observability::CacheMetrics;
use crate::product::{NewProduct, ProductId, ProductPatch, ProductRecord};
use crate::repository::ProductRepository;
use crate::strategy::{Fetched, WritePolicy};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Outcome of [`CatalogService::seed`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    pub updated: usize,
}

/// Reachability of both stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub cache: bool,
    pub store: bool,
}

impl HealthReport {
    /// Serving is possible as long as the record store is up.
    pub fn is_serving(&self) -> bool {
        self.store
    }
}

struct Inner<B: CacheBackend, R: ProductRepository> {
    cache: CacheAside<B>,
    repo: R,
    config: CatalogConfig,
}

/// Product catalog with cache-aside reads and writes.
///
/// Cheap to clone; clones share the same cache, store and configuration.
///
/// # Example
///
/// ```ignore
/// use catalog_cache::{CatalogConfig, CatalogService, NewProduct};
/// use catalog_cache::backend::InMemoryBackend;
/// use catalog_cache::repository::InMemoryProductRepository;
///
/// let catalog = CatalogService::new(
///     InMemoryBackend::new(),
///     InMemoryProductRepository::new(),
///     CatalogConfig::default(),
/// )?;
///
/// let created = catalog.create(NewProduct::new("PS6", 500.0, 100)).await?;
/// let fetched = catalog.get_by_id(&created.id).await?;
/// assert!(fetched.is_cached());
/// ```
pub struct CatalogService<B: CacheBackend, R: ProductRepository> {
    inner: Arc<Inner<B, R>>,
}

impl<B: CacheBackend, R: ProductRepository> Clone for CatalogService<B, R> {
    fn clone(&self) -> Self {
        CatalogService {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CacheBackend, R: ProductRepository> CatalogService<B, R> {
    /// Create a catalog over the given cache backend and record store.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if `config` does not validate.
    pub fn new(backend: B, repo: R, config: CatalogConfig) -> Result<Self> {
        Self::build(CacheAside::from_config(backend, &config), repo, config)
    }

    /// Create a catalog with custom metrics.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if `config` does not validate.
    pub fn with_metrics(
        backend: B,
        repo: R,
        config: CatalogConfig,
        metrics: Box<dyn CacheMetrics>,
    ) -> Result<Self> {
        Self::build(
            CacheAside::from_config(backend, &config).with_metrics(metrics),
            repo,
            config,
        )
    }

    fn build(cache: CacheAside<B>, repo: R, config: CatalogConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Catalog ready: policy={}, ttl={:?}, versioned_writes={}",
            config.write_policy, config.ttl, config.versioned_writes
        );
        Ok(CatalogService {
            inner: Arc::new(Inner {
                cache,
                repo,
                config,
            }),
        })
    }

    /// Read a product by id, from cache when possible.
    ///
    /// On a miss (or an unavailable cache) the record store is read and the
    /// result is used to populate the cache. Absence is never cached.
    ///
    /// # Errors
    /// - `Error::NotFound` if the store has no such product
    /// - `Error::StoreUnavailable` if the store had to be consulted and failed
    pub async fn get_by_id(&self, id: &ProductId) -> Result<Fetched<ProductRecord>> {
        let key = self.inner.cache.key_for::<ProductRecord>(id)?;

        if let Some(record) = self.inner.cache.lookup::<ProductRecord>(&key).await {
            return Ok(Fetched::from_cache(record));
        }

        let record = self
            .store("find_by_id", self.inner.repo.find_by_id(id))
            .await?
            .ok_or_else(|| not_found(id))?;

        self.inner.cache.fill(&record).await;
        Ok(Fetched::from_store(record))
    }

    /// Read a product by its unique name.
    ///
    /// The name is resolved to an id through the record store; the cache is
    /// then consulted and filled under that id's key. A cached snapshot older
    /// than the resolved record is passed over in favor of the record.
    ///
    /// # Errors
    /// - `Error::ValidationError` for a blank name
    /// - `Error::NotFound` if no product has that name
    /// - `Error::StoreUnavailable` if the store failed
    pub async fn get_by_name(&self, name: &str) -> Result<Fetched<ProductRecord>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::ValidationError("name must not be empty".to_string()));
        }

        let resolved = self
            .store("find_by_name", self.inner.repo.find_by_name(name))
            .await?
            .ok_or_else(|| Error::NotFound(format!("product named {:?}", name)))?;

        let key = self.inner.cache.key_for::<ProductRecord>(&resolved.id)?;
        if let Some(cached) = self.inner.cache.lookup::<ProductRecord>(&key).await {
            if cached.revision >= resolved.revision {
                return Ok(Fetched::from_cache(cached));
            }
            debug!(
                "Cached {} rev {} is behind store rev {}, refilling",
                key, cached.revision, resolved.revision
            );
        }

        self.inner.cache.fill(&resolved).await;
        Ok(Fetched::from_store(resolved))
    }

    /// Create a product and, under write-through, populate its cache entry.
    ///
    /// # Errors
    /// - `Error::ValidationError` for malformed input (no store call made)
    /// - `Error::Conflict` if the name is taken
    /// - `Error::StoreUnavailable` if the store failed
    pub async fn create(&self, draft: NewProduct) -> Result<ProductRecord> {
        draft.validate()?;

        let record = self.store("insert", self.inner.repo.insert(draft)).await?;
        info!("Created product {} ({}) rev {}", record.id, record.name, record.revision);

        self.sync_cache(&record, true).await;
        Ok(record)
    }

    /// Apply a partial update.
    ///
    /// After the commit the cache entry is deleted and, under write-through,
    /// the committed snapshot is set again.
    ///
    /// # Errors
    /// - `Error::ValidationError` for an empty or malformed patch
    /// - `Error::NotFound` if the product does not exist
    /// - `Error::Conflict` if a rename collides
    /// - `Error::StoreUnavailable` if the store failed
    pub async fn update(&self, id: &ProductId, patch: ProductPatch) -> Result<ProductRecord> {
        patch.validate()?;

        let record = self
            .store(
                "upsert",
                self.inner.repo.upsert_with(id, move |record| {
                    patch.apply_to(record);
                    Ok(())
                }),
            )
            .await?
            .ok_or_else(|| not_found(id))?;
        info!("Updated product {} rev {}", record.id, record.revision);

        self.sync_cache(&record, false).await;
        Ok(record)
    }

    /// Delete a product and its cache entry.
    ///
    /// # Errors
    /// - `Error::NotFound` if the product does not exist
    /// - `Error::StoreUnavailable` if the store failed
    pub async fn delete_by_id(&self, id: &ProductId) -> Result<()> {
        let existed = self
            .store("delete_by_id", self.inner.repo.delete_by_id(id))
            .await?;
        if !existed {
            return Err(not_found(id));
        }
        info!("Deleted product {}", id);

        self.invalidate(id).await;
        Ok(())
    }

    /// Take one unit of stock.
    ///
    /// # Errors
    /// - `Error::NotFound` if the product does not exist
    /// - `Error::OutOfStock` if stock is already zero (nothing committed)
    /// - `Error::StoreUnavailable` if the store failed
    pub async fn purchase(&self, id: &ProductId) -> Result<ProductRecord> {
        let label = id.to_string();
        let record = self
            .store(
                "upsert",
                self.inner.repo.upsert_with(id, move |record| {
                    match record.stock_quantity.checked_sub(1) {
                        Some(left) => {
                            record.stock_quantity = left;
                            Ok(())
                        }
                        None => Err(Error::OutOfStock(label)),
                    }
                }),
            )
            .await?
            .ok_or_else(|| not_found(id))?;
        info!(
            "Purchased product {}: {} left, rev {}",
            record.id, record.stock_quantity, record.revision
        );

        self.sync_cache(&record, false).await;
        Ok(record)
    }

    /// Upsert products by name.
    ///
    /// Every draft is validated before the first store call. Existing names
    /// are overwritten with the draft's fields; new names are inserted.
    ///
    /// # Errors
    /// - `Error::ValidationError` if any draft is malformed
    /// - `Error::StoreUnavailable` if the store failed; drafts before the
    ///   failing one stay committed
    pub async fn seed(&self, drafts: Vec<NewProduct>) -> Result<SeedReport> {
        for draft in &drafts {
            draft.validate()?;
        }

        let mut report = SeedReport::default();
        for draft in drafts {
            let existing = self
                .store("find_by_name", self.inner.repo.find_by_name(&draft.name))
                .await?;

            let updated = match existing {
                Some(existing) => {
                    let fields = draft.clone();
                    self.store(
                        "upsert",
                        self.inner.repo.upsert_with(&existing.id, move |record| {
                            fields.overwrite(record);
                            Ok(())
                        }),
                    )
                    .await?
                }
                None => None,
            };

            match updated {
                Some(record) => {
                    report.updated += 1;
                    self.sync_cache(&record, false).await;
                }
                None => {
                    let record = self.store("insert", self.inner.repo.insert(draft)).await?;
                    report.inserted += 1;
                    self.sync_cache(&record, true).await;
                }
            }
        }

        info!(
            "Seeded catalog: {} inserted, {} updated",
            report.inserted, report.updated
        );
        Ok(report)
    }

    /// Probe both stores. Never fails.
    pub async fn health(&self) -> HealthReport {
        let store = self
            .store("health_check", self.inner.repo.health_check())
            .await
            .unwrap_or(false);
        HealthReport {
            cache: self.inner.cache.is_healthy().await,
            store,
        }
    }

    /// Release cache and store connections.
    pub async fn shutdown(&self) {
        info!("Shutting down catalog");
        self.inner.cache.backend().close().await;
        self.inner.repo.close().await;
    }

    pub fn cache(&self) -> &CacheAside<B> {
        &self.inner.cache
    }

    pub fn repository(&self) -> &R {
        &self.inner.repo
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    /// Bring the cache in line with a record that was just committed.
    async fn sync_cache(&self, record: &ProductRecord, created: bool) {
        match self.inner.config.write_policy {
            WritePolicy::WriteThrough if created => {
                self.inner.cache.fill(record).await;
            }
            WritePolicy::WriteThrough => {
                self.inner.cache.refresh(record).await;
            }
            WritePolicy::InvalidateOnly => self.invalidate(&record.id).await,
        }
    }

    async fn invalidate(&self, id: &ProductId) {
        match self.inner.cache.key_for::<ProductRecord>(id) {
            Ok(key) => {
                self.inner.cache.invalidate(&key).await;
            }
            Err(e) => warn!("Skipping cache invalidation for {}: {}", id, e),
        }
    }

    /// Run one store call under `store_timeout`.
    async fn store<T, F>(&self, op: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.inner.config.store_timeout;
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::StoreUnavailable(format!(
                "{} timed out after {:?}",
                op, timeout
            ))),
        };
        if let Err(Error::StoreUnavailable(msg)) = &result {
            error!("Record store {} failed: {}", op, msg);
        }
        result
    }
}

fn not_found(id: &ProductId) -> Error {
    Error::NotFound(format!("product {}", id))
}
