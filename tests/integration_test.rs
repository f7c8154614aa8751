//! Integration tests for catalog-cache
//!
//! These tests verify end-to-end cache-aside behavior across the service,
//! the cache backends and the record store, including degraded modes.

use catalog_cache::backend::{CacheBackend, FaultyBackend, InMemoryBackend};
use catalog_cache::observability::AtomicMetrics;
use catalog_cache::{
    CatalogConfig, CatalogService, Error, InMemoryProductRepository, NewProduct, ProductId,
    ProductPatch, ProductRecord, ProductRepository, Result, SetOutcome, Source, WritePolicy,
};
use std::sync::Arc;
use std::time::Duration;

type Catalog<B = InMemoryBackend> = CatalogService<B, InMemoryProductRepository>;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup(config: CatalogConfig) -> (Catalog, InMemoryBackend) {
    init_logging();
    let backend = InMemoryBackend::new();
    let catalog = CatalogService::new(backend.clone(), InMemoryProductRepository::new(), config)
        .expect("valid config");
    (catalog, backend)
}

fn setup_faulty(
    config: CatalogConfig,
) -> (
    Catalog<FaultyBackend<InMemoryBackend>>,
    FaultyBackend<InMemoryBackend>,
) {
    init_logging();
    let backend = FaultyBackend::new(InMemoryBackend::new());
    let catalog = CatalogService::new(backend.clone(), InMemoryProductRepository::new(), config)
        .expect("valid config");
    (catalog, backend)
}

fn ps6() -> NewProduct {
    NewProduct::new("PS6", 500.0, 100).with_category("gaming")
}

fn key(id: &ProductId) -> String {
    format!("product:{}", id)
}

/// Test 1: PS6 walkthrough
///
/// create → cached read → update → fresh read → delete → NotFound
#[tokio::test]
async fn test_ps6_lifecycle() {
    let (catalog, backend) = setup(CatalogConfig::default());

    let created = catalog.create(ps6()).await.expect("Failed to create");
    assert_eq!(created.stock_quantity, 100);

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Cache);
    assert_eq!(read.value, created);

    catalog
        .update(&created.id, ProductPatch::default().stock_quantity(99))
        .await
        .expect("Failed to update");

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.value.stock_quantity, 99);
    assert_eq!(read.value.revision, 2);

    catalog.delete_by_id(&created.id).await.expect("Failed to delete");

    let result = catalog.get_by_id(&created.id).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(backend.get(&key(&created.id)).await.unwrap().is_none());
}

/// Test 2: Read-after-create is served from cache
#[tokio::test]
async fn test_read_after_create_hits_cache() {
    let metrics = Arc::new(AtomicMetrics::new());
    let catalog = CatalogService::with_metrics(
        InMemoryBackend::new(),
        InMemoryProductRepository::new(),
        CatalogConfig::default(),
        Box::new(Arc::clone(&metrics)),
    )
    .unwrap();

    let mut ids = vec![];
    for i in 0..10 {
        let created = catalog
            .create(NewProduct::new(format!("Item {}", i), 10.0 + i as f64, i))
            .await
            .unwrap();
        ids.push(created.id);
    }

    for id in &ids {
        assert!(catalog.get_by_id(id).await.unwrap().is_cached());
    }

    let snap = metrics.snapshot();
    assert_eq!(snap.hits, 10);
    assert_eq!(snap.misses, 0);
    assert_eq!(snap.sets, 10);
}

/// Test 3: No stale read after a write, under both policies
#[tokio::test]
async fn test_no_stale_read_after_update() {
    for policy in [WritePolicy::WriteThrough, WritePolicy::InvalidateOnly] {
        let (catalog, _) = setup(CatalogConfig::default().with_write_policy(policy));
        let created = catalog.create(ps6()).await.unwrap();

        // Warm the cache with the pre-update snapshot
        catalog.get_by_id(&created.id).await.unwrap();
        catalog.get_by_id(&created.id).await.unwrap();

        for stock in (90..100).rev() {
            catalog
                .update(&created.id, ProductPatch::default().stock_quantity(stock))
                .await
                .unwrap();
            let read = catalog.get_by_id(&created.id).await.unwrap();
            assert_eq!(read.value.stock_quantity, stock, "policy {}", policy);
        }
    }
}

/// Test 4: InvalidateOnly leaves the entry absent after each write
#[tokio::test]
async fn test_invalidate_only_drops_entry() {
    let (catalog, backend) =
        setup(CatalogConfig::default().with_write_policy(WritePolicy::InvalidateOnly));
    let created = catalog.create(ps6()).await.unwrap();

    let first = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(first.source, Source::Store);
    assert!(backend.get(&key(&created.id)).await.unwrap().is_some());

    catalog
        .update(&created.id, ProductPatch::default().price(450.0))
        .await
        .unwrap();
    assert!(backend.get(&key(&created.id)).await.unwrap().is_none());

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Store);
    assert_eq!(read.value.price, 450.0);
}

/// Test 5: Absence is never cached
#[tokio::test]
async fn test_not_found_is_not_cached() {
    let (catalog, backend) = setup(CatalogConfig::default());
    let id = ProductId::generate();

    assert!(matches!(catalog.get_by_id(&id).await, Err(Error::NotFound(_))));
    assert!(backend.is_empty());

    assert!(matches!(
        catalog.delete_by_id(&id).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        catalog
            .update(&id, ProductPatch::default().stock_quantity(1))
            .await,
        Err(Error::NotFound(_))
    ));
}

/// Test 6: Entries expire after TTL without explicit invalidation
#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() {
    let ttl = Duration::from_secs(60);
    let (catalog, backend) = setup(CatalogConfig::default().with_ttl(ttl));
    let created = catalog.create(ps6()).await.unwrap();

    tokio::time::advance(ttl - Duration::from_secs(1)).await;
    assert!(catalog.get_by_id(&created.id).await.unwrap().is_cached());

    tokio::time::advance(Duration::from_secs(2)).await;
    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Store);

    // Repopulated with a fresh lifetime
    let remaining = backend.ttl_remaining(&key(&created.id)).expect("repopulated");
    assert!(remaining > ttl - Duration::from_secs(1));
    assert!(catalog.get_by_id(&created.id).await.unwrap().is_cached());
}

/// Test 7: Cache always unavailable, every operation succeeds store-only
#[tokio::test]
async fn test_cache_down_degrades_to_store() {
    let (catalog, backend) = setup_faulty(CatalogConfig::default());
    backend.fail_all(true);

    let created = catalog.create(ps6()).await.expect("create succeeds without cache");

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Store);

    let updated = catalog
        .update(&created.id, ProductPatch::default().stock_quantity(99))
        .await
        .expect("update succeeds without cache");
    assert_eq!(updated.stock_quantity, 99);

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Store);
    assert_eq!(read.value.stock_quantity, 99);

    catalog.purchase(&created.id).await.expect("purchase succeeds without cache");
    catalog.delete_by_id(&created.id).await.expect("delete succeeds without cache");
    assert!(matches!(
        catalog.get_by_id(&created.id).await,
        Err(Error::NotFound(_))
    ));
    assert!(backend.inner().is_empty());
}

/// Test 8: A cache that recovers is used again
#[tokio::test]
async fn test_cache_recovery() {
    let (catalog, backend) = setup_faulty(CatalogConfig::default());
    backend.fail_all(true);
    let created = catalog.create(ps6()).await.unwrap();
    assert!(!catalog.health().await.cache);

    backend.fail_all(false);
    assert_eq!(catalog.get_by_id(&created.id).await.unwrap().source, Source::Store);
    assert_eq!(catalog.get_by_id(&created.id).await.unwrap().source, Source::Cache);
    assert!(catalog.health().await.cache);
}

/// Test 9: Failed invalidation on update never leaves an older snapshot
#[tokio::test]
async fn test_update_with_failed_set_leaves_entry_absent() {
    let (catalog, backend) = setup_faulty(CatalogConfig::default());
    let created = catalog.create(ps6()).await.unwrap();
    backend.fail_set(true);

    catalog
        .update(&created.id, ProductPatch::default().stock_quantity(99))
        .await
        .unwrap();

    assert!(backend.inner().get(&key(&created.id)).await.unwrap().is_none());
    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Store);
    assert_eq!(read.value.stock_quantity, 99);
}

/// Test 10: A failed delete is overridden by the write-through set
#[tokio::test]
async fn test_update_with_failed_delete_still_refreshes() {
    let (catalog, backend) = setup_faulty(CatalogConfig::default());
    let created = catalog.create(ps6()).await.unwrap();
    backend.fail_delete(true);

    catalog
        .update(&created.id, ProductPatch::default().stock_quantity(99))
        .await
        .unwrap();

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Cache);
    assert_eq!(read.value.stock_quantity, 99);
}

/// Test 11: A stalled cache costs at most the cache timeout per step
#[tokio::test(start_paused = true)]
async fn test_stalled_cache_is_bounded() {
    let (catalog, backend) = setup_faulty(
        CatalogConfig::default().with_cache_timeout(Duration::from_millis(100)),
    );
    let created = catalog.create(ps6()).await.unwrap();
    backend.stall(Some(Duration::from_secs(60)));

    let started = tokio::time::Instant::now();
    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Store);

    catalog
        .update(&created.id, ProductPatch::default().stock_quantity(99))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
}

/// Test 12: Store failures surface, and nothing is written to cache
#[tokio::test]
async fn test_store_down_is_fatal() {
    let (catalog, backend) = setup(CatalogConfig::default());
    let created = catalog.create(ps6()).await.unwrap();
    catalog.repository().set_offline(true);

    let result = catalog
        .update(&created.id, ProductPatch::default().stock_quantity(1))
        .await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    assert_eq!(backend.version_of(&key(&created.id)), Some(1));

    let result = catalog.create(NewProduct::new("Switch 3", 400.0, 5)).await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    assert_eq!(backend.len(), 1);

    // Warm entries keep serving reads
    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Cache);

    // Cold reads need the store
    backend.delete(&key(&created.id)).await.unwrap();
    let result = catalog.get_by_id(&created.id).await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));
}

/// Record store that answers slower than any sane timeout.
struct SlowRepository {
    inner: InMemoryProductRepository,
    delay: Duration,
}

impl ProductRepository for SlowRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_by_id(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ProductRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_by_name(name).await
    }

    async fn insert(&self, draft: NewProduct) -> Result<ProductRecord> {
        self.inner.insert(draft).await
    }

    async fn upsert_with<F>(&self, id: &ProductId, apply: F) -> Result<Option<ProductRecord>>
    where
        F: FnOnce(&mut ProductRecord) -> Result<()> + Send,
    {
        tokio::time::sleep(self.delay).await;
        self.inner.upsert_with(id, apply).await
    }

    async fn delete_by_id(&self, id: &ProductId) -> Result<bool> {
        self.inner.delete_by_id(id).await
    }
}

/// Test 13: A store call past store_timeout is StoreUnavailable
#[tokio::test(start_paused = true)]
async fn test_store_timeout() {
    init_logging();
    let catalog = CatalogService::new(
        InMemoryBackend::new(),
        SlowRepository {
            inner: InMemoryProductRepository::new(),
            delay: Duration::from_secs(30),
        },
        CatalogConfig::default()
            .with_store_timeout(Duration::from_secs(2))
            .with_write_policy(WritePolicy::InvalidateOnly),
    )
    .unwrap();

    let created = catalog.create(ps6()).await.unwrap();

    let result = catalog.get_by_id(&created.id).await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));

    let result = catalog
        .update(&created.id, ProductPatch::default().stock_quantity(1))
        .await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));
}

/// Test 14: Late read-miss fill after an update is rejected
#[tokio::test]
async fn test_late_fill_cannot_overwrite_newer_snapshot() {
    let (catalog, backend) = setup(CatalogConfig::default());
    let created = catalog.create(ps6()).await.unwrap();

    // Reader fetched revision 1 from the store, then stalled before its fill
    let stale = created.clone();

    catalog
        .update(&created.id, ProductPatch::default().stock_quantity(99))
        .await
        .unwrap();

    let outcome = catalog.cache().fill(&stale).await;
    assert_eq!(outcome, Some(SetOutcome::Rejected));
    assert_eq!(backend.version_of(&key(&created.id)), Some(2));

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Cache);
    assert_eq!(read.value.stock_quantity, 99);
}

/// Test 14b: A writer's cache refresh landing after a later writer's cannot
/// roll the entry back
#[tokio::test]
async fn test_late_refresh_cannot_roll_back_newer_update() {
    let (catalog, backend) = setup(CatalogConfig::default());
    let created = catalog.create(ps6()).await.unwrap();

    let first = catalog
        .update(&created.id, ProductPatch::default().stock_quantity(99))
        .await
        .unwrap();
    let second = catalog
        .update(&created.id, ProductPatch::default().stock_quantity(98))
        .await
        .unwrap();
    assert_eq!((first.revision, second.revision), (2, 3));

    // First writer's delete-then-set arrives only now
    let outcome = catalog.cache().refresh(&first).await;
    assert_eq!(outcome, Some(SetOutcome::Rejected));
    assert_eq!(backend.version_of(&key(&created.id)), Some(3));

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Cache);
    assert_eq!(read.value.stock_quantity, 98);
    assert_eq!(read.value, second);
}

/// Test 15: Without versioned writes the race window is bounded by TTL
#[tokio::test(start_paused = true)]
async fn test_unversioned_late_fill_heals_after_ttl() {
    let ttl = Duration::from_secs(30);
    let (catalog, _) = setup(
        CatalogConfig::default()
            .with_ttl(ttl)
            .with_versioned_writes(false),
    );
    let created = catalog.create(ps6()).await.unwrap();
    let stale = created.clone();

    catalog
        .update(&created.id, ProductPatch::default().stock_quantity(99))
        .await
        .unwrap();
    catalog.cache().fill(&stale).await;

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.value.stock_quantity, 100);

    tokio::time::advance(ttl + Duration::from_secs(1)).await;
    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Store);
    assert_eq!(read.value.stock_quantity, 99);
}

/// Test 16: Lookup by name shares the id-keyed cache entry
#[tokio::test]
async fn test_get_by_name() {
    let (catalog, _) = setup(CatalogConfig::default());
    let created = catalog.create(ps6()).await.unwrap();

    let read = catalog.get_by_name("  PS6 ").await.unwrap();
    assert_eq!(read.source, Source::Cache);
    assert_eq!(read.value.id, created.id);

    catalog
        .update(&created.id, ProductPatch::default().name("PS6 Pro"))
        .await
        .unwrap();
    assert!(matches!(
        catalog.get_by_name("PS6").await,
        Err(Error::NotFound(_))
    ));
    assert_eq!(
        catalog.get_by_name("PS6 Pro").await.unwrap().value.revision,
        2
    );
    assert!(matches!(
        catalog.get_by_name("   ").await,
        Err(Error::ValidationError(_))
    ));
}

/// Test 16b: Lookup by name never serves a cached snapshot older than the
/// record it just resolved
#[tokio::test]
async fn test_get_by_name_prefers_fresher_store_record() {
    let (catalog, _) = setup(CatalogConfig::default().with_versioned_writes(false));
    let created = catalog.create(ps6()).await.unwrap();

    catalog
        .update(&created.id, ProductPatch::default().stock_quantity(99))
        .await
        .unwrap();
    // Stalled reader overwrites the entry with revision 1
    catalog.cache().fill(&created).await;

    let read = catalog.get_by_name("PS6").await.unwrap();
    assert_eq!(read.source, Source::Store);
    assert_eq!(read.value.stock_quantity, 99);

    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.source, Source::Cache);
    assert_eq!(read.value.revision, 2);
}

/// Test 17: Duplicate names conflict and leave cache untouched
#[tokio::test]
async fn test_duplicate_name_conflicts() {
    let (catalog, backend) = setup(CatalogConfig::default());
    catalog.create(ps6()).await.unwrap();

    let result = catalog.create(NewProduct::new("PS6", 1.0, 1)).await;
    assert!(matches!(result, Err(Error::Conflict(_))));
    assert_eq!(backend.len(), 1);
}

/// Test 18: Purchases decrement stock and keep the cache current
#[tokio::test]
async fn test_purchase_until_out_of_stock() {
    let (catalog, _) = setup(CatalogConfig::default());
    let created = catalog
        .create(NewProduct::new("Limited Edition", 999.0, 3))
        .await
        .unwrap();

    for left in (0..3).rev() {
        let record = catalog.purchase(&created.id).await.unwrap();
        assert_eq!(record.stock_quantity, left);

        let read = catalog.get_by_id(&created.id).await.unwrap();
        assert!(read.is_cached());
        assert_eq!(read.value.stock_quantity, left);
    }

    assert!(matches!(
        catalog.purchase(&created.id).await,
        Err(Error::OutOfStock(_))
    ));
    assert!(matches!(
        catalog.purchase(&ProductId::generate()).await,
        Err(Error::NotFound(_))
    ));
}

/// Test 19: Concurrent purchases never lose a decrement
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases() {
    let (catalog, _) = setup(CatalogConfig::default());
    let created = catalog.create(ps6()).await.unwrap();

    let mut handles = vec![];
    for _ in 0..50 {
        let catalog = catalog.clone();
        let id = created.id;
        handles.push(tokio::spawn(async move {
            catalog.purchase(&id).await.expect("Failed to purchase").revision
        }));
    }

    let mut revisions = vec![];
    for handle in handles {
        revisions.push(handle.await.expect("Task failed"));
    }
    revisions.sort_unstable();
    revisions.dedup();
    assert_eq!(revisions.len(), 50);

    let stored = catalog
        .repository()
        .find_by_id(&created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.stock_quantity, 50);
    assert_eq!(stored.revision, 51);

    // One more serialized write leaves cache and store in agreement
    catalog.purchase(&created.id).await.unwrap();
    let read = catalog.get_by_id(&created.id).await.unwrap();
    assert_eq!(read.value.stock_quantity, 49);
    assert_eq!(read.value.revision, 52);
}

/// Test 20: Seeding upserts by name
#[tokio::test]
async fn test_seed_upserts_by_name() {
    let (catalog, _) = setup(CatalogConfig::default());

    let report = catalog
        .seed(vec![ps6(), NewProduct::new("Switch 3", 400.0, 20)])
        .await
        .unwrap();
    assert_eq!((report.inserted, report.updated), (2, 0));

    let ps6_id = catalog.get_by_name("PS6").await.unwrap().value.id;
    assert!(catalog.get_by_id(&ps6_id).await.unwrap().is_cached());

    let report = catalog
        .seed(vec![
            NewProduct::new("PS6", 450.0, 80),
            NewProduct::new("Steam Deck 2", 550.0, 10),
        ])
        .await
        .unwrap();
    assert_eq!((report.inserted, report.updated), (1, 1));

    let read = catalog.get_by_id(&ps6_id).await.unwrap();
    assert_eq!(read.source, Source::Cache);
    assert_eq!(read.value.price, 450.0);
    assert_eq!(read.value.category, None);
    assert_eq!(catalog.repository().len().await, 3);
}

/// Test 21: Seeding validates everything before touching the store
#[tokio::test]
async fn test_seed_rejects_invalid_batch() {
    let (catalog, _) = setup(CatalogConfig::default());

    let result = catalog
        .seed(vec![ps6(), NewProduct::new("Broken", f64::NAN, 1)])
        .await;
    assert!(matches!(result, Err(Error::ValidationError(_))));
    assert!(catalog.repository().is_empty().await);
}

/// Test 22: Shutdown releases both sides
#[tokio::test]
async fn test_health_and_shutdown() {
    let (catalog, _) = setup(CatalogConfig::default());
    let health = catalog.health().await;
    assert!(health.cache && health.store);
    catalog.shutdown().await;
}
