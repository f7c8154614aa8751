//! Walkthrough of the cache-aside catalog: the PS6 lifecycle, then the same
//! calls with the cache switched off.

use catalog_cache::backend::{FaultyBackend, InMemoryBackend};
use catalog_cache::observability::AtomicMetrics;
use catalog_cache::{
    error::Result, CatalogConfig, CatalogService, InMemoryProductRepository, NewProduct,
    ProductPatch,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .ok();

    println!("\n=== Catalog Cache - Walkthrough ===\n");

    // 1. Wire cache, store and config
    println!("1. Building catalog (config from CATALOG_* environment)...");
    let config = CatalogConfig::from_env()?;
    let cache = FaultyBackend::new(InMemoryBackend::new());
    let metrics = Arc::new(AtomicMetrics::new());
    let catalog = CatalogService::with_metrics(
        cache.clone(),
        InMemoryProductRepository::new(),
        config,
        Box::new(Arc::clone(&metrics)),
    )?;
    println!(
        "   ✓ policy={}, ttl={:?}\n",
        catalog.config().write_policy,
        catalog.config().ttl
    );

    // 2. Create
    println!("2. Creating PS6:");
    let ps6 = catalog
        .create(NewProduct::new("PS6", 500.0, 100).with_category("gaming"))
        .await?;
    println!("   ✓ {} rev {}\n", ps6.id, ps6.revision);

    // 3. Read back
    println!("3. Reading PS6 by id:");
    let read = catalog.get_by_id(&ps6.id).await?;
    println!("   ✓ {}\n", to_json(&read));

    // 4. Update
    println!("4. Setting stock to 99:");
    catalog
        .update(&ps6.id, ProductPatch::default().stock_quantity(99))
        .await?;
    let read = catalog.get_by_name("PS6").await?;
    println!(
        "   ✓ stock={} source={}\n",
        read.value.stock_quantity, read.source
    );

    // 5. Concurrent readers all hit the cache
    println!("5. 8 concurrent readers:");
    let reads = futures::future::join_all((0..8).map(|_| catalog.get_by_id(&ps6.id))).await;
    let cached = reads
        .iter()
        .filter(|r| r.as_ref().map(|f| f.is_cached()).unwrap_or(false))
        .count();
    println!("   ✓ {}/8 served from cache\n", cached);

    // 6. Cache outage
    println!("6. Cache outage:");
    cache.fail_all(true);
    let bought = catalog.purchase(&ps6.id).await?;
    let read = catalog.get_by_id(&ps6.id).await?;
    println!(
        "   ✓ purchase ok (stock={}), read source={}, health={}\n",
        bought.stock_quantity,
        read.source,
        to_json(&catalog.health().await)
    );
    cache.fail_all(false);

    // 7. Delete
    println!("7. Deleting PS6:");
    catalog.delete_by_id(&ps6.id).await?;
    match catalog.get_by_id(&ps6.id).await {
        Err(e) => println!("   ✓ {}\n", e),
        Ok(found) => println!("   ✗ still visible: {:?}\n", found),
    }

    println!("Metrics: {:?}", metrics.snapshot());
    println!("Cache:   {:?}", cache.inner().stats());
    catalog.shutdown().await;
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<{}>", e))
}
