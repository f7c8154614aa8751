//! # catalog-cache
//!
//! Cache-aside consistency layer for a product catalog.
//!
//! A durable record store is the source of truth; a key/value cache with
//! per-entry TTL sits in front of it. This crate keeps the two consistent
//! without ever letting the cache decide the outcome of a request.
//!
//! ## Guarantees
//!
//! - **Store first:** no cache entry is ever written for a commit that did
//!   not happen.
//! - **Fail open:** cache failures and timeouts degrade to store-only
//!   behavior. Store failures surface as `Error::StoreUnavailable`.
//! - **Bounded staleness:** every entry carries the configured TTL.
//! - **No negative caching:** absence is never cached.
//! - **Versioned fills:** with `versioned_writes` on, a late fill carrying
//!   an older revision cannot overwrite a newer cached snapshot.
//!
//! ## Quick Start
//!
//! ```ignore
//! use catalog_cache::{CatalogConfig, CatalogService, NewProduct, ProductPatch};
//! use catalog_cache::backend::InMemoryBackend;
//! use catalog_cache::repository::InMemoryProductRepository;
//!
//! let catalog = CatalogService::new(
//!     InMemoryBackend::new(),
//!     InMemoryProductRepository::new(),
//!     CatalogConfig::from_env()?,
//! )?;
//!
//! let ps6 = catalog.create(NewProduct::new("PS6", 500.0, 100)).await?;
//! catalog.update(&ps6.id, ProductPatch::default().stock_quantity(99)).await?;
//!
//! let read = catalog.get_by_id(&ps6.id).await?;
//! assert_eq!(read.value.stock_quantity, 99);
//! ```
//!
//! ### Lower-level cache access
//!
//! [`CacheAside`] exposes the cache half on its own, for entities other than
//! products:
//!
//! ```ignore
//! let cache = CacheAside::new(InMemoryBackend::new());
//! let key = cache.key_for::<Category>(&id)?;
//! let cached: Option<Category> = cache.lookup(&key).await;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod expander;
pub mod key;
pub mod observability;
pub mod product;
pub mod repository;
pub mod serialization;
pub mod service;
pub mod strategy;

pub use backend::{CacheBackend, SetOutcome};
pub use config::CatalogConfig;
pub use entity::CacheEntity;
pub use error::{Error, Result};
pub use expander::CacheAside;
pub use product::{NewProduct, ProductId, ProductPatch, ProductRecord};
pub use repository::{InMemoryProductRepository, ProductRepository};
pub use service::{CatalogService, HealthReport, SeedReport};
pub use strategy::{Fetched, Source, WritePolicy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
