//! Product record model.
//!
//! [`ProductRecord`] is owned by the record store. The cache only ever holds
//! complete snapshots of it, keyed by [`ProductId`].

use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Store-assigned, immutable product identity.
///
/// Rendered as 32 lowercase hex digits so the derived cache key is
/// lowercase and carries no separator besides the prefix colon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl ProductId {
    /// Allocate a new id (UUIDv7, time ordered).
    pub fn generate() -> Self {
        ProductId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ProductId {
    fn from(id: Uuid) -> Self {
        ProductId(id)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ProductId {
    type Err = Error;

    /// Accepts any textual UUID form (simple, hyphenated, braced, urn).
    fn from_str(s: &str) -> Result<Self> {
        Ok(ProductId(Uuid::parse_str(s.trim())?))
    }
}

/// A product as committed in the record store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub category: Option<String>,
    pub price: f64,
    pub stock_quantity: u32,
    /// Store-assigned commit counter, strictly increasing per id.
    pub revision: u64,
    /// Commit time, monotonically non-decreasing per id.
    pub updated_at: DateTime<Utc>,
}

impl CacheEntity for ProductRecord {
    type Key = ProductId;

    fn cache_key(&self) -> Self::Key {
        self.id
    }

    fn cache_prefix() -> &'static str {
        "product"
    }

    fn cache_version(&self) -> u64 {
        self.revision
    }

    fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_price(self.price)
    }
}

/// Fields supplied by a caller when creating a product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: f64,
    pub stock_quantity: u32,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: f64, stock_quantity: u32) -> Self {
        NewProduct {
            name: name.into(),
            category: None,
            price,
            stock_quantity,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Reject malformed input before it reaches any store.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_price(self.price)
    }

    /// Overwrite every caller-owned field of `record` with this draft.
    pub fn overwrite(&self, record: &mut ProductRecord) {
        record.name = self.name.trim().to_string();
        record.category = self.category.clone();
        record.price = self.price;
        record.stock_quantity = self.stock_quantity;
    }
}

/// Partial update. Absent fields keep their committed value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub stock_quantity: Option<u32>,
}

impl ProductPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn stock_quantity(mut self, stock_quantity: u32) -> Self {
        self.stock_quantity = Some(stock_quantity);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.stock_quantity.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::ValidationError("patch has no fields".to_string()));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }

    /// Merge this patch into `record` in place.
    pub fn apply_to(&self, record: &mut ProductRecord) {
        if let Some(name) = &self.name {
            record.name = name.trim().to_string();
        }
        if let Some(category) = &self.category {
            record.category = Some(category.clone());
        }
        if let Some(price) = self.price {
            record.price = price;
        }
        if let Some(stock) = self.stock_quantity {
            record.stock_quantity = stock;
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::ValidationError("name must not be empty".to_string()));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::ValidationError(format!(
            "price must be a non-negative number, got {}",
            price
        )));
    }
    Ok(())
}
