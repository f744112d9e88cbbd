//! Product catalog seam for item validation and price snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Catalog facts about a product, as of the moment of lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub unit_price: Money,
    /// Inactive products are visible but not sellable.
    pub active: bool,
}

/// Read-only product lookup used during item validation.
///
/// Prices are always snapshotted from here at checkout time; client-supplied
/// prices are never trusted.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn product(&self, product_id: &ProductId) -> Option<ProductInfo>;
}

/// In-memory catalog.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, ProductInfo>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product entry.
    pub async fn upsert(&self, product_id: ProductId, info: ProductInfo) {
        self.products.write().await.insert(product_id, info);
    }

    /// Marks a product as no longer sellable.
    pub async fn deactivate(&self, product_id: &ProductId) {
        if let Some(info) = self.products.write().await.get_mut(product_id) {
            info.active = false;
        }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn product(&self, product_id: &ProductId) -> Option<ProductInfo> {
        self.products.read().await.get(product_id).cloned()
    }
}
