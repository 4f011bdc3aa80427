//! Product catalog with an in-memory cache.
//!
//! Unfiltered listings and product details are cached with `moka` for the
//! configured TTL. Filtered listings always go to the backend.

use std::sync::Arc;

use moka::future::Cache;
use tracing::{debug, instrument};

use mercado_core::ProductId;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::models::{Product, ProductFilter};

const ALL_PRODUCTS_KEY: &str = "products:all";

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<Product>),
    Products(Arc<Vec<Product>>),
}

/// Read-only access to the product catalog. Cheap to clone.
#[derive(Clone)]
pub struct Catalog {
    api: ApiClient,
    cache: Cache<String, CacheValue>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("cached_entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Catalog over `api`, caching for `config.catalog_cache_ttl`.
    #[must_use]
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.catalog_cache_ttl)
            .build();
        Self { api, cache }
    }

    /// List products.
    ///
    /// # Errors
    ///
    /// Any transport failure.
    #[instrument(skip(self))]
    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let cacheable = filter.is_empty();
        if cacheable
            && let Some(CacheValue::Products(products)) = self.cache.get(ALL_PRODUCTS_KEY).await
        {
            debug!("Cache hit for products");
            return Ok(products.as_ref().clone());
        }

        let products = self.api.list_products(filter).await?;

        if cacheable {
            self.cache
                .insert(
                    ALL_PRODUCTS_KEY.to_string(),
                    CacheValue::Products(Arc::new(products.clone())),
                )
                .await;
        }
        Ok(products)
    }

    /// Get one product.
    ///
    /// # Errors
    ///
    /// `Conflict` (404) for an unknown product, or any transport failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn product(&self, product_id: &ProductId) -> Result<Product> {
        let cache_key = format!("product:{product_id}");
        if let Some(CacheValue::Product(product)) = self.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product = self.api.get_product(product_id).await?;
        self.cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Products flagged as featured.
    ///
    /// # Errors
    ///
    /// Any transport failure.
    pub async fn featured_products(&self) -> Result<Vec<Product>> {
        let products = self.products(&ProductFilter::default()).await?;
        Ok(products.into_iter().filter(|p| p.featured).collect())
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}
