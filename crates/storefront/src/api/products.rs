//! Public catalog endpoints.

use tracing::instrument;

use mercado_core::ProductId;

use super::types::{extract_list, extract_required};
use super::{Access, ApiClient};
use crate::error::Result;
use crate::models::{Product, ProductFilter};

impl ApiClient {
    /// GET `/products` with optional filters.
    ///
    /// # Errors
    ///
    /// Any transport failure.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let value = self
            .get_with_query("/products", &filter.query_pairs(), Access::Public)
            .await?;
        extract_list(value, &["products", "data"])
    }

    /// GET `/products/:id`.
    ///
    /// # Errors
    ///
    /// `Conflict` (404) when the product does not exist.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product> {
        let path = format!("/products/{}", urlencoding::encode(product_id.as_str()));
        let value = self.get(&path, Access::Public).await?;
        extract_required(value, "product")
    }
}
