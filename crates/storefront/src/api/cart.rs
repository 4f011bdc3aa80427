//! Cart endpoints. All require the session credential.
//!
//! Each mutation answers with the full cart, which callers use to replace
//! their local copy. A `null` or missing cart decodes to `None`.

use reqwest::Method;
use serde::Serialize;
use tracing::instrument;

use mercado_core::ProductId;

use super::types::extract_enveloped;
use super::{Access, ApiClient};
use crate::error::Result;
use crate::models::Cart;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CartLineBody<'a> {
    product_id: &'a ProductId,
    quantity: u32,
}

impl ApiClient {
    /// GET `/cart`.
    ///
    /// # Errors
    ///
    /// Any transport or auth failure.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Result<Option<Cart>> {
        let value = self.get("/cart", Access::Session).await?;
        extract_enveloped(value, "cart")
    }

    /// POST `/cart/add`.
    ///
    /// # Errors
    ///
    /// `Conflict` when the backend refuses the line (stock, unknown product).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_cart(&self, product_id: &ProductId, quantity: u32) -> Result<Option<Cart>> {
        let body = CartLineBody {
            product_id,
            quantity,
        };
        let value = self
            .send_json(Method::POST, "/cart/add", &body, Access::Session)
            .await?;
        extract_enveloped(value, "cart")
    }

    /// PUT `/cart/update`.
    ///
    /// # Errors
    ///
    /// `Conflict` when the backend refuses the quantity.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_cart_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Option<Cart>> {
        let body = CartLineBody {
            product_id,
            quantity,
        };
        let value = self
            .send_json(Method::PUT, "/cart/update", &body, Access::Session)
            .await?;
        extract_enveloped(value, "cart")
    }

    /// DELETE `/cart/remove/:productId`.
    ///
    /// # Errors
    ///
    /// Any transport or auth failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> Result<Option<Cart>> {
        let path = format!("/cart/remove/{}", urlencoding::encode(product_id.as_str()));
        let value = self.delete(&path, Access::Session).await?;
        extract_enveloped(value, "cart")
    }

    /// DELETE `/cart/clear`.
    ///
    /// # Errors
    ///
    /// Any transport or auth failure.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<Option<Cart>> {
        let value = self.delete("/cart/clear", Access::Session).await?;
        extract_enveloped(value, "cart")
    }
}
