//! Order endpoints. All require the session credential.

use reqwest::Method;
use tracing::instrument;

use mercado_core::OrderId;

use super::types::{extract_list, extract_required};
use super::{Access, ApiClient};
use crate::error::Result;
use crate::models::{NewOrder, Order};

impl ApiClient {
    /// POST `/orders`.
    ///
    /// # Errors
    ///
    /// `Conflict` when the backend refuses the order.
    #[instrument(skip(self, order), fields(lines = order.items.len()))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Order> {
        let value = self
            .send_json(Method::POST, "/orders", order, Access::Session)
            .await?;
        extract_required(value, "order")
    }

    /// GET `/orders`. Accepts a bare list or an `orders`/`data` envelope.
    ///
    /// # Errors
    ///
    /// Any transport or auth failure.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        let value = self.get("/orders", Access::Session).await?;
        extract_list(value, &["orders", "data"])
    }

    /// GET `/orders/:id`.
    ///
    /// # Errors
    ///
    /// `Conflict` (404) when the order does not exist.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        let value = self.get(&order_path(order_id), Access::Session).await?;
        extract_required(value, "order")
    }

    /// PUT `/orders/:id/cancel`.
    ///
    /// Returns the updated order when the backend sends one back.
    ///
    /// # Errors
    ///
    /// `Conflict` when the order can no longer be cancelled.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let path = format!("{}/cancel", order_path(order_id));
        let value = self
            .request(Method::PUT, &path, &[], None, Access::Session)
            .await?;
        // Some deployments answer `{success, message}` without the order.
        let has_order = value
            .as_object()
            .is_some_and(|map| map.contains_key("order") || map.contains_key("id"));
        if has_order {
            extract_required(value, "order").map(Some)
        } else {
            Ok(None)
        }
    }
}

fn order_path(order_id: &OrderId) -> String {
    format!("/orders/{}", urlencoding::encode(order_id.as_str()))
}
