//! Order history and cancellation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::instrument;

use mercado_core::{Money, OrderId, OrderStatus, UserId};

use crate::error::{AuthError, ClientError, Result, add_breadcrumb};
use crate::models::Order;
use crate::session::SessionManager;

/// Figures shown above the order list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderSummary {
    pub total_orders: usize,
    pub delivered: usize,
    pub in_progress: usize,
    pub total_spent: Money,
}

impl OrderSummary {
    /// Recompute from a list of orders.
    #[must_use]
    pub fn from_orders(orders: &[Order]) -> Self {
        orders.iter().fold(Self::default(), |mut summary, order| {
            summary.total_orders += 1;
            if order.status == OrderStatus::Delivered {
                summary.delivered += 1;
            }
            if order.status.is_in_progress() {
                summary.in_progress += 1;
            }
            summary.total_spent = summary.total_spent + order.total_amount;
            summary
        })
    }
}

/// The signed-in user's orders. Cheap to clone.
#[derive(Clone)]
pub struct OrderHistory {
    inner: Arc<OrderInner>,
}

struct OrderInner {
    session: SessionManager,
    state: RwLock<OrderState>,
    cancelling: Mutex<HashSet<OrderId>>,
}

#[derive(Default)]
struct OrderState {
    owner: Option<UserId>,
    orders: Vec<Order>,
    load_error: Option<String>,
}

impl std::fmt::Debug for OrderHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderHistory")
            .field("orders", &self.orders().len())
            .finish_non_exhaustive()
    }
}

/// Removes an order from the in-flight set when the cancellation ends.
struct CancelGuard<'a> {
    set: &'a Mutex<HashSet<OrderId>>,
    id: OrderId,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl OrderHistory {
    #[must_use]
    pub fn new(session: SessionManager) -> Self {
        Self {
            inner: Arc::new(OrderInner {
                session,
                state: RwLock::new(OrderState::default()),
                cancelling: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Fetch the order list.
    ///
    /// On failure the list is emptied and the error kept for
    /// [`OrderHistory::load_error`].
    ///
    /// # Errors
    ///
    /// Any auth or transport failure.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        let owner = self.owner()?;
        match self.inner.session.api().list_orders().await {
            Ok(orders) => {
                tracing::debug!(count = orders.len(), "Orders loaded");
                self.write(|state| {
                    state.owner = Some(owner);
                    state.orders.clone_from(&orders);
                    state.load_error = None;
                });
                Ok(orders)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load orders");
                self.write(|state| {
                    state.owner = Some(owner);
                    state.orders.clear();
                    state.load_error = Some(err.user_message());
                });
                Err(err)
            }
        }
    }

    /// Fetch one order and refresh the local copy.
    ///
    /// # Errors
    ///
    /// Any auth or transport failure; `Conflict` (404) for an unknown order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn order(&self, order_id: &OrderId) -> Result<Order> {
        let owner = self.owner()?;
        let order = self.inner.session.api().get_order(order_id).await?;
        self.write(|state| {
            if state.owner.as_ref() != Some(&owner) {
                return;
            }
            match state.orders.iter_mut().find(|o| o.id == order.id) {
                Some(existing) => *existing = order.clone(),
                None => state.orders.insert(0, order.clone()),
            }
        });
        Ok(order)
    }

    /// Cancel an order.
    ///
    /// Orders that are not pending or processing locally are refused without
    /// a request. The backend has the final word; on refusal the local status
    /// is left alone.
    ///
    /// # Errors
    ///
    /// - `Conflict` when the order cannot be cancelled
    /// - `Pending` while a cancellation of the same order is in flight
    /// - any auth or transport failure
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<()> {
        self.owner()?;
        if let Some(status) = self.local_status(order_id)
            && !status.is_cancellable()
        {
            return Err(ClientError::Conflict {
                status: None,
                message: format!("Order is {} and can no longer be cancelled", status.label()),
            });
        }

        let _guard = {
            let mut cancelling = self
                .inner
                .cancelling
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !cancelling.insert(order_id.clone()) {
                return Err(ClientError::Pending("order cancellation"));
            }
            CancelGuard {
                set: &self.inner.cancelling,
                id: order_id.clone(),
            }
        };

        add_breadcrumb("orders", "Cancel order", &[("order_id", order_id.as_str())]);
        let updated = self.inner.session.api().cancel_order(order_id).await?;
        tracing::info!(order_id = %order_id, "Order cancelled");

        self.write(|state| {
            if let Some(order) = state.orders.iter_mut().find(|o| &o.id == order_id) {
                if let Some(updated) = updated.filter(|u| u.id == *order_id) {
                    *order = updated;
                }
                order.status = OrderStatus::Cancelled;
            }
        });
        Ok(())
    }

    /// Loaded orders for the signed-in user.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.read(|orders| orders.to_vec())
    }

    /// Message of the last failed load.
    #[must_use]
    pub fn load_error(&self) -> Option<String> {
        let current = self.current_owner();
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        if current.is_some() && state.owner == current {
            state.load_error.clone()
        } else {
            None
        }
    }

    /// Aggregates over the loaded list.
    #[must_use]
    pub fn summary(&self) -> OrderSummary {
        self.read(OrderSummary::from_orders)
    }

    /// Whether a cancellation of `order_id` is in flight.
    #[must_use]
    pub fn is_cancelling(&self, order_id: &OrderId) -> bool {
        self.inner
            .cancelling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(order_id)
    }

    fn local_status(&self, order_id: &OrderId) -> Option<OrderStatus> {
        self.read(|orders| {
            orders
                .iter()
                .find(|o| &o.id == order_id)
                .map(|o| o.status.clone())
        })
    }

    fn owner(&self) -> Result<UserId> {
        self.current_owner()
            .ok_or(ClientError::Auth(AuthError::NotAuthenticated))
    }

    fn current_owner(&self) -> Option<UserId> {
        self.inner.session.current_identity().map(|identity| identity.id)
    }

    fn read<T>(&self, f: impl FnOnce(&[Order]) -> T) -> T {
        let current = self.current_owner();
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        if current.is_some() && state.owner == current {
            f(&state.orders)
        } else {
            f(&[])
        }
    }

    fn write(&self, f: impl FnOnce(&mut OrderState)) {
        let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ClientConfig;
    use crate::models::LoginCredentials;
    use crate::session::{MemoryStore, NoopNavigator};

    fn order(id: &str, status: &str, total: u32) -> serde_json::Value {
        json!({"_id": id, "items": [], "totalAmount": total, "status": status})
    }

    async fn signed_in(server: &MockServer) -> SessionManager {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "token": "tok-1",
                "user": {"_id": "u1", "name": "Ana", "email": "ana@example.com"}
            })))
            .mount(server)
            .await;
        let config = ClientConfig::new(&format!("{}/api", server.uri())).unwrap();
        let session =
            SessionManager::new(&config, Arc::new(MemoryStore::new()), Arc::new(NoopNavigator))
                .unwrap();
        session
            .login(&LoginCredentials::new("ana@example.com", "pw"))
            .await
            .unwrap();
        session
    }

    async fn mount_list(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_summary_counts() {
        let orders: Vec<Order> = serde_json::from_value(json!([
            {"id": "1", "totalAmount": 10, "status": "delivered"},
            {"id": "2", "totalAmount": 20.5, "status": "pending"},
            {"id": "3", "totalAmount": 5, "status": "processing"},
            {"id": "4", "totalAmount": 7, "status": "cancelled"},
            {"id": "5", "totalAmount": 1, "status": "on_hold"}
        ]))
        .unwrap();
        let summary = OrderSummary::from_orders(&orders);
        assert_eq!(summary.total_orders, 5);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.in_progress, 2);
        assert_eq!(summary.total_spent, Money::from_cents(4350));
    }

    #[tokio::test]
    async fn test_list_accepts_data_envelope() {
        let server = MockServer::start().await;
        let session = signed_in(&server).await;
        mount_list(
            &server,
            json!({"success": true, "data": [order("o1", "pending", 10), order("o2", "shipped", 20)]}),
        )
        .await;

        let history = OrderHistory::new(session);
        let orders = history.list_orders().await.unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(history.orders()[1].status, OrderStatus::Shipped);
        assert_eq!(history.summary().total_spent, Money::from_units(30));
    }

    #[tokio::test]
    async fn test_list_failure_empties_and_records_error() {
        let server = MockServer::start().await;
        let session = signed_in(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/orders"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let history = OrderHistory::new(session);
        assert!(history.list_orders().await.is_err());
        assert!(history.orders().is_empty());
        assert!(history.load_error().is_some());
    }

    #[tokio::test]
    async fn test_cancel_shipped_is_refused_locally() {
        let server = MockServer::start().await;
        let session = signed_in(&server).await;
        mount_list(&server, json!([order("o1", "shipped", 10)])).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let history = OrderHistory::new(session);
        history.list_orders().await.unwrap();
        let err = history.cancel_order(&OrderId::new("o1")).await.unwrap_err();

        assert!(matches!(err, ClientError::Conflict { status: None, .. }));
        assert_eq!(history.orders()[0].status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_cancel_then_cancel_again() {
        let server = MockServer::start().await;
        let session = signed_in(&server).await;
        mount_list(&server, json!({"orders": [order("o1", "pending", 10)]})).await;
        Mock::given(method("PUT"))
            .and(path("/api/orders/o1/cancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "message": "Order cancelled"})))
            .expect(1)
            .mount(&server)
            .await;

        let history = OrderHistory::new(session);
        history.list_orders().await.unwrap();
        history.cancel_order(&OrderId::new("o1")).await.unwrap();
        assert_eq!(history.orders()[0].status, OrderStatus::Cancelled);

        let err = history.cancel_order(&OrderId::new("o1")).await.unwrap_err();
        assert!(matches!(err, ClientError::Conflict { .. }));
        assert_eq!(history.orders()[0].status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_backend_refusal_leaves_status() {
        let server = MockServer::start().await;
        let session = signed_in(&server).await;
        mount_list(&server, json!([order("o1", "processing", 10)])).await;
        Mock::given(method("PUT"))
            .and(path("/api/orders/o1/cancel"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Order already shipped"})),
            )
            .mount(&server)
            .await;

        let history = OrderHistory::new(session);
        history.list_orders().await.unwrap();
        let err = history.cancel_order(&OrderId::new("o1")).await.unwrap_err();

        assert_eq!(err.user_message(), "Order already shipped");
        assert_eq!(history.orders()[0].status, OrderStatus::Processing);
        assert!(!history.is_cancelling(&OrderId::new("o1")));
    }

    #[tokio::test]
    async fn test_concurrent_cancel_of_same_order_is_refused() {
        let server = MockServer::start().await;
        let session = signed_in(&server).await;
        mount_list(&server, json!([order("o1", "pending", 10)])).await;
        Mock::given(method("PUT"))
            .and(path("/api/orders/o1/cancel"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(order("o1", "cancelled", 10))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let history = OrderHistory::new(session);
        history.list_orders().await.unwrap();
        let id = OrderId::new("o1");
        let (first, second) = tokio::join!(history.cancel_order(&id), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            history.cancel_order(&id).await
        });

        first.unwrap();
        assert!(matches!(second.unwrap_err(), ClientError::Pending("order cancellation")));
    }

    #[tokio::test]
    async fn test_order_detail_replaces_local_copy() {
        let server = MockServer::start().await;
        let session = signed_in(&server).await;
        mount_list(&server, json!([order("o1", "pending", 10)])).await;
        Mock::given(method("GET"))
            .and(path("/api/orders/o1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order": order("o1", "shipped", 10)})))
            .mount(&server)
            .await;

        let history = OrderHistory::new(session);
        history.list_orders().await.unwrap();
        let fetched = history.order(&OrderId::new("o1")).await.unwrap();

        assert_eq!(fetched.status, OrderStatus::Shipped);
        assert_eq!(history.orders().len(), 1);
        assert_eq!(history.orders()[0].status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_logout_hides_orders() {
        let server = MockServer::start().await;
        let session = signed_in(&server).await;
        mount_list(&server, json!([order("o1", "pending", 10)])).await;

        let history = OrderHistory::new(session.clone());
        history.list_orders().await.unwrap();
        session.logout();

        assert!(history.orders().is_empty());
        assert_eq!(history.summary(), OrderSummary::default());
    }
}
