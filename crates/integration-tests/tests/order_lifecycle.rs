//! Order history and cancellation against a stateful backend.

#![allow(clippy::unwrap_used)]

use mercado_core::{OrderStatus, ProductId, StatusBadge};
use mercado_integration_tests::{EMAIL, FakeBackend, PASSWORD};
use mercado_storefront::models::LoginCredentials;
use mercado_storefront::{CartManager, Checkout, ClientError, OrderHistory};
use secrecy::SecretString;

/// Sign in, buy one lamp and return the order history.
async fn one_order(backend: &FakeBackend) -> (OrderHistory, mercado_core::OrderId) {
    let (session, _) = backend.session();
    session
        .login(&LoginCredentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    let cart = CartManager::new(session.clone());
    cart.add_item(&ProductId::new("p-lamp"), 1).await.unwrap();

    let checkout = Checkout::begin(session.clone(), cart).unwrap();
    checkout.update_shipping(|s| {
        s.phone = "555-0100".to_string();
        s.address = "12 Harbour St".to_string();
        s.city = "Lisbon".to_string();
        s.postal_code = "1100-001".to_string();
    });
    checkout.continue_to_payment().unwrap();
    checkout.update_payment(|p| {
        p.card_number = SecretString::from("4111111111111111");
        p.card_name = "Ana Lima".to_string();
        p.expiry = "09/29".to_string();
        p.cvv = SecretString::from("321");
    });
    let order = checkout.place_order().await.unwrap();

    let history = OrderHistory::new(session);
    history.list_orders().await.unwrap();
    (history, order.id)
}

#[tokio::test]
async fn test_cancel_then_cancel_again() {
    let backend = FakeBackend::start().await;
    let (history, id) = one_order(&backend).await;

    history.cancel_order(&id).await.unwrap();
    assert_eq!(history.orders()[0].status, OrderStatus::Cancelled);
    assert_eq!(backend.orders()[0]["status"], "cancelled");

    let requests_before = backend.requests().len();
    let err = history.cancel_order(&id).await.unwrap_err();

    assert!(matches!(err, ClientError::Conflict { status: None, .. }));
    assert_eq!(history.orders()[0].status, OrderStatus::Cancelled);
    assert_eq!(backend.requests().len(), requests_before);
}

#[tokio::test]
async fn test_cancelling_shipped_order_is_refused() {
    let backend = FakeBackend::start().await;
    let (history, id) = one_order(&backend).await;
    backend.set_order_status(id.as_str(), "shipped");
    history.list_orders().await.unwrap();

    let err = history.cancel_order(&id).await.unwrap_err();

    assert!(matches!(err, ClientError::Conflict { .. }));
    assert_eq!(history.orders()[0].status, OrderStatus::Shipped);
    assert_eq!(backend.orders()[0]["status"], "shipped");
}

#[tokio::test]
async fn test_stale_local_status_is_refused_by_backend() {
    let backend = FakeBackend::start().await;
    let (history, id) = one_order(&backend).await;
    backend.set_order_status(id.as_str(), "delivered");

    let err = history.cancel_order(&id).await.unwrap_err();

    assert!(matches!(err, ClientError::Conflict { status: Some(400), .. }));
    assert_eq!(history.orders()[0].status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_unknown_status_is_shown_verbatim() {
    let backend = FakeBackend::start().await;
    let (history, id) = one_order(&backend).await;
    backend.set_order_status(id.as_str(), "on_hold");

    let order = history.order(&id).await.unwrap();

    assert_eq!(order.status, OrderStatus::Unknown("on_hold".to_string()));
    assert_eq!(order.status.label(), "on_hold");
    assert_eq!(order.status.badge(), StatusBadge::Neutral);
    assert_eq!(history.summary().in_progress, 0);
    assert_eq!(history.summary().total_orders, 1);
}
