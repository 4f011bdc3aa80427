//! Orders as placed and as later reported by the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercado_core::{Money, OrderId, OrderStatus, ProductId};

use super::product::ProductRef;

/// The product of an order line.
///
/// Most responses embed the product snapshot; some list endpoints only carry
/// the product ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderProduct {
    Snapshot(ProductRef),
    Id(ProductId),
}

impl OrderProduct {
    /// Product ID, whichever shape the backend sent.
    #[must_use]
    pub const fn id(&self) -> &ProductId {
        match self {
            Self::Snapshot(product) => &product.id,
            Self::Id(id) => id,
        }
    }

    /// Product name, if the snapshot was embedded.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Snapshot(product) => Some(&product.name),
            Self::Id(_) => None,
        }
    }
}

/// One line of a placed order. `price` is the unit price at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: OrderProduct,
    pub quantity: u32,
    pub price: Money,
}

impl OrderLine {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }
}

/// Delivery address attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone: String,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: String,
    pub total_amount: Money,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Sum of line quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub items: Vec<NewOrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub total_amount: Money,
}

/// One line of a [`NewOrder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderLine {
    pub product: ProductId,
    pub quantity: u32,
    pub price: Money,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_with_embedded_products() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": "o1",
            "items": [
                {"product": {"id": "p1", "name": "Lamp", "price": 40}, "quantity": 2, "price": 35},
                {"product": "p2", "quantity": 1, "price": 10}
            ],
            "shippingAddress": {"fullName": "Ada", "address": "1 Loop", "city": "Oslo", "postalCode": "0150"},
            "paymentMethod": "credit_card",
            "totalAmount": 80,
            "status": "shipped",
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.items[0].product.name(), Some("Lamp"));
        assert_eq!(order.items[0].line_total(), Money::from_units(70));
        assert_eq!(order.items[1].product.id().as_str(), "p2");
        assert_eq!(order.shipping_address.phone, "");
        assert!(order.created_at.is_some());
    }

    #[test]
    fn test_order_missing_status_is_pending() {
        let order: Order =
            serde_json::from_str(r#"{"id":"o2","totalAmount":12.5}"#).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.items.is_empty());
    }

    #[test]
    fn test_new_order_serializes_camel_case() {
        let body = NewOrder {
            items: vec![NewOrderLine {
                product: ProductId::new("p1"),
                quantity: 2,
                price: Money::from_units(50),
            }],
            shipping_address: ShippingAddress {
                full_name: "Ada".to_string(),
                ..ShippingAddress::default()
            },
            payment_method: "credit_card".to_string(),
            total_amount: Money::from_units(100),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["shippingAddress"]["fullName"], "Ada");
        assert_eq!(json["items"][0]["product"], "p1");
        assert_eq!(json["totalAmount"], 100.0);
        assert_eq!(json["paymentMethod"], "credit_card");
    }
}
