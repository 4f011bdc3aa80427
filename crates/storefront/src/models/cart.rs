//! Server-authoritative cart.

use serde::{Deserialize, Deserializer, Serialize};

use mercado_core::{Money, ProductId};

use super::product::ProductRef;

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: ProductRef,
    pub quantity: u32,
}

impl CartLine {
    /// `price × quantity` for display.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.product.price.times(self.quantity)
    }
}

/// The cart as the backend last reported it.
///
/// `total_items` and `total_price` are the server's figures. Lines never carry
/// a zero quantity: any such line in a payload is dropped while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub total_items: u32,
    pub total_price: Money,
}

impl Cart {
    /// A cart without lines.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_items: 0,
            total_price: Money::ZERO,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Line for `product_id`, if present.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.items.iter().find(|line| &line.product.id == product_id)
    }

    /// Display-only recomputation of the subtotal from the lines.
    ///
    /// Never submitted to the backend; [`Cart::total_price`] is.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartLine::line_total).sum()
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartPayload {
    #[serde(default)]
    items: Vec<CartLine>,
    total_items: Option<u32>,
    total_price: Option<Money>,
}

impl<'de> Deserialize<'de> for Cart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = CartPayload::deserialize(deserializer)?;

        let (items, dropped): (Vec<_>, Vec<_>) =
            payload.items.into_iter().partition(|line| line.quantity > 0);
        for line in &dropped {
            tracing::warn!(product_id = %line.product.id, "Dropping zero-quantity cart line");
        }

        // Older backends omit the totals on some responses.
        let total_items = payload
            .total_items
            .unwrap_or_else(|| items.iter().map(|line| line.quantity).sum());
        let total_price = payload
            .total_price
            .unwrap_or_else(|| items.iter().map(CartLine::line_total).sum());

        Ok(Self {
            items,
            total_items,
            total_price,
        })
    }
}
