//! Catalog products and the snapshots embedded in carts and orders.

use serde::{Deserialize, Serialize};

use mercado_core::{Money, ProductId};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

impl Product {
    /// Point-in-time snapshot for embedding in a cart or order line.
    #[must_use]
    pub fn snapshot(&self) -> ProductRef {
        ProductRef {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
            image: self.image.clone(),
            stock: self.stock,
        }
    }

    /// Whether any units are available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// A product as it was when a cart or order line captured it.
///
/// Later catalog changes do not reach an existing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub stock: u32,
}

/// Optional filters for the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

impl ProductFilter {
    /// Whether no filter is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.search.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    /// Query-string pairs for the listing endpoint. Blank strings are skipped.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(category) = self.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("category", category.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(min) = self.min_price {
            pairs.push(("minPrice", min.amount().to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice", max.amount().to_string()));
        }
        pairs
    }
}
