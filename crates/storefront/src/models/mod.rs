//! Domain models for the storefront client.
//!
//! These types are what the managers hold and hand out. They deserialize
//! from the backend's JSON after [`crate::api`] has normalized document ids,
//! and serialize in the same camelCase shape so an application shell can
//! persist or forward them.

pub mod cart;
pub mod identity;
pub mod order;
pub mod product;

pub use cart::{Cart, CartLine};
pub use identity::{Identity, LoginCredentials, RegistrationProfile};
pub use order::{NewOrder, NewOrderLine, Order, OrderLine, OrderProduct, ShippingAddress};
pub use product::{Product, ProductFilter, ProductRef};
