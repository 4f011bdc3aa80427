//! Mercado storefront client library.
//!
//! Client-side state for a storefront talking to the Mercado commerce API:
//!
//! - [`session`] - credential and identity, persisted across restarts
//! - [`cart`] - the server-authoritative cart
//! - [`checkout`] - the shipping → payment → confirmed flow
//! - [`orders`] - order history and cancellation
//! - [`catalog`] - cached product listings
//!
//! All managers share one [`session::SessionManager`]; a 401 from any
//! authenticated endpoint signs the user out everywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod models;
pub mod orders;
pub mod session;
pub mod telemetry;

pub use cart::CartManager;
pub use catalog::Catalog;
pub use checkout::{Checkout, CheckoutStep, EntryRefusal, PaymentInfo, ShippingInfo};
pub use config::ClientConfig;
pub use error::{AuthError, ClientError, NetworkError, Result, ValidationError};
pub use orders::{OrderHistory, OrderSummary};
pub use session::SessionManager;
