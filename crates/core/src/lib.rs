//! Mercado Core - Shared types library.
//!
//! This crate provides common types used across the Mercado components:
//! - `storefront` - Client-side session, cart, checkout and order core
//! - `integration-tests` - End-to-end behaviour tests
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
