//! Gretta
//!
//! Cart state and order-draft core for the Gretta storefront: a persisted shopping cart, shipping
//! and totals, checkout form validation and the order draft handed to checkout.

pub mod cart;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod products;
pub mod storage;
pub mod uuids;
