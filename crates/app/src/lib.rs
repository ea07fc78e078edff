//! Gretta storefront services: order backend and payment gateway clients, checkout orchestration
//! and application wiring.

pub mod checkout;
pub mod config;
pub mod context;
pub mod observability;
pub mod orders;
pub mod payments;

#[cfg(test)]
mod test;
