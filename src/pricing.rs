//! Pricing
//!
//! Shipping policy and order totals. Amounts are whole currency units.

use rusty_money::{Money, iso};
use serde::{Deserialize, Serialize};

use crate::orders::DeliveryType;

/// Default delivery fee.
pub const DEFAULT_SHIPPING_FEE: u64 = 500;

/// Default subtotal at which delivery becomes free.
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: u64 = 5000;

/// Delivery fee and the subtotal that waives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    /// Flat delivery fee
    pub fee: u64,

    /// Subtotal at or above which delivery is free
    pub free_threshold: u64,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            fee: DEFAULT_SHIPPING_FEE,
            free_threshold: DEFAULT_FREE_SHIPPING_THRESHOLD,
        }
    }
}

impl ShippingPolicy {
    /// Shipping for an order: free for pickup or when the subtotal reaches the threshold.
    pub fn shipping_cost(&self, delivery: DeliveryType, subtotal: u64) -> u64 {
        match delivery {
            DeliveryType::Pickup => 0,
            DeliveryType::Delivery if subtotal >= self.free_threshold => 0,
            DeliveryType::Delivery => self.fee,
        }
    }

    /// How much more must be added before delivery is free.
    pub fn remaining_for_free_shipping(&self, subtotal: u64) -> u64 {
        self.free_threshold.saturating_sub(subtotal)
    }

    /// Totals for an order with the given subtotal.
    pub fn totals(&self, delivery: DeliveryType, subtotal: u64) -> OrderTotals {
        OrderTotals::new(subtotal, self.shipping_cost(delivery, subtotal))
    }
}

/// Subtotal and shipping. The total is always derived from these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    subtotal: u64,
    shipping_cost: u64,
}

impl OrderTotals {
    /// Totals from their two components.
    pub fn new(subtotal: u64, shipping_cost: u64) -> Self {
        Self {
            subtotal,
            shipping_cost,
        }
    }

    /// Sum of line prices.
    pub fn subtotal(&self) -> u64 {
        self.subtotal
    }

    /// Delivery charge.
    pub fn shipping_cost(&self) -> u64 {
        self.shipping_cost
    }

    /// `subtotal + shipping_cost`.
    pub fn total(&self) -> u64 {
        self.subtotal.saturating_add(self.shipping_cost)
    }
}

/// Render an amount as Argentine pesos.
pub fn format_price(amount: u64) -> String {
    let major = i64::try_from(amount).unwrap_or(i64::MAX);

    Money::from_major(major, iso::ARS).to_string()
}
