//! Checkout Config

use std::time::Duration;

use clap::Args;
use gretta::pricing::{DEFAULT_FREE_SHIPPING_THRESHOLD, DEFAULT_SHIPPING_FEE, ShippingPolicy};

/// Checkout pricing and network settings.
#[derive(Debug, Args)]
pub struct CheckoutConfig {
    /// Delivery fee, in whole pesos
    #[arg(long, env = "SHIPPING_FEE", default_value_t = DEFAULT_SHIPPING_FEE)]
    pub shipping_fee: u64,

    /// Subtotal at which delivery becomes free, in whole pesos
    #[arg(
        long,
        env = "FREE_SHIPPING_THRESHOLD",
        default_value_t = DEFAULT_FREE_SHIPPING_THRESHOLD
    )]
    pub free_shipping_threshold: u64,

    /// Upper bound for each call to the order backend or the gateway
    #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", default_value_t = 15_u64)]
    pub request_timeout_seconds: u64,
}

impl CheckoutConfig {
    /// Shipping policy built from the configured fee and threshold.
    #[must_use]
    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy {
            fee: self.shipping_fee,
            free_threshold: self.free_shipping_threshold,
        }
    }

    /// Network call timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
