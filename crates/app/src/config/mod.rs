//! Application configuration
//!
//! Every setting can be given as a flag or through the environment; a `.env` file in the working
//! directory is loaded first.

use clap::Args;

use crate::config::{
    backend::BackendConfig, checkout::CheckoutConfig, gateway::GatewayConfig,
    logging::LoggingConfig, storage::StorageConfig,
};

pub mod backend;
pub mod checkout;
pub mod gateway;
pub mod logging;
pub mod storage;

/// All application settings, grouped by concern.
#[derive(Debug, Args)]
pub struct AppConfig {
    /// Local state directory.
    #[command(flatten)]
    pub storage: StorageConfig,

    /// Hosted database.
    #[command(flatten)]
    pub backend: BackendConfig,

    /// Hosted payment gateway.
    #[command(flatten)]
    pub gateway: GatewayConfig,

    /// Pricing and timeouts.
    #[command(flatten)]
    pub checkout: CheckoutConfig,

    /// Logging output.
    #[command(flatten)]
    pub logging: LoggingConfig,
}
