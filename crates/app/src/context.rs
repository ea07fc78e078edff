//! App Context

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use gretta::{
    cart::persistence::CartPersistence,
    pricing::ShippingPolicy,
    storage::{FileStore, KeyValueStore, StorageError},
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    checkout::{CheckoutOrchestrator, PendingPaymentStaging, SharedCart},
    config::AppConfig,
    orders::{OrderRepository, SupabaseConfig, SupabaseOrderRepository},
    payments::{
        CallbackUrls, MercadoPagoClient, MercadoPagoConfig, PaymentIntentService,
        UnconfiguredGateway,
    },
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to open local storage")]
    Storage(#[from] StorageError),

    #[error("{0} is not set")]
    MissingSetting(&'static str),
}

/// Services shared by every command.
#[derive(Clone)]
pub struct AppContext {
    pub cart: SharedCart,
    pub staging: PendingPaymentStaging,
    pub payments: Arc<dyn PaymentIntentService>,
    orders: Option<Arc<dyn OrderRepository>>,
    callback_urls: CallbackUrls,
    policy: ShippingPolicy,
    request_timeout: Duration,
}

impl AppContext {
    /// Open local storage, restore the cart and build the configured clients.
    ///
    /// # Errors
    ///
    /// Returns an error when the data directory cannot be opened or read.
    pub fn open(config: &AppConfig) -> Result<Self, AppInitError> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.storage.data_dir)?);

        let cart = CartPersistence::new(storage.clone()).restore()?;

        debug!(
            data_dir = %config.storage.data_dir.display(),
            lines = cart.get_state().line_count(),
            "restored cart"
        );

        let orders = match (
            &config.backend.supabase_url,
            &config.backend.supabase_anon_key,
        ) {
            (Some(url), Some(anon_key)) => {
                let repository: Arc<dyn OrderRepository> =
                    Arc::new(SupabaseOrderRepository::new(SupabaseConfig {
                        url: url.clone(),
                        anon_key: anon_key.clone(),
                    }));

                Some(repository)
            }
            _ => None,
        };

        let payments: Arc<dyn PaymentIntentService> = match &config.gateway.mp_access_token {
            Some(access_token) => Arc::new(MercadoPagoClient::new(MercadoPagoConfig {
                api_url: config.gateway.mp_api_url.clone(),
                access_token: access_token.clone(),
                statement_descriptor: config.gateway.statement_descriptor.clone(),
                sandbox: config.gateway.gateway_sandbox,
            })),
            None => {
                info!("MP_ACCESS_TOKEN not set; gateway checkout disabled");

                Arc::new(UnconfiguredGateway)
            }
        };

        Ok(Self {
            cart: Arc::new(Mutex::new(cart)),
            staging: PendingPaymentStaging::new(storage),
            payments,
            orders,
            callback_urls: CallbackUrls::for_app(&config.gateway.app_url),
            policy: config.checkout.shipping_policy(),
            request_timeout: config.checkout.request_timeout(),
        })
    }

    /// Shipping policy in effect.
    pub fn policy(&self) -> ShippingPolicy {
        self.policy
    }

    /// The order backend.
    ///
    /// # Errors
    ///
    /// Returns [`AppInitError::MissingSetting`] when the backend is not configured.
    pub fn orders(&self) -> Result<Arc<dyn OrderRepository>, AppInitError> {
        self.orders
            .clone()
            .ok_or(AppInitError::MissingSetting("SUPABASE_URL and SUPABASE_ANON_KEY"))
    }

    /// A checkout over the shared cart.
    ///
    /// # Errors
    ///
    /// Returns [`AppInitError::MissingSetting`] when the order backend is not configured.
    pub fn checkout(&self) -> Result<CheckoutOrchestrator, AppInitError> {
        Ok(CheckoutOrchestrator::new(
            self.cart.clone(),
            self.orders()?,
            self.payments.clone(),
            self.staging.clone(),
            self.callback_urls.clone(),
        )
        .with_shipping_policy(self.policy)
        .with_timeout(self.request_timeout))
    }
}
