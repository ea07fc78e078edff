//! Cart persistence
//!
//! The store knows nothing about storage. [`CartPersistence::attach`] subscribes a writer that
//! saves the full state after every dispatch, and [`CartPersistence::restore`] rebuilds a store
//! from what was saved.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    cart::{
        CartLine, CartState,
        store::{CartStore, SubscriptionId},
    },
    storage::{KeyValueStore, StorageError},
};

/// Storage key for the cart.
pub const CART_STORAGE_KEY: &str = "cart-storage";

/// Current persisted layout version.
pub const CART_STORAGE_VERSION: u32 = 1;

#[derive(Serialize)]
struct PersistedCartRef<'a> {
    state: &'a CartState,
    version: u32,
}

#[derive(Deserialize)]
struct PersistedCart {
    state: PersistedCartState,
    version: u32,
}

#[derive(Deserialize)]
struct PersistedCartState {
    lines: Vec<CartLine>,

    #[serde(default)]
    is_open: bool,
}

/// Reads and writes the cart under [`CART_STORAGE_KEY`].
#[derive(Debug, Clone)]
pub struct CartPersistence {
    storage: Arc<dyn KeyValueStore>,
}

impl CartPersistence {
    /// Persist to `storage`.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Load the saved cart.
    ///
    /// Missing, unreadable or unknown-version values yield an empty cart; a storage failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be read.
    pub fn load(&self) -> Result<CartState, StorageError> {
        let Some(raw) = self.storage.get(CART_STORAGE_KEY)? else {
            return Ok(CartState::new());
        };

        match serde_json::from_str::<PersistedCart>(&raw) {
            Ok(persisted) if persisted.version == CART_STORAGE_VERSION => Ok(CartState::from_parts(
                persisted.state.lines,
                persisted.state.is_open,
            )),
            Ok(persisted) => {
                warn!(
                    version = persisted.version,
                    "discarding cart saved with unknown version"
                );

                Ok(CartState::new())
            }
            Err(error) => {
                warn!(%error, "discarding unreadable saved cart");

                Ok(CartState::new())
            }
        }
    }

    /// Write `state`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the state cannot be encoded or the backend cannot be written.
    /// The previously saved value is left in place.
    pub fn save(&self, state: &CartState) -> Result<(), StorageError> {
        let envelope = PersistedCartRef {
            state,
            version: CART_STORAGE_VERSION,
        };

        let raw = serde_json::to_string(&envelope).map_err(|source| StorageError::Encode {
            key: CART_STORAGE_KEY.to_string(),
            source,
        })?;

        self.storage.set(CART_STORAGE_KEY, &raw)
    }

    /// Build a store from the saved cart and keep it saved.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be read.
    pub fn restore(&self) -> Result<CartStore, StorageError> {
        let mut store = CartStore::with_state(self.load()?);

        self.attach(&mut store);

        Ok(store)
    }

    /// Subscribe a writer to `store`. Write failures are logged; cart operations never fail.
    pub fn attach(&self, store: &mut CartStore) -> SubscriptionId {
        let persistence = self.clone();

        store.subscribe(move |state| {
            if let Err(error) = persistence.save(state) {
                warn!(%error, "failed to persist cart");
            }
        })
    }
}
