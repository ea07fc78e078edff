//! Pending payment staging.
//!
//! Holds the order draft of the gateway attempt in flight while the customer is on the hosted
//! payment page. At most one draft is staged; each new attempt overwrites it. After an order is
//! finalized a completion record is kept so a repeated success return resolves to the same order.

use std::sync::Arc;

use gretta::{
    orders::{CreatedOrder, ExternalReference, OrderDraft},
    storage::{KeyValueStore, StorageError},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

/// Storage key of the staged draft.
pub const PENDING_ORDER_KEY: &str = "pending_order";

/// Storage key of the last completed gateway payment.
pub const COMPLETED_PAYMENT_KEY: &str = "completed_payment";

/// Staging failures.
#[derive(Debug, Error)]
pub enum StagingError {
    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A record could not be encoded.
    #[error("failed to encode staged record")]
    Encode(#[source] serde_json::Error),
}

/// A gateway attempt awaiting the customer's return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedPayment {
    /// Gateway intent the customer was sent to
    pub intent_id: String,

    /// Hosted page URL, kept so the customer can be sent back to it
    pub redirect_url: String,

    /// The draft to finalize on approval; always carries an external reference
    pub draft: OrderDraft,
}

impl StagedPayment {
    /// Reference of the attempt.
    pub fn external_reference(&self) -> Option<&ExternalReference> {
        self.draft.external_reference()
    }
}

/// A finalized gateway payment and the order it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPayment {
    /// Reference of the finalized attempt
    pub external_reference: ExternalReference,

    /// The order created for it
    pub order: CreatedOrder,
}

/// Durable staging area for gateway checkouts.
#[derive(Debug, Clone)]
pub struct PendingPaymentStaging {
    storage: Arc<dyn KeyValueStore>,
}

impl PendingPaymentStaging {
    /// Stage in `storage`.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Stage `payment`, replacing any previous attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`StagingError`] if the record cannot be written.
    pub fn stage(&self, payment: &StagedPayment) -> Result<(), StagingError> {
        self.write(PENDING_ORDER_KEY, payment)?;

        debug!(
            intent_id = %payment.intent_id,
            external_reference = ?payment.external_reference().map(ExternalReference::as_str),
            "staged gateway order"
        );

        Ok(())
    }

    /// The staged attempt, if any. An unreadable record is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StagingError`] if the backend cannot be read.
    pub fn load(&self) -> Result<Option<StagedPayment>, StagingError> {
        self.read(PENDING_ORDER_KEY)
    }

    /// Drop the staged attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`StagingError`] if the backend cannot be written.
    pub fn clear(&self) -> Result<(), StagingError> {
        self.storage.remove(PENDING_ORDER_KEY)?;

        debug!("cleared staged gateway order");

        Ok(())
    }

    /// Remember that `payment` was finalized.
    ///
    /// # Errors
    ///
    /// Returns a [`StagingError`] if the record cannot be written.
    pub fn record_completion(&self, payment: &CompletedPayment) -> Result<(), StagingError> {
        self.write(COMPLETED_PAYMENT_KEY, payment)
    }

    /// The last finalized payment, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StagingError`] if the backend cannot be read.
    pub fn completed(&self) -> Result<Option<CompletedPayment>, StagingError> {
        self.read(COMPLETED_PAYMENT_KEY)
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StagingError> {
        let raw = serde_json::to_string(value).map_err(StagingError::Encode)?;

        self.storage.set(key, &raw)?;

        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StagingError> {
        let Some(raw) = self.storage.get(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                warn!(key, %error, "ignoring unreadable staged record");

                Ok(None)
            }
        }
    }
}
