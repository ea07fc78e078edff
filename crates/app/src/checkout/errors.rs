//! Checkout errors.

use std::fmt::{Display, Formatter, Result as FmtResult};

use gretta::orders::{ExternalReference, PaymentMethod, ValidationErrors};
use thiserror::Error;

use crate::{
    checkout::staging::StagingError, orders::OrderRepositoryError, payments::PaymentIntentError,
};

/// Network call guarded by the checkout timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Opening a hosted payment
    CreatePaymentIntent,

    /// Persisting the order
    CreateOrder,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::CreatePaymentIntent => "creating the payment",
            Self::CreateOrder => "saving the order",
        })
    }
}

/// A gateway return that cannot be matched to a staged draft.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconciliationError {
    /// Nothing is staged and no completed payment matches.
    #[error("no staged order found for this payment")]
    DraftNotFound,

    /// The return belongs to a different attempt than the one staged.
    #[error("payment {received} does not match the staged order {staged}")]
    ReferenceMismatch {
        /// Reference of the staged draft
        staged: ExternalReference,

        /// Reference reported by the gateway
        received: ExternalReference,
    },

    /// The gateway approved without reporting a payment identifier.
    #[error("approved payment has no payment id")]
    MissingPaymentId,
}

/// Every way a checkout can fail.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The form has invalid fields.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// There is nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// Another submission is still waiting on the network.
    #[error("a submission is already in progress")]
    SubmissionInProgress,

    /// The hosted payment could not be opened.
    #[error("failed to create payment intent")]
    IntentCreation(#[source] PaymentIntentError),

    /// The order could not be saved.
    #[error("failed to save order")]
    OrderPersist {
        /// How the customer was paying
        payment_method: PaymentMethod,

        /// Backend failure
        #[source]
        source: OrderRepositoryError,
    },

    /// The gateway reported a status other than approved.
    #[error("payment not approved (status {status})")]
    PaymentNotApproved {
        /// Status reported by the gateway
        status: String,

        /// Customer-facing explanation
        reason: &'static str,
    },

    /// A gateway return could not be matched to a staged draft.
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    /// A network call did not finish in time.
    #[error("timed out {operation}")]
    Timeout {
        /// The call that timed out
        operation: Operation,
    },

    /// Durable checkout storage failed.
    #[error("checkout storage failed")]
    Staging(#[from] StagingError),
}

impl CheckoutError {
    /// Whether submitting again may succeed without changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IntentCreation(_)
                | Self::OrderPersist { .. }
                | Self::Timeout { .. }
                | Self::SubmissionInProgress
                | Self::Staging(_)
        )
    }

    /// Actionable message for the customer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(errors) => format!("Please correct the form: {errors}"),
            Self::EmptyCart => "Your cart is empty. Add some products first.".to_string(),
            Self::SubmissionInProgress => {
                "Your order is being processed, please wait a moment.".to_string()
            }
            Self::IntentCreation(_) => {
                "We could not start the payment. Please try again.".to_string()
            }
            Self::OrderPersist {
                payment_method: PaymentMethod::Gateway,
                ..
            } => "We could not save your order. Your payment is safe; retrying will not charge \
                  you again."
                .to_string(),
            Self::OrderPersist { .. } => {
                "We could not save your order. Please try again.".to_string()
            }
            Self::PaymentNotApproved { reason, .. } => {
                format!("Your payment was not approved: {reason}. You can retry or cancel.")
            }
            Self::Reconciliation(_) => {
                "We could not find your order details. If you were charged, please contact us \
                 with your payment receipt."
                    .to_string()
            }
            Self::Timeout { operation } => {
                format!("The service took too long while {operation}. Please try again.")
            }
            Self::Staging(_) => {
                "We could not store your checkout progress. Please try again.".to_string()
            }
        }
    }
}
