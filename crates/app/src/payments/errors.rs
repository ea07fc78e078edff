//! Payment intent errors.

use thiserror::Error;

/// Errors raised while creating a payment intent.
#[derive(Debug, Error)]
pub enum PaymentIntentError {
    /// No gateway credentials are configured.
    #[error("payment gateway is not configured")]
    NotConfigured,

    /// The gateway refused the request.
    #[error("{message} (status {status})")]
    Rejected {
        /// HTTP status returned by the gateway
        status: u16,

        /// Explanation taken from the response or derived from the status
        message: String,
    },

    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a body that is missing required fields.
    #[error("unexpected response from gateway: {0}")]
    UnexpectedResponse(String),
}
