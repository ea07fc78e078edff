//! Order repository errors.

use reqwest::StatusCode;
use thiserror::Error;

/// Order repository error variants.
#[derive(Debug, Error)]
pub enum OrderRepositoryError {
    /// Order was not found.
    #[error("order not found")]
    NotFound,

    /// An order with the same external reference already exists.
    #[error("order already exists")]
    AlreadyExists,

    /// The backend refused the credentials.
    #[error("backend rejected the credentials")]
    Unauthorized,

    /// The backend rejected the submitted data.
    #[error("invalid order data: {0}")]
    InvalidData(String),

    /// The requested status change skips a step or leaves a terminal status.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: gretta::orders::OrderStatus,

        /// Requested status
        to: gretta::orders::OrderStatus,
    },

    /// A stored row could not be turned into an order.
    #[error("invalid order record: {0}")]
    InvalidRecord(String),

    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend returned a non-2xx response not covered above.
    #[error("unexpected response from backend: {0}")]
    UnexpectedResponse(String),
}

impl OrderRepositoryError {
    /// Classify a non-success response.
    pub(crate) fn from_status(status: StatusCode, operation: &str, body: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::CONFLICT => Self::AlreadyExists,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Self::InvalidData(body.to_string())
            }
            _ => Self::UnexpectedResponse(format!(
                "{operation} failed with status {status}: {body}"
            )),
        }
    }
}
