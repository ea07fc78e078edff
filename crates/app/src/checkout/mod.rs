//! Checkout

pub mod errors;
pub mod orchestrator;
pub mod staging;
pub mod state;

pub use errors::{CheckoutError, Operation, ReconciliationError};
pub use orchestrator::{
    CheckoutOrchestrator, CheckoutOutcome, GatewayRedirect, PaymentFailure, PaymentPending,
    SharedCart,
};
pub use staging::{CompletedPayment, PendingPaymentStaging, StagedPayment, StagingError};
pub use state::CheckoutState;
