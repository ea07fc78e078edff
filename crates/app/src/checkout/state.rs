//! Checkout State

use gretta::orders::{CreatedOrder, ExternalReference};

/// Where a checkout currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckoutState {
    /// Form shown, waiting for a submission.
    #[default]
    Idle,

    /// Checking the submitted form.
    Validating,

    /// Saving a cash or bank-transfer order.
    DirectFlow,

    /// Opening a hosted payment.
    GatewayFlow,

    /// Customer sent to the hosted payment page.
    AwaitingPayment {
        /// Reference of the attempt
        external_reference: ExternalReference,
    },

    /// Order saved.
    Success(CreatedOrder),

    /// The last attempt failed; a new submission starts over.
    Failed,
}

impl CheckoutState {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::DirectFlow => "direct_flow",
            Self::GatewayFlow => "gateway_flow",
            Self::AwaitingPayment { .. } => "awaiting_payment",
            Self::Success(_) => "success",
            Self::Failed => "failed",
        }
    }

    /// Whether a network call is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Validating | Self::DirectFlow | Self::GatewayFlow)
    }
}
