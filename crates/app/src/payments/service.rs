//! Payment intent service.

use async_trait::async_trait;
use gretta::orders::{DeliveryType, ExternalReference, OrderDraft};
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::payments::errors::PaymentIntentError;

/// Title of the synthetic line that carries the delivery fee.
pub const SHIPPING_LINE_TITLE: &str = "Envío a domicilio";

/// One line of a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentLineItem {
    /// Line title shown on the gateway page
    pub title: String,

    /// Units
    pub quantity: u32,

    /// Price per unit, whole pesos
    pub unit_price: u64,
}

/// Who is paying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payer {
    /// Full name
    pub name: String,

    /// Email, when the customer gave one
    pub email: Option<String>,

    /// Phone as entered
    pub phone: String,
}

/// Where the gateway sends the customer back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackUrls {
    /// Approved payments
    pub success: String,

    /// Rejected payments
    pub failure: String,

    /// Payments awaiting an offline step
    pub pending: String,
}

impl CallbackUrls {
    /// The three checkout return routes under `base_url`.
    pub fn for_app(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');

        Self {
            success: format!("{base}/checkout/success"),
            failure: format!("{base}/checkout/failure"),
            pending: format!("{base}/checkout/pending"),
        }
    }
}

/// Order context stored with the intent so the gateway dashboard shows who ordered what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMetadata {
    /// Customer name
    pub customer_name: String,

    /// Customer phone
    pub customer_phone: String,

    /// Pickup or delivery
    pub delivery_type: DeliveryType,

    /// Delivery address, empty for pickup
    pub address: String,

    /// Order notes, possibly empty
    pub notes: String,
}

/// Everything needed to open a hosted payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    /// Products, plus shipping when charged
    pub line_items: Vec<IntentLineItem>,

    /// Who is paying
    pub payer: Payer,

    /// Return routes
    pub callback_urls: CallbackUrls,

    /// Token tying the eventual payment back to this attempt
    pub external_reference: ExternalReference,

    /// Order context
    pub metadata: IntentMetadata,
}

impl PaymentIntentRequest {
    /// Build the intent for `draft`. Shipping becomes its own line when it is charged.
    pub fn from_draft(
        draft: &OrderDraft,
        external_reference: ExternalReference,
        callback_urls: CallbackUrls,
    ) -> Self {
        let mut line_items: Vec<IntentLineItem> = draft
            .line_items()
            .iter()
            .map(|item| IntentLineItem {
                title: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        if draft.shipping_cost() > 0 {
            line_items.push(IntentLineItem {
                title: SHIPPING_LINE_TITLE.to_string(),
                quantity: 1,
                unit_price: draft.shipping_cost(),
            });
        }

        let customer = draft.customer();

        Self {
            line_items,
            payer: Payer {
                name: customer.name.clone(),
                email: customer.email.clone(),
                phone: customer.phone.clone(),
            },
            callback_urls,
            external_reference,
            metadata: IntentMetadata {
                customer_name: customer.name.clone(),
                customer_phone: customer.phone.clone(),
                delivery_type: draft.delivery_type(),
                address: draft.delivery().address().unwrap_or_default().to_string(),
                notes: draft.notes().unwrap_or_default().to_string(),
            },
        }
    }

    /// Sum of all lines, shipping included.
    pub fn total(&self) -> u64 {
        self.line_items
            .iter()
            .map(|item| item.unit_price.saturating_mul(u64::from(item.quantity)))
            .fold(0, u64::saturating_add)
    }
}

/// A created hosted payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Gateway identifier of the intent
    pub intent_id: String,

    /// Hosted page the customer is sent to
    pub redirect_url: String,
}

#[automock]
#[async_trait]
pub trait PaymentIntentService: Send + Sync {
    /// Open a hosted payment for `request`.
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentIntentError>;
}

/// Stand-in used when no gateway credentials are configured. Every attempt fails with
/// [`PaymentIntentError::NotConfigured`], so cash and transfer checkout keep working.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentIntentService for UnconfiguredGateway {
    async fn create_payment_intent(
        &self,
        _request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentIntentError> {
        Err(PaymentIntentError::NotConfigured)
    }
}
