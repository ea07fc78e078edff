//! Orders
//!
//! An [`OrderDraft`] is the frozen, not-yet-persisted order assembled from a validated checkout
//! form and a cart snapshot. Once persisted by an order repository it becomes an [`Order`].

use std::fmt::{Display, Formatter, Result as FmtResult};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    cart::CartState,
    pricing::{OrderTotals, ShippingPolicy},
    products::ProductId,
    uuids::TypedUuid,
};

pub mod form;
pub mod status;

pub use form::{CheckoutDetails, CheckoutForm, Field, FieldError, ValidationErrors};
pub use status::OrderStatus;

/// How the customer receives the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    /// Collected at the shop
    Pickup,

    /// Delivered to an address
    Delivery,
}

impl DeliveryType {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on pickup or delivery
    Cash,

    /// Bank transfer
    BankTransfer,

    /// Hosted payment gateway
    Gateway,
}

impl PaymentMethod {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Gateway => "gateway",
        }
    }

    /// Whether this method goes through the hosted gateway redirect.
    pub fn is_gateway(self) -> bool {
        matches!(self, Self::Gateway)
    }
}

/// Customer contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Full name
    pub name: String,

    /// Phone number
    pub phone: String,

    /// Email address, when given
    #[serde(default)]
    pub email: Option<String>,
}

/// Delivery details. Address and note only exist for deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delivery {
    /// Collected at the shop
    Pickup,

    /// Delivered to `address`
    Delivery {
        /// Street address
        address: String,

        /// Reference for the courier, e.g. "blue door"
        #[serde(default)]
        note: Option<String>,
    },
}

impl Delivery {
    /// The delivery type.
    pub fn delivery_type(&self) -> DeliveryType {
        match self {
            Self::Pickup => DeliveryType::Pickup,
            Self::Delivery { .. } => DeliveryType::Delivery,
        }
    }

    /// Street address, for deliveries.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Pickup => None,
            Self::Delivery { address, .. } => Some(address),
        }
    }

    /// Courier note, for deliveries.
    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Pickup => None,
            Self::Delivery { note, .. } => note.as_deref(),
        }
    }
}

/// One ordered product, copied from the cart at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    /// Catalog product
    pub product_id: ProductId,

    /// Product name at submission time
    pub name: String,

    /// Units ordered
    pub quantity: u32,

    /// Unit price at submission time
    pub unit_price: u64,
}

impl OrderLineItem {
    /// `quantity * unit_price`.
    pub fn line_total(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }
}

/// Gateway payment attached to a draft once the gateway approves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    /// Gateway-assigned payment identifier
    pub payment_id: String,

    /// Gateway merchant order, when reported
    #[serde(default)]
    pub merchant_order_id: Option<String>,
}

/// Token correlating a payment intent with the order it eventually becomes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalReference(String);

impl ExternalReference {
    /// A fresh, time-ordered reference.
    pub fn generate() -> Self {
        Self(format!("GRT-{}", Uuid::now_v7().simple()))
    }

    /// Wrap a reference received from the gateway.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ExternalReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Stored fields of a draft, for repositories rebuilding one.
#[derive(Debug, Clone)]
pub struct OrderDraftParts {
    /// Customer details
    pub customer: Customer,

    /// Ordered products
    pub line_items: Vec<OrderLineItem>,

    /// Delivery details
    pub delivery: Delivery,

    /// Payment method
    pub payment_method: PaymentMethod,

    /// Free-text notes
    pub notes: Option<String>,

    /// Delivery charge
    pub shipping_cost: u64,

    /// Gateway attempt reference
    pub external_reference: Option<ExternalReference>,

    /// Approved gateway payment
    pub gateway_payment: Option<GatewayPayment>,
}

/// A fully assembled order that has not been persisted.
///
/// Deserialization goes through [`OrderDraft::from_parts`], so a stored subtotal is never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredDraft")]
pub struct OrderDraft {
    customer: Customer,
    line_items: Vec<OrderLineItem>,
    delivery: Delivery,
    payment_method: PaymentMethod,
    #[serde(default)]
    notes: Option<String>,
    totals: OrderTotals,
    #[serde(default)]
    external_reference: Option<ExternalReference>,
    #[serde(default)]
    gateway_payment: Option<GatewayPayment>,
}

/// Serialized shape of an [`OrderDraft`].
#[derive(Deserialize)]
struct StoredDraft {
    customer: Customer,
    line_items: Vec<OrderLineItem>,
    delivery: Delivery,
    payment_method: PaymentMethod,
    #[serde(default)]
    notes: Option<String>,
    totals: OrderTotals,
    #[serde(default)]
    external_reference: Option<ExternalReference>,
    #[serde(default)]
    gateway_payment: Option<GatewayPayment>,
}

impl From<StoredDraft> for OrderDraft {
    fn from(stored: StoredDraft) -> Self {
        Self::from_parts(OrderDraftParts {
            customer: stored.customer,
            line_items: stored.line_items,
            delivery: stored.delivery,
            payment_method: stored.payment_method,
            notes: stored.notes,
            shipping_cost: stored.totals.shipping_cost(),
            external_reference: stored.external_reference,
            gateway_payment: stored.gateway_payment,
        })
    }
}

impl OrderDraft {
    /// Build a draft from validated checkout details and the current cart.
    ///
    /// The cart lines are copied, so later cart changes do not reach the draft.
    pub fn from_checkout(
        details: CheckoutDetails,
        cart: &CartState,
        policy: &ShippingPolicy,
    ) -> Self {
        let line_items: Vec<OrderLineItem> = cart
            .lines()
            .iter()
            .map(|line| OrderLineItem {
                product_id: line.product.id,
                name: line.product.name.clone(),
                quantity: line.quantity.get(),
                unit_price: line.product.price,
            })
            .collect();

        let subtotal = line_items
            .iter()
            .map(OrderLineItem::line_total)
            .fold(0, u64::saturating_add);

        let totals = policy.totals(details.delivery.delivery_type(), subtotal);

        Self {
            customer: details.customer,
            line_items,
            delivery: details.delivery,
            payment_method: details.payment_method,
            notes: details.notes,
            totals,
            external_reference: None,
            gateway_payment: None,
        }
    }

    /// Rebuild a draft read back from storage. The subtotal is recomputed from the line items.
    pub fn from_parts(parts: OrderDraftParts) -> Self {
        let subtotal = parts
            .line_items
            .iter()
            .map(OrderLineItem::line_total)
            .fold(0, u64::saturating_add);

        Self {
            customer: parts.customer,
            line_items: parts.line_items,
            delivery: parts.delivery,
            payment_method: parts.payment_method,
            notes: parts.notes,
            totals: OrderTotals::new(subtotal, parts.shipping_cost),
            external_reference: parts.external_reference,
            gateway_payment: parts.gateway_payment,
        }
    }

    /// Tag the draft with the reference of the gateway attempt it belongs to.
    #[must_use]
    pub fn with_external_reference(mut self, reference: ExternalReference) -> Self {
        self.external_reference = Some(reference);
        self
    }

    /// Attach an approved gateway payment.
    #[must_use]
    pub fn with_gateway_payment(mut self, payment: GatewayPayment) -> Self {
        self.gateway_payment = Some(payment);
        self
    }

    /// Customer details.
    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    /// Ordered products.
    pub fn line_items(&self) -> &[OrderLineItem] {
        &self.line_items
    }

    /// Delivery details.
    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    /// Delivery type.
    pub fn delivery_type(&self) -> DeliveryType {
        self.delivery.delivery_type()
    }

    /// Payment method.
    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    /// Free-text notes.
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Subtotal and shipping.
    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    /// Sum of line totals.
    pub fn subtotal(&self) -> u64 {
        self.totals.subtotal()
    }

    /// Delivery charge.
    pub fn shipping_cost(&self) -> u64 {
        self.totals.shipping_cost()
    }

    /// `subtotal + shipping_cost`.
    pub fn total(&self) -> u64 {
        self.totals.total()
    }

    /// Gateway attempt reference, for gateway orders.
    pub fn external_reference(&self) -> Option<&ExternalReference> {
        self.external_reference.as_ref()
    }

    /// Approved gateway payment, once attached.
    pub fn gateway_payment(&self) -> Option<&GatewayPayment> {
        self.gateway_payment.as_ref()
    }

    /// Whether payment has been collected.
    pub fn is_paid(&self) -> bool {
        self.gateway_payment.is_some()
    }

    /// New orders always start pending.
    pub fn status(&self) -> OrderStatus {
        OrderStatus::Pending
    }
}

/// Persisted order identifier.
pub type OrderId = TypedUuid<Order>;

/// Human-facing order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(pub u64);

impl Display for OrderNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{:05}", self.0)
    }
}

/// Identifiers assigned when an order is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedOrder {
    /// Storage identifier
    pub id: OrderId,

    /// Human-facing number
    pub number: OrderNumber,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Storage identifier
    pub id: OrderId,

    /// Human-facing number
    pub number: OrderNumber,

    /// Current status
    pub status: OrderStatus,

    /// The order contents as submitted
    pub draft: OrderDraft,

    /// When the backend recorded the order, if it reports it
    pub placed_at: Option<Timestamp>,
}

impl Order {
    /// The identifiers of this order.
    pub fn created(&self) -> CreatedOrder {
        CreatedOrder {
            id: self.id,
            number: self.number,
        }
    }
}
