//! Gretta prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{
        CartAction, CartLine, CartState,
        persistence::{CART_STORAGE_KEY, CartPersistence},
        store::{CartStore, SubscriptionId},
    },
    orders::{
        CheckoutDetails, CheckoutForm, CreatedOrder, Customer, Delivery, DeliveryType,
        ExternalReference, Field, FieldError, GatewayPayment, Order, OrderDraft, OrderDraftParts,
        OrderId, OrderLineItem, OrderNumber, OrderStatus, PaymentMethod, ValidationErrors,
    },
    pricing::{OrderTotals, ShippingPolicy, format_price},
    products::{ProductId, ProductSnapshot},
    storage::{FileStore, KeyValueStore, MemoryStore, StorageError},
};
