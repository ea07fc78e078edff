//! Order Records
//!
//! Row shapes of the hosted `orders` and `order_items` tables.

use gretta::{
    orders::{
        Customer, Delivery, DeliveryType, ExternalReference, GatewayPayment, Order, OrderDraft,
        OrderDraftParts, OrderId, OrderLineItem, OrderNumber, OrderStatus, PaymentMethod,
    },
    products::ProductId,
};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::orders::errors::OrderRepositoryError;

/// Order row as inserted. Identifier and number are assigned by the database.
#[derive(Debug, Serialize)]
pub(crate) struct NewOrderRecord<'a> {
    pub status: OrderStatus,
    pub customer_name: &'a str,
    pub customer_phone: &'a str,
    pub customer_email: Option<&'a str>,
    pub delivery_type: DeliveryType,
    pub delivery_address: Option<&'a str>,
    pub delivery_note: Option<&'a str>,
    pub payment_method: PaymentMethod,
    pub notes: Option<&'a str>,
    pub subtotal: u64,
    pub shipping_cost: u64,
    pub total: u64,
    pub paid: bool,
    pub external_reference: Option<&'a str>,
    pub mp_payment_id: Option<&'a str>,
    pub mp_merchant_order_id: Option<&'a str>,
}

impl<'a> From<&'a OrderDraft> for NewOrderRecord<'a> {
    fn from(draft: &'a OrderDraft) -> Self {
        let customer = draft.customer();
        let payment = draft.gateway_payment();

        Self {
            status: draft.status(),
            customer_name: &customer.name,
            customer_phone: &customer.phone,
            customer_email: customer.email.as_deref(),
            delivery_type: draft.delivery_type(),
            delivery_address: draft.delivery().address(),
            delivery_note: draft.delivery().note(),
            payment_method: draft.payment_method(),
            notes: draft.notes(),
            subtotal: draft.subtotal(),
            shipping_cost: draft.shipping_cost(),
            total: draft.total(),
            paid: draft.is_paid(),
            external_reference: draft.external_reference().map(ExternalReference::as_str),
            mp_payment_id: payment.map(|payment| payment.payment_id.as_str()),
            mp_merchant_order_id: payment.and_then(|payment| payment.merchant_order_id.as_deref()),
        }
    }
}

/// Order item row as inserted.
#[derive(Debug, Serialize)]
pub(crate) struct NewOrderItemRecord<'a> {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: &'a str,
    pub quantity: u32,
    pub unit_price: u64,
    pub subtotal: u64,
}

impl<'a> NewOrderItemRecord<'a> {
    pub(crate) fn for_order(order_id: OrderId, item: &'a OrderLineItem) -> Self {
        Self {
            order_id,
            product_id: item.product_id,
            product_name: &item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            subtotal: item.line_total(),
        }
    }
}

/// Order row as read back, optionally with its embedded items.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OrderRecord {
    pub id: OrderId,
    pub order_number: u64,
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub delivery_note: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
    pub shipping_cost: u64,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub mp_payment_id: Option<String>,
    #[serde(default)]
    pub mp_merchant_order_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub order_items: Vec<OrderItemRecord>,
}

/// Order item row as read back.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OrderItemRecord {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: u64,
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderRepositoryError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let delivery = match record.delivery_type {
            DeliveryType::Pickup => Delivery::Pickup,
            DeliveryType::Delivery => Delivery::Delivery {
                address: record.delivery_address.ok_or_else(|| {
                    OrderRepositoryError::InvalidRecord(format!(
                        "delivery order {} has no address",
                        record.order_number
                    ))
                })?,
                note: record.delivery_note,
            },
        };

        let line_items = record
            .order_items
            .into_iter()
            .map(|item| OrderLineItem {
                product_id: item.product_id,
                name: item.product_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let gateway_payment = record.mp_payment_id.map(|payment_id| GatewayPayment {
            payment_id,
            merchant_order_id: record.mp_merchant_order_id,
        });

        let draft = OrderDraft::from_parts(OrderDraftParts {
            customer: Customer {
                name: record.customer_name,
                phone: record.customer_phone,
                email: record.customer_email,
            },
            line_items,
            delivery,
            payment_method: record.payment_method,
            notes: record.notes,
            shipping_cost: record.shipping_cost,
            external_reference: record.external_reference.map(ExternalReference::new),
            gateway_payment,
        });

        Ok(Self {
            id: record.id,
            number: OrderNumber(record.order_number),
            status: record.status,
            draft,
            placed_at: record.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    fn row(delivery: serde_json::Value) -> serde_json::Value {
        let mut row = json!({
            "id": "01890a5d-ac96-774b-bcce-b302099a8057",
            "order_number": 42,
            "status": "preparing",
            "customer_name": "Ana Gómez",
            "customer_phone": "3511234567",
            "customer_email": null,
            "payment_method": "cash",
            "notes": null,
            "subtotal": 3000,
            "shipping_cost": 500,
            "total": 3500,
            "paid": false,
            "created_at": "2026-10-19T12:00:00Z",
            "order_items": [
                {
                    "product_id": "01890a5d-ac96-774b-bcce-b302099a8058",
                    "product_name": "Alfajor",
                    "quantity": 3,
                    "unit_price": 1000,
                    "subtotal": 3000
                }
            ]
        });

        if let (Some(row), Some(delivery)) = (row.as_object_mut(), delivery.as_object()) {
            row.extend(delivery.clone());
        }

        row
    }

    #[test]
    fn delivery_row_becomes_order() -> TestResult {
        let record: OrderRecord = serde_json::from_value(row(json!({
            "delivery_type": "delivery",
            "delivery_address": "Av. Colón 1234, Córdoba",
            "delivery_note": "portón verde"
        })))?;

        let order = Order::try_from(record)?;

        assert_eq!(order.number, OrderNumber(42));
        assert_eq!(order.status, OrderStatus::Preparing);
        assert_eq!(order.draft.delivery().address(), Some("Av. Colón 1234, Córdoba"));
        assert_eq!(order.draft.subtotal(), 3000);
        assert_eq!(order.draft.total(), 3500);
        assert!(!order.draft.is_paid());
        assert_eq!(
            order.placed_at,
            Some("2026-10-19T12:00:00Z".parse::<Timestamp>()?)
        );

        Ok(())
    }

    #[test]
    fn delivery_row_without_address_is_rejected() -> TestResult {
        let record: OrderRecord = serde_json::from_value(row(json!({
            "delivery_type": "delivery"
        })))?;

        let result = Order::try_from(record);

        assert!(
            matches!(result, Err(OrderRepositoryError::InvalidRecord(_))),
            "expected InvalidRecord, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn gateway_columns_become_payment() -> TestResult {
        let record: OrderRecord = serde_json::from_value(row(json!({
            "delivery_type": "pickup",
            "payment_method": "gateway",
            "paid": true,
            "external_reference": "GRT-abc",
            "mp_payment_id": "1234567890",
            "mp_merchant_order_id": "987"
        })))?;

        let order = Order::try_from(record)?;

        assert!(order.draft.is_paid());
        assert_eq!(
            order.draft.external_reference().map(ExternalReference::as_str),
            Some("GRT-abc")
        );
        assert_eq!(
            order
                .draft
                .gateway_payment()
                .and_then(|payment| payment.merchant_order_id.as_deref()),
            Some("987")
        );

        Ok(())
    }
}
