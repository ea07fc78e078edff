//! Supabase order repository.
//!
//! Orders live in the hosted `orders` table with their lines in `order_items`, both reached
//! through the project's REST interface.

use async_trait::async_trait;
use gretta::orders::{
    CreatedOrder, ExternalReference, Order, OrderDraft, OrderId, OrderNumber, OrderStatus,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{Span, info, warn};

use crate::orders::{
    errors::OrderRepositoryError,
    records::{NewOrderItemRecord, NewOrderRecord, OrderRecord},
    repository::OrderRepository,
};

const ORDERS_TABLE: &str = "orders";
const ORDER_ITEMS_TABLE: &str = "order_items";
const SELECT_WITH_ITEMS: &str = "*,order_items(*)";

/// Configuration for connecting to a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `"https://xyz.supabase.co"`.
    pub url: String,

    /// Anonymous API key.
    pub anon_key: String,
}

/// Order repository backed by a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseOrderRepository {
    config: SupabaseConfig,
    http: Client,
}

impl SupabaseOrderRepository {
    /// Create a new repository from the given configuration.
    #[must_use]
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!(
            "{}/rest/v1/{table}",
            self.config.url.trim_end_matches('/')
        );

        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
    }

    async fn insert_order(&self, draft: &OrderDraft) -> Result<OrderRecord, OrderRepositoryError> {
        let response = self
            .request(Method::POST, ORDERS_TABLE)
            .header("Prefer", "return=representation")
            .json(&NewOrderRecord::from(draft))
            .send()
            .await?;

        let mut rows: Vec<OrderRecord> = read_rows(response, "insert order").await?;

        rows.pop().ok_or_else(|| {
            OrderRepositoryError::UnexpectedResponse("insert order returned no row".to_string())
        })
    }

    async fn insert_items(
        &self,
        order_id: OrderId,
        draft: &OrderDraft,
    ) -> Result<(), OrderRepositoryError> {
        let items: Vec<NewOrderItemRecord<'_>> = draft
            .line_items()
            .iter()
            .map(|item| NewOrderItemRecord::for_order(order_id, item))
            .collect();

        let response = self
            .request(Method::POST, ORDER_ITEMS_TABLE)
            .header("Prefer", "return=minimal")
            .json(&items)
            .send()
            .await?;

        ensure_success(response, "insert order items").await?;

        Ok(())
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<(), OrderRepositoryError> {
        let response = self
            .request(Method::DELETE, ORDERS_TABLE)
            .query(&[("id", format!("eq.{order_id}"))])
            .send()
            .await?;

        ensure_success(response, "delete order").await?;

        Ok(())
    }

    async fn find_orders(
        &self,
        filter: Option<(&str, String)>,
    ) -> Result<Vec<Order>, OrderRepositoryError> {
        let mut query = vec![
            ("select", SELECT_WITH_ITEMS.to_string()),
            ("order", "created_at.desc".to_string()),
        ];

        query.extend(filter);

        let response = self
            .request(Method::GET, ORDERS_TABLE)
            .query(&query)
            .send()
            .await?;

        let rows: Vec<OrderRecord> = read_rows(response, "select orders").await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn find_by_reference(
        &self,
        reference: &ExternalReference,
    ) -> Result<Order, OrderRepositoryError> {
        self.find_orders(Some(("external_reference", format!("eq.{reference}"))))
            .await?
            .into_iter()
            .next()
            .ok_or(OrderRepositoryError::NotFound)
    }
}

#[async_trait]
impl OrderRepository for SupabaseOrderRepository {
    #[tracing::instrument(
        name = "orders.supabase.create_order",
        skip(self, draft),
        fields(
            external_reference = draft.external_reference().map(tracing::field::display),
            order_number = tracing::field::Empty
        ),
        err
    )]
    async fn create_order(&self, draft: &OrderDraft) -> Result<CreatedOrder, OrderRepositoryError> {
        let record = match self.insert_order(draft).await {
            Ok(record) => record,
            Err(OrderRepositoryError::AlreadyExists) => {
                let Some(reference) = draft.external_reference() else {
                    return Err(OrderRepositoryError::AlreadyExists);
                };

                let existing = self.find_by_reference(reference).await?;

                info!(
                    order_number = %existing.number,
                    "order for this payment already exists"
                );

                return Ok(existing.created());
            }
            Err(error) => return Err(error),
        };

        if let Err(error) = self.insert_items(record.id, draft).await {
            if let Err(cleanup) = self.delete_order(record.id).await {
                warn!(order_id = %record.id, error = %cleanup, "failed to remove incomplete order");
            }

            return Err(error);
        }

        let created = CreatedOrder {
            id: record.id,
            number: OrderNumber(record.order_number),
        };

        Span::current().record("order_number", tracing::field::display(created.number));

        info!(order_number = %created.number, total = draft.total(), "order created");

        Ok(created)
    }

    async fn get_order_by_number(
        &self,
        number: OrderNumber,
    ) -> Result<Order, OrderRepositoryError> {
        self.find_orders(Some(("order_number", format!("eq.{}", number.0))))
            .await?
            .into_iter()
            .next()
            .ok_or(OrderRepositoryError::NotFound)
    }

    #[tracing::instrument(name = "orders.supabase.update_order_status", skip(self), err)]
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, OrderRepositoryError> {
        let response = self
            .request(Method::PATCH, ORDERS_TABLE)
            .header("Prefer", "return=representation")
            .query(&[
                ("id", format!("eq.{id}")),
                ("select", SELECT_WITH_ITEMS.to_string()),
            ])
            .json(&json!({ "status": status }))
            .send()
            .await?;

        let rows: Vec<OrderRecord> = read_rows(response, "update order status").await?;

        let record = rows
            .into_iter()
            .next()
            .ok_or(OrderRepositoryError::NotFound)?;

        Order::try_from(record)
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderRepositoryError> {
        self.find_orders(status.map(|status| ("status", format!("eq.{status}"))))
            .await
    }
}

async fn ensure_success(
    response: Response,
    operation: &str,
) -> Result<Response, OrderRepositoryError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();

    Err(OrderRepositoryError::from_status(status, operation, &text))
}

async fn read_rows<T: DeserializeOwned>(
    response: Response,
    operation: &str,
) -> Result<Vec<T>, OrderRepositoryError> {
    let response = ensure_success(response, operation).await?;

    if response.status() == StatusCode::NO_CONTENT {
        return Ok(Vec::new());
    }

    Ok(response.json().await?)
}
