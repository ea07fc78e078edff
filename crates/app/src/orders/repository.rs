//! Order repository.

use async_trait::async_trait;
use gretta::orders::{CreatedOrder, Order, OrderDraft, OrderId, OrderNumber, OrderStatus};
use mockall::automock;

use crate::orders::errors::OrderRepositoryError;

#[automock]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an order and its line items. A draft carrying an external reference that was
    /// already persisted resolves to the existing order.
    async fn create_order(&self, draft: &OrderDraft) -> Result<CreatedOrder, OrderRepositoryError>;

    /// Retrieve a single order by its human-facing number.
    async fn get_order_by_number(&self, number: OrderNumber)
    -> Result<Order, OrderRepositoryError>;

    /// Set the status of an order.
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, OrderRepositoryError>;

    /// Retrieve orders, newest first, optionally only those with `status`.
    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderRepositoryError>;
}

/// Move an order one step along its fulfilment path, or cancel it.
///
/// # Errors
///
/// Returns [`OrderRepositoryError::InvalidTransition`] when the change is not allowed from the
/// order's current status, or any error from the repository.
pub async fn transition_order(
    repository: &dyn OrderRepository,
    number: OrderNumber,
    to: OrderStatus,
) -> Result<Order, OrderRepositoryError> {
    let order = repository.get_order_by_number(number).await?;

    if !order.status.can_transition_to(to) {
        return Err(OrderRepositoryError::InvalidTransition {
            from: order.status,
            to,
        });
    }

    repository.update_order_status(order.id, to).await
}

/// Move an order to the next status of its fulfilment path.
///
/// # Errors
///
/// Returns [`OrderRepositoryError::InvalidTransition`] for delivered or cancelled orders, or any
/// error from the repository.
pub async fn advance_order(
    repository: &dyn OrderRepository,
    number: OrderNumber,
) -> Result<Order, OrderRepositoryError> {
    let order = repository.get_order_by_number(number).await?;

    let Some(next) = order.status.next() else {
        return Err(OrderRepositoryError::InvalidTransition {
            from: order.status,
            to: order.status,
        });
    };

    repository.update_order_status(order.id, next).await
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::fixtures;

    use super::*;

    #[tokio::test]
    async fn advance_moves_one_step() -> TestResult {
        let order = fixtures::order(OrderNumber(7), OrderStatus::Pending);
        let id = order.id;

        let mut repository = MockOrderRepository::new();

        repository
            .expect_get_order_by_number()
            .once()
            .return_once(move |_| Ok(order));

        repository
            .expect_update_order_status()
            .once()
            .withf(move |order_id, status| *order_id == id && *status == OrderStatus::Preparing)
            .return_once(|_, status| Ok(fixtures::order(OrderNumber(7), status)));

        let updated = advance_order(&repository, OrderNumber(7)).await?;

        assert_eq!(updated.status, OrderStatus::Preparing);

        Ok(())
    }

    #[tokio::test]
    async fn delivered_orders_cannot_advance() {
        let order = fixtures::order(OrderNumber(8), OrderStatus::Delivered);

        let mut repository = MockOrderRepository::new();

        repository
            .expect_get_order_by_number()
            .once()
            .return_once(move |_| Ok(order));

        repository.expect_update_order_status().never();

        let result = advance_order(&repository, OrderNumber(8)).await;

        assert!(
            matches!(result, Err(OrderRepositoryError::InvalidTransition { .. })),
            "expected InvalidTransition, got {result:?}"
        );
    }

    #[tokio::test]
    async fn cancelled_orders_cannot_be_cancelled_again() {
        let order = fixtures::order(OrderNumber(9), OrderStatus::Cancelled);

        let mut repository = MockOrderRepository::new();

        repository
            .expect_get_order_by_number()
            .once()
            .return_once(move |_| Ok(order));

        repository.expect_update_order_status().never();

        let result = transition_order(&repository, OrderNumber(9), OrderStatus::Cancelled).await;

        assert!(
            matches!(result, Err(OrderRepositoryError::InvalidTransition { .. })),
            "expected InvalidTransition, got {result:?}"
        );
    }
}
