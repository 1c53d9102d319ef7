//! Local order cache with optimistic status and price changes.

use shared::models::{Order, OrderStatus};
use tracing::{info, warn};

use crate::{
    endpoints::normalize_price,
    error::{ClientError, ClientResult},
    pipeline::ApiClient,
};

/// Orders last fetched from the backend.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: Vec<Order>,
}

impl OrderBook {
    #[must_use]
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }

    /// Fetch the account's orders.
    ///
    /// # Errors
    /// Returns the failure of [`ApiClient::list_orders`].
    pub async fn load(client: &ApiClient) -> ClientResult<Self> {
        let orders = client.list_orders().await?;
        info!(count = orders.len(), "orders loaded");
        Ok(Self::new(orders))
    }

    #[must_use]
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == id)
    }

    /// Orders with the given status, or every order for `None`.
    #[must_use]
    pub fn filter(&self, status: Option<OrderStatus>) -> impl Iterator<Item = &Order> {
        self.orders
            .iter()
            .filter(move |order| status.is_none_or(|status| order.status == status))
    }

    /// Change an order's status, showing the new value before the backend confirms.
    ///
    /// The local copy is replaced with the server's answer on success and
    /// restored to its previous status on failure.
    ///
    /// # Errors
    /// Returns [`ClientError::Validation`] for an unknown order, otherwise the
    /// failure of [`ApiClient::update_order_status`].
    pub async fn set_status(
        &mut self,
        client: &ApiClient,
        id: i64,
        status: OrderStatus,
    ) -> ClientResult<&Order> {
        let index = self.index_of(id)?;
        let previous = std::mem::replace(&mut self.orders[index].status, status);

        match client.update_order_status(id, status).await {
            Ok(updated) => {
                self.orders[index] = updated;
                Ok(&self.orders[index])
            }
            Err(err) => {
                warn!(order = id, error = %err, "status change rejected; rolling back");
                self.orders[index].status = previous;
                Err(err)
            }
        }
    }

    /// Set an order's total price, showing it before the backend confirms.
    ///
    /// Rolled back to the previous total when the backend rejects the change.
    ///
    /// # Errors
    /// Returns [`ClientError::Validation`] for an unknown order or a malformed
    /// price, otherwise the failure of [`ApiClient::update_order_price`].
    pub async fn set_price(
        &mut self,
        client: &ApiClient,
        id: i64,
        price: &str,
    ) -> ClientResult<&Order> {
        let index = self.index_of(id)?;
        let total_price = normalize_price(price)?;
        let previous = std::mem::replace(&mut self.orders[index].total_price, total_price);

        match client.update_order_price(id, price).await {
            Ok(updated) => {
                self.orders[index] = updated;
                Ok(&self.orders[index])
            }
            Err(err) => {
                warn!(order = id, error = %err, "price change rejected; rolling back");
                self.orders[index].total_price = previous;
                Err(err)
            }
        }
    }

    /// Cancel an order and apply the server's copy.
    ///
    /// Completed and rejected orders are refused locally; the backend leaves
    /// them unchanged anyway.
    ///
    /// # Errors
    /// Returns [`ClientError::Validation`] for an unknown or already final
    /// order, otherwise the failure of [`ApiClient::cancel_order`].
    pub async fn cancel(&mut self, client: &ApiClient, id: i64) -> ClientResult<&Order> {
        let index = self.index_of(id)?;
        let status = self.orders[index].status;
        if status.is_final() {
            return Err(ClientError::Validation(format!(
                "order {id} is already {status} and cannot be cancelled"
            )));
        }
        self.orders[index] = client.cancel_order(id).await?;
        Ok(&self.orders[index])
    }

    fn index_of(&self, id: i64) -> ClientResult<usize> {
        self.orders
            .iter()
            .position(|order| order.id == id)
            .ok_or_else(|| ClientError::Validation(format!("order {id} is not loaded")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(id: i64, status: OrderStatus) -> Order {
        Order {
            id,
            customer: Some(1),
            customer_name: Some("ada".into()),
            status,
            total_price: "10.00".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items: Vec::new(),
        }
    }

    #[test]
    fn filter_by_status() {
        let book = OrderBook::new(vec![
            order(1, OrderStatus::Pending),
            order(2, OrderStatus::Completed),
            order(3, OrderStatus::Pending),
        ]);

        let pending: Vec<i64> = book
            .filter(Some(OrderStatus::Pending))
            .map(|order| order.id)
            .collect();
        assert_eq!(pending, vec![1, 3]);
        assert_eq!(book.filter(None).count(), 3);
        assert_eq!(book.get(2).map(|order| order.status), Some(OrderStatus::Completed));
        assert!(book.get(9).is_none());
    }

    #[test]
    fn unknown_order_is_a_validation_error() {
        let book = OrderBook::default();
        assert!(matches!(book.index_of(4), Err(ClientError::Validation(_))));
    }
}
