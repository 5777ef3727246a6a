//! Paper trading venue

use super::{
    ExecutionVenue, Fill, OrderId, OrderRequest, OrderStatus, RedeemReceipt, VenueError,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Paper venue with simulated immediate fills
pub struct PaperVenue {
    fee_rate: Decimal,
    orders: Arc<RwLock<HashMap<OrderId, OrderStatus>>>,
    fills: Arc<RwLock<Vec<Fill>>>,
}

impl PaperVenue {
    /// Create a new paper venue
    pub fn new(fee_rate: Decimal) -> Self {
        Self {
            fee_rate,
            orders: Arc::new(RwLock::new(HashMap::new())),
            fills: Arc::new(RwLock::new(vec![])),
        }
    }

    /// All simulated fills so far
    pub async fn fills(&self) -> Vec<Fill> {
        self.fills.read().await.clone()
    }
}

#[async_trait]
impl ExecutionVenue for PaperVenue {
    fn name(&self) -> &str {
        "paper"
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderId, VenueError> {
        order.validate()?;
        let order_id = Uuid::new_v4().to_string();

        // Simulate immediate fill at order price
        let fees = order.size * order.price * self.fee_rate;
        let fill = Fill {
            order_id: order_id.clone(),
            token_id: order.token_id.clone(),
            side: order.side,
            price: order.price,
            size: order.size,
            timestamp: Utc::now(),
            fees,
        };

        self.orders.write().await.insert(
            order_id.clone(),
            OrderStatus {
                status: "MATCHED".into(),
                original_size: order.size,
                size_matched: order.size,
            },
        );
        self.fills.write().await.push(fill);

        tracing::info!(order_id = %order_id, side = %order.side, price = %order.price, "Paper order filled");
        Ok(order_id)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, VenueError> {
        self.orders
            .read()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| VenueError::NotFound(order_id.to_string()))
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError> {
        let orders = self.orders.read().await;
        match orders.get(order_id) {
            Some(status) if status.is_filled() => Err(VenueError::CancelRejected(format!(
                "{} already matched",
                order_id
            ))),
            Some(_) => {
                tracing::info!(order_id, "Paper order cancelled");
                Ok(())
            }
            None => Err(VenueError::NotFound(order_id.to_string())),
        }
    }

    fn redeems_on_chain(&self) -> bool {
        false
    }

    /// Settled positions live on-chain, so there is nothing to simulate
    async fn redeem(&self, condition_id: &str, _owner: &str) -> Result<RedeemReceipt, VenueError> {
        Err(VenueError::RedeemFailed(format!(
            "paper venue cannot redeem {condition_id} on-chain"
        )))
    }

    async fn provision_account(&self) -> Result<(), VenueError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::OrderSide;
    use rust_decimal_macros::dec;

    fn order(side: OrderSide, price: Decimal, size: Decimal) -> OrderRequest {
        OrderRequest {
            token_id: "test".to_string(),
            side,
            price,
            size,
        }
    }

    #[tokio::test]
    async fn test_paper_venue_fill() {
        let venue = PaperVenue::new(dec!(0.001));

        let order_id = venue
            .place_order(&order(OrderSide::Buy, dec!(0.50), dec!(100)))
            .await
            .unwrap();
        let fills = venue.fills().await;

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].order_id, order_id);
        assert_eq!(fills[0].fees, dec!(0.05)); // 100 * 0.50 * 0.001

        let status = venue.order_status(&order_id).await.unwrap();
        assert!(status.is_filled());
    }

    #[tokio::test]
    async fn test_paper_venue_rejects_bad_price() {
        let venue = PaperVenue::new(dec!(0));
        let err = venue
            .place_order(&order(OrderSide::Sell, dec!(1.2), dec!(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, VenueError::OrderRejected(_)));
        assert!(venue.fills().await.is_empty());
    }

    #[tokio::test]
    async fn test_paper_venue_cancel_and_lookup() {
        let venue = PaperVenue::new(dec!(0));
        let id = venue
            .place_order(&order(OrderSide::Buy, dec!(0.5), dec!(5)))
            .await
            .unwrap();

        assert!(matches!(
            venue.cancel_order(&id).await,
            Err(VenueError::CancelRejected(_))
        ));
        assert!(matches!(
            venue.order_status("missing").await,
            Err(VenueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_paper_venue_never_reports_a_redemption() {
        let venue = PaperVenue::new(dec!(0));
        assert!(!venue.redeems_on_chain());
        assert!(matches!(
            venue.redeem("0xabc", "0xowner").await,
            Err(VenueError::RedeemFailed(msg)) if msg.contains("0xabc")
        ));
        assert!(venue.provision_account().await.is_ok());
    }
}
