//! Payment collaborator callbacks.
//!
//! The gateway itself lives outside this core; only its outcome
//! callbacks cross the boundary. Payment failure never releases stock —
//! release happens only through explicit cancellation.

use domain::{OrderStatus, PaymentStatus};
use lock::LockStore;
use store::CommerceStore;

use crate::error::{CheckoutError, Result};
use crate::service::CheckoutService;
use common::OrderId;

impl<S, L> CheckoutService<S, L>
where
    S: CommerceStore,
    L: LockStore,
{
    /// Records a successful payment: the order, all its sub-orders, and
    /// all their items move to `Confirmed`/`Paid` atomically.
    #[tracing::instrument(skip(self))]
    pub async fn mark_paid(&self, order_id: OrderId) -> Result<()> {
        let order = self
            .store()
            .get_order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;
        let subs = self.store().list_sub_orders(order.id).await?;

        let mut tx = self.store().begin().await?;
        let result: Result<()> = async {
            tx.update_order_status(order.id, OrderStatus::Confirmed, PaymentStatus::Paid)
                .await?;
            tx.update_order_items_status(order.id, OrderStatus::Confirmed)
                .await?;
            for sub in &subs {
                tx.update_order_status(sub.id, OrderStatus::Confirmed, PaymentStatus::Paid)
                    .await?;
                tx.update_order_items_status(sub.id, OrderStatus::Confirmed)
                    .await?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await?;
                tracing::info!(%order_id, "payment recorded");
                Ok(())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Records a failed payment attempt: payment status becomes
    /// `Failed` on the order and its sub-orders while order status
    /// stays `Pending`. Stock is NOT released.
    #[tracing::instrument(skip(self))]
    pub async fn mark_failed(&self, order_id: OrderId) -> Result<()> {
        self.set_payment_status(order_id, PaymentStatus::Failed)
            .await
    }

    /// Records a refund issued by the gateway: payment status becomes
    /// `Refunded` on the order and its sub-orders; order status is left
    /// untouched.
    #[tracing::instrument(skip(self))]
    pub async fn mark_refunded(&self, order_id: OrderId) -> Result<()> {
        self.set_payment_status(order_id, PaymentStatus::Refunded)
            .await
    }

    async fn set_payment_status(&self, order_id: OrderId, payment: PaymentStatus) -> Result<()> {
        let order = self
            .store()
            .get_order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;
        let subs = self.store().list_sub_orders(order.id).await?;

        let mut tx = self.store().begin().await?;
        let result: Result<()> = async {
            tx.update_order_status(order.id, order.status, payment).await?;
            for sub in &subs {
                tx.update_order_status(sub.id, sub.status, payment).await?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}
