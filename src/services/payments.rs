use crate::{
    entities::payment::{self, Entity as Payment, PaymentStatus},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Payment collaborator. Creates the pending payment record sized to an
/// order's total; the gateway redirect/callback flow lives elsewhere.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates the pending payment for an order. Safe to retry: an order
    /// that already has a pending payment of the same amount gets the
    /// existing row back instead of a duplicate.
    #[instrument(skip(self))]
    pub async fn create_pending_payment(
        &self,
        order_id: Uuid,
        method: &str,
        amount: Decimal,
    ) -> Result<payment::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let payment = Self::create_pending_within(&txn, order_id, method, amount).await?;
        txn.commit().await?;
        Ok(payment)
    }

    /// Idempotent pending-payment creation inside a caller-owned
    /// transaction.
    pub(crate) async fn create_pending_within<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
        method: &str,
        amount: Decimal,
    ) -> Result<payment::Model, ServiceError> {
        if let Some(existing) = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(conn)
            .await?
        {
            if existing.status == PaymentStatus::Pending && existing.amount == amount {
                info!(order_id = %order_id, payment_id = %existing.id, "pending payment already exists");
                return Ok(existing);
            }
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} already has a {:?} payment of {}",
                order_id, existing.status, existing.amount
            )));
        }

        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            amount: Set(amount),
            method: Set(method.to_string()),
            status: Set(PaymentStatus::Pending),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(conn)
        .await?;
        Ok(payment)
    }

    /// Marks an order's pending payment cancelled, if one exists. Paid
    /// payments are left alone; refunds are a separate concern.
    pub(crate) async fn cancel_pending_within<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<Option<payment::Model>, ServiceError> {
        let Some(existing) = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .filter(payment::Column::Status.eq(PaymentStatus::Pending))
            .one(conn)
            .await?
        else {
            return Ok(None);
        };

        let mut active: payment::ActiveModel = existing.into();
        active.status = Set(PaymentStatus::Cancelled);
        active.updated_at = Set(Some(Utc::now()));
        let payment = active.update(conn).await?;
        Ok(Some(payment))
    }

    #[instrument(skip(self))]
    pub async fn get_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<payment::Model>, ServiceError> {
        let payment = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        Ok(payment)
    }
}
