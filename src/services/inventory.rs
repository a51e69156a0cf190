use crate::{
    entities::{
        inventory_adjustment::{self, AdjustmentKind},
        inventory_batch::{self, Entity as InventoryBatch},
        product::Entity as Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Quantity taken from one batch during a single allocation call. Not
/// persisted; order lines are the durable record.
#[derive(Debug, Clone, Serialize)]
pub struct AllocatedBatch {
    pub batch_id: Uuid,
    pub batch_code: String,
    pub expires_on: NaiveDate,
    pub quantity_taken: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockInfo {
    pub total_available: i64,
    /// Expiration date of the batch FEFO would consume first. Absent when
    /// nothing is in stock.
    pub soonest_expiration: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReceiveBatchRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "Batch code is required"))]
    pub batch_code: String,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub expires_on: NaiveDate,
    pub received_at: Option<DateTime<Utc>>,
}

/// The inventory ledger. Batches are debited in expiration order (FEFO) and
/// every quantity change lands in the append-only adjustment log.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Registers a physical receipt of stock as a new batch.
    #[instrument(skip(self, request), fields(product_id = %request.product_id, batch_code = %request.batch_code))]
    pub async fn receive_batch(
        &self,
        request: ReceiveBatchRequest,
    ) -> Result<inventory_batch::Model, ServiceError> {
        request.validate()?;

        let today = Utc::now().date_naive();
        if request.expires_on < today {
            return Err(ServiceError::ValidationError(format!(
                "Expiration date {} is in the past",
                request.expires_on
            )));
        }

        let db = &*self.db;
        Product::find_by_id(request.product_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;

        let now = Utc::now();
        let batch = inventory_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(request.product_id),
            batch_code: Set(request.batch_code),
            quantity_received: Set(request.quantity),
            quantity_on_hand: Set(request.quantity),
            received_at: Set(request.received_at.unwrap_or(now)),
            expires_on: Set(request.expires_on),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(batch_id = %batch.id, quantity = %batch.quantity_received, "batch received");
        self.notify(Event::BatchReceived {
            batch_id: batch.id,
            product_id: batch.product_id,
            quantity: batch.quantity_received,
        })
        .await;

        Ok(batch)
    }

    /// Total sellable quantity for a product. Unknown and fully-depleted
    /// products report 0 rather than an error.
    #[instrument(skip(self))]
    pub async fn stock_availability(&self, product_id: Uuid) -> Result<i64, ServiceError> {
        Ok(self.stock_info(product_id).await?.total_available)
    }

    /// Total sellable quantity plus the expiration date FEFO would consume
    /// first.
    #[instrument(skip(self))]
    pub async fn stock_info(&self, product_id: Uuid) -> Result<StockInfo, ServiceError> {
        let batches = InventoryBatch::find()
            .filter(inventory_batch::Column::ProductId.eq(product_id))
            .filter(inventory_batch::Column::QuantityOnHand.gt(0))
            .order_by_asc(inventory_batch::Column::ExpiresOn)
            .order_by_asc(inventory_batch::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(StockInfo {
            total_available: batches.iter().map(|b| b.quantity_on_hand as i64).sum(),
            soonest_expiration: batches.first().map(|b| b.expires_on),
        })
    }

    /// Debits `quantity_needed` units from the product's batches in
    /// expiration order, inside its own transaction. Fails whole on
    /// shortfall; no batch is touched unless every unit can be sourced.
    #[instrument(skip(self))]
    pub async fn allocate(
        &self,
        product_id: Uuid,
        quantity_needed: i32,
        actor: Option<Uuid>,
    ) -> Result<Vec<AllocatedBatch>, ServiceError> {
        let txn = self.db.begin().await?;
        let allocations = Self::allocate_within(
            &txn,
            product_id,
            quantity_needed,
            actor,
            "direct allocation",
        )
        .await?;
        txn.commit().await?;

        self.notify(Event::InventoryAllocated {
            product_id,
            quantity: quantity_needed,
            batch_ids: allocations.iter().map(|a| a.batch_id).collect(),
        })
        .await;

        Ok(allocations)
    }

    /// FEFO allocation inside a caller-owned transaction. The caller must
    /// treat the returned batches as already debited; there is no separate
    /// confirm step. Emits no events; the caller owns the commit and with
    /// it the right to announce anything.
    pub(crate) async fn allocate_within<C: ConnectionTrait>(
        conn: &C,
        product_id: Uuid,
        quantity_needed: i32,
        actor: Option<Uuid>,
        reason: &str,
    ) -> Result<Vec<AllocatedBatch>, ServiceError> {
        if quantity_needed <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Allocation quantity must be positive, got {}",
                quantity_needed
            )));
        }

        // Lock the candidate rows up front; availability must be derived
        // from the same rows that get written.
        let candidates = InventoryBatch::find()
            .filter(inventory_batch::Column::ProductId.eq(product_id))
            .filter(inventory_batch::Column::QuantityOnHand.gt(0))
            .order_by_asc(inventory_batch::Column::ExpiresOn)
            .order_by_asc(inventory_batch::Column::Id)
            .lock_exclusive()
            .all(conn)
            .await?;

        let available: i64 = candidates.iter().map(|b| b.quantity_on_hand as i64).sum();
        if available < quantity_needed as i64 {
            return Err(ServiceError::InsufficientStock {
                product_id,
                requested: quantity_needed,
                available: available as i32,
            });
        }

        let now = Utc::now();
        let mut remaining = quantity_needed;
        let mut allocations = Vec::new();

        for batch in candidates {
            if remaining == 0 {
                break;
            }
            let taken = batch.quantity_on_hand.min(remaining);

            // Guarded decrement: refuses to drive the row below zero even
            // if another writer slipped past the row lock.
            let result = InventoryBatch::update_many()
                .col_expr(
                    inventory_batch::Column::QuantityOnHand,
                    Expr::col(inventory_batch::Column::QuantityOnHand).sub(taken),
                )
                .col_expr(inventory_batch::Column::UpdatedAt, Expr::value(now))
                .filter(inventory_batch::Column::Id.eq(batch.id))
                .filter(inventory_batch::Column::QuantityOnHand.gte(taken))
                .exec(conn)
                .await?;
            if result.rows_affected != 1 {
                return Err(ServiceError::ConcurrentModification(batch.id));
            }

            Self::log_adjustment(
                conn,
                batch.id,
                -taken,
                reason,
                AdjustmentKind::OrderAllocation,
                actor,
            )
            .await?;

            allocations.push(AllocatedBatch {
                batch_id: batch.id,
                batch_code: batch.batch_code,
                expires_on: batch.expires_on,
                quantity_taken: taken,
            });
            remaining -= taken;
        }

        Ok(allocations)
    }

    /// Applies a signed manual correction to a batch. Rejected when the
    /// resulting quantity would fall below zero or exceed what the batch
    /// originally received.
    #[instrument(skip(self, reason))]
    pub async fn adjust_stock(
        &self,
        batch_id: Uuid,
        delta: i32,
        reason: &str,
        actor: Uuid,
    ) -> Result<inventory_batch::Model, ServiceError> {
        if delta == 0 {
            return Err(ServiceError::ValidationError(
                "Adjustment delta must be non-zero".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let batch = Self::apply_adjustment(
            &txn,
            batch_id,
            delta,
            reason,
            AdjustmentKind::Manual,
            Some(actor),
        )
        .await?;
        txn.commit().await?;

        self.notify(Event::InventoryAdjusted {
            batch_id,
            delta,
            new_quantity: batch.quantity_on_hand,
            reason: reason.to_string(),
        })
        .await;

        Ok(batch)
    }

    /// Returns previously allocated quantity to a batch. Inverse of
    /// allocation, used by order cancellation.
    #[instrument(skip(self))]
    pub async fn restore_stock(
        &self,
        batch_id: Uuid,
        quantity: i32,
    ) -> Result<inventory_batch::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let batch = Self::restore_within(&txn, batch_id, quantity, "stock restored").await?;
        txn.commit().await?;

        self.notify(Event::StockRestored { batch_id, quantity }).await;

        Ok(batch)
    }

    /// Restock inside a caller-owned transaction.
    pub(crate) async fn restore_within<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
        quantity: i32,
        reason: &str,
    ) -> Result<inventory_batch::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Restore quantity must be positive, got {}",
                quantity
            )));
        }
        Self::apply_adjustment(conn, batch_id, quantity, reason, AdjustmentKind::Restock, None)
            .await
    }

    /// Writes off a batch entirely (contamination, recall, spoilage found
    /// in storage). The remaining quantity is logged as a destruction
    /// adjustment and the batch drops to zero on hand.
    #[instrument(skip(self, reason))]
    pub async fn destroy_batch(
        &self,
        batch_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> Result<inventory_batch::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let batch = Self::find_batch_locked(&txn, batch_id).await?;
        if batch.quantity_on_hand <= 0 {
            return Err(ServiceError::BatchAlreadyEmpty(batch_id));
        }
        let written_off = batch.quantity_on_hand;

        Self::log_adjustment(
            &txn,
            batch_id,
            -written_off,
            reason,
            AdjustmentKind::Destruction,
            Some(actor),
        )
        .await?;

        let mut active: inventory_batch::ActiveModel = batch.into();
        active.quantity_on_hand = Set(0);
        active.updated_at = Set(Utc::now());
        let batch = active.update(&txn).await?;

        txn.commit().await?;

        warn!(batch_id = %batch_id, written_off = %written_off, "batch destroyed");
        self.notify(Event::BatchDestroyed {
            batch_id,
            quantity_written_off: written_off,
        })
        .await;

        Ok(batch)
    }

    /// All batches of a product, soonest-expiring first. Depleted batches
    /// are included on request for audit views.
    #[instrument(skip(self))]
    pub async fn list_batches(
        &self,
        product_id: Uuid,
        include_depleted: bool,
    ) -> Result<Vec<inventory_batch::Model>, ServiceError> {
        let mut query = InventoryBatch::find()
            .filter(inventory_batch::Column::ProductId.eq(product_id));
        if !include_depleted {
            query = query.filter(inventory_batch::Column::QuantityOnHand.gt(0));
        }
        let batches = query
            .order_by_asc(inventory_batch::Column::ExpiresOn)
            .order_by_asc(inventory_batch::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(batches)
    }

    /// Adjustment history for a batch, newest first.
    #[instrument(skip(self))]
    pub async fn list_adjustments(
        &self,
        batch_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<inventory_adjustment::Model>, u64), ServiceError> {
        let paginator = inventory_adjustment::Entity::find()
            .filter(inventory_adjustment::Column::BatchId.eq(batch_id))
            .order_by_desc(inventory_adjustment::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let adjustments = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((adjustments, total))
    }

    /// Validates and applies a signed delta to a batch, recording the
    /// adjustment row. Validation happens before any write.
    async fn apply_adjustment<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
        delta: i32,
        reason: &str,
        kind: AdjustmentKind,
        actor: Option<Uuid>,
    ) -> Result<inventory_batch::Model, ServiceError> {
        let batch = Self::find_batch_locked(conn, batch_id).await?;

        let resulting = batch.quantity_on_hand + delta;
        if resulting < 0 || resulting > batch.quantity_received {
            return Err(ServiceError::InvalidAdjustment {
                batch_id,
                delta,
                resulting,
            });
        }

        Self::log_adjustment(conn, batch_id, delta, reason, kind, actor).await?;

        let mut active: inventory_batch::ActiveModel = batch.into();
        active.quantity_on_hand = Set(resulting);
        active.updated_at = Set(Utc::now());
        let batch = active.update(conn).await?;
        Ok(batch)
    }

    async fn find_batch_locked<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
    ) -> Result<inventory_batch::Model, ServiceError> {
        InventoryBatch::find_by_id(batch_id)
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))
    }

    async fn log_adjustment<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
        delta: i32,
        reason: &str,
        kind: AdjustmentKind,
        actor: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        inventory_adjustment::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_id: Set(batch_id),
            quantity_delta: Set(delta),
            reason: Set(reason.to_string()),
            kind: Set(kind),
            adjusted_by: Set(actor),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;
        Ok(())
    }

    async fn notify(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "failed to send inventory event");
        }
    }
}
