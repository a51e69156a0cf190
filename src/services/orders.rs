use crate::{
    entities::{
        cart::{self, CartStatus, Entity as Cart},
        cart_item::{self, Entity as CartItem},
        customer_address::Entity as CustomerAddress,
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
        product::{self, Entity as Product},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        carts::CartService, inventory::InventoryService, payments::PaymentService,
        pricing::PricingService,
    },
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    pub customer_id: Uuid,
    pub cart_id: Uuid,
    pub delivery_address_id: Uuid,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
}

/// Order with its lines, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAggregate {
    pub order: order::Model,
    pub lines: Vec<order_item::Model>,
}

/// Converts priced carts into orders. The whole of `place_order` runs in
/// one transaction: allocation, order and line inserts, payment-record
/// creation, and cart clearing commit together or not at all.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, cart_id = %request.cart_id))]
    pub async fn place_order(
        &self,
        request: PlaceOrderRequest,
    ) -> Result<OrderAggregate, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(request.cart_id)
            .one(&txn)
            .await?
            .filter(|c| c.customer_id == request.customer_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Cart {} not found", request.cart_id))
            })?;
        if cart.status != CartStatus::Active {
            return Err(ServiceError::InvalidOperation(format!(
                "Cart {} is not active",
                cart.id
            )));
        }

        let cart_lines = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&txn)
            .await?;
        if cart_lines.is_empty() {
            return Err(ServiceError::EmptyCart(cart.id));
        }

        // Snapshot the delivery details; later edits to the address must
        // not reach back into this order.
        let address = CustomerAddress::find_by_id(request.delivery_address_id)
            .one(&txn)
            .await?
            .filter(|a| a.customer_id == request.customer_id)
            .ok_or(ServiceError::AddressNotFound(request.delivery_address_id))?;

        let order_id = Uuid::new_v4();
        let order_number = format!("ORD-{}", order_id.to_string()[..8].to_uppercase());
        let now = Utc::now();

        // The price lookup runs once per distinct product and is pinned
        // for the whole checkout, so two lines of the same product can
        // never disagree on unit price.
        let mut products: HashMap<Uuid, product::Model> = HashMap::new();
        let mut pinned_prices: HashMap<Uuid, Decimal> = HashMap::new();
        let mut total = Decimal::ZERO;
        let mut line_models: Vec<order_item::ActiveModel> = Vec::new();

        for cart_line in &cart_lines {
            if !products.contains_key(&cart_line.product_id) {
                let product = Product::find_by_id(cart_line.product_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Product {} not found",
                            cart_line.product_id
                        ))
                    })?;
                products.insert(cart_line.product_id, product);
                let price =
                    PricingService::effective_price_within(&txn, cart_line.product_id).await?;
                pinned_prices.insert(cart_line.product_id, price);
            }
            let product = &products[&cart_line.product_id];
            let unit_price = pinned_prices[&cart_line.product_id];

            let allocations = InventoryService::allocate_within(
                &txn,
                cart_line.product_id,
                cart_line.quantity,
                Some(request.customer_id),
                &format!("allocated to order {}", order_number),
            )
            .await?;

            // One line per batch drawn from; a cart quantity spanning
            // several batches keeps one line per cost basis.
            for allocation in allocations {
                let line_total = unit_price * Decimal::from(allocation.quantity_taken);
                total += line_total;
                line_models.push(order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(cart_line.product_id),
                    batch_id: Set(allocation.batch_id),
                    product_name: Set(product.name.clone()),
                    thumbnail_url: Set(product.thumbnail_url.clone()),
                    quantity: Set(allocation.quantity_taken),
                    unit_price: Set(unit_price),
                    line_total: Set(line_total),
                    created_at: Set(now),
                });
            }
        }

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            customer_id: Set(request.customer_id),
            status: Set(OrderStatus::Pending),
            total_amount: Set(total),
            payment_method: Set(request.payment_method.clone()),
            delivery_name: Set(address.recipient_name.clone()),
            delivery_phone: Set(address.phone.clone()),
            delivery_address: Set(address.rendered()),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let mut lines = Vec::with_capacity(line_models.len());
        for line in line_models {
            lines.push(line.insert(&txn).await?);
        }

        // Payment record creation is part of the same atomic unit; if it
        // fails, the allocations above roll back with it.
        PaymentService::create_pending_within(&txn, order_id, &request.payment_method, total)
            .await?;

        CartService::clear_within(&txn, cart.id).await?;
        let mut cart_update: cart::ActiveModel = cart.into();
        cart_update.status = Set(CartStatus::Converted);
        cart_update.updated_at = Set(now);
        cart_update.update(&txn).await?;

        txn.commit().await?;

        info!(
            order_id = %order_id,
            order_number = %order_number,
            total = %total,
            line_count = lines.len(),
            "order placed"
        );
        self.notify(Event::OrderCreated(order_id)).await;
        self.notify(Event::PaymentPending {
            order_id,
            amount: total,
        })
        .await;

        Ok(OrderAggregate { order, lines })
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderAggregate, ServiceError> {
        let db = &*self.db;
        let order = Order::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let lines = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(OrderAggregate { order, lines })
    }

    /// Orders for a customer, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Back-office listing, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Order::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Moves an order along its lifecycle, rejecting transitions the state
    /// machine does not allow. Cancellation goes through `cancel_order`
    /// because it also restores stock.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        if new_status == OrderStatus::Cancelled {
            return self.cancel_order(order_id, "cancelled by staff").await;
        }

        let txn = self.db.begin().await?;
        let order = Self::find_order_locked(&txn, order_id).await?;
        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatusTransition {
                from: old_status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(Utc::now()));
        let order = active.update(&txn).await?;
        txn.commit().await?;

        info!(order_id = %order_id, from = %old_status.as_str(), to = %new_status.as_str(), "order status updated");
        self.notify(Event::OrderStatusChanged {
            order_id,
            old_status: old_status.as_str().to_string(),
            new_status: new_status.as_str().to_string(),
        })
        .await;

        Ok(order)
    }

    /// Cancels an order and returns every allocated unit to the batch it
    /// came from, in one transaction. The per-batch order lines make the
    /// restock exact regardless of how FEFO split the original quantities.
    #[instrument(skip(self, reason))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: &str,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Self::find_order_locked(&txn, order_id).await?;
        let old_status = order.status;
        if !old_status.can_transition_to(OrderStatus::Cancelled) {
            return Err(ServiceError::InvalidStatusTransition {
                from: old_status.as_str().to_string(),
                to: OrderStatus::Cancelled.as_str().to_string(),
            });
        }

        let lines = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        let mut restored: Vec<(Uuid, i32)> = Vec::with_capacity(lines.len());
        for line in &lines {
            InventoryService::restore_within(
                &txn,
                line.batch_id,
                line.quantity,
                &format!("order {} cancelled: {}", order.order_number, reason),
            )
            .await?;
            restored.push((line.batch_id, line.quantity));
        }

        let payment_cancelled = PaymentService::cancel_pending_within(&txn, order_id)
            .await?
            .is_some();

        let order_number = order.order_number.clone();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.updated_at = Set(Some(Utc::now()));
        let order = active.update(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, order_number = %order_number, reason = %reason, "order cancelled");
        self.notify(Event::OrderCancelled(order_id)).await;
        if payment_cancelled {
            self.notify(Event::PaymentCancelled(order_id)).await;
        }
        for (batch_id, quantity) in restored {
            self.notify(Event::StockRestored { batch_id, quantity }).await;
        }

        Ok(order)
    }

    /// Cancels orders stuck in `pending` past the payment timeout. Each
    /// order is cancelled in its own transaction so one failure does not
    /// hold the rest hostage.
    #[instrument(skip(self))]
    pub async fn cancel_stale_pending(
        &self,
        older_than_minutes: i64,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let cutoff = Utc::now() - Duration::minutes(older_than_minutes);
        let stale = Order::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .filter(order::Column::CreatedAt.lt(cutoff))
            .all(&*self.db)
            .await?;

        let mut cancelled = Vec::new();
        for order in stale {
            match self.cancel_order(order.id, "payment timeout").await {
                Ok(_) => cancelled.push(order.id),
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "failed to cancel stale order")
                }
            }
        }

        if !cancelled.is_empty() {
            info!(count = cancelled.len(), "stale pending orders cancelled");
        }
        Ok(cancelled)
    }

    async fn find_order_locked(
        txn: &DatabaseTransaction,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn notify(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "failed to send order event");
        }
    }
}
