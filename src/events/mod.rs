use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the services after their owning transaction commits.
/// Consumers never observe an order or a stock movement that was rolled
/// back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Inventory events
    BatchReceived {
        batch_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    InventoryAllocated {
        product_id: Uuid,
        quantity: i32,
        batch_ids: Vec<Uuid>,
    },
    InventoryAdjusted {
        batch_id: Uuid,
        delta: i32,
        new_quantity: i32,
        reason: String,
    },
    StockRestored {
        batch_id: Uuid,
        quantity: i32,
    },
    BatchDestroyed {
        batch_id: Uuid,
        quantity_written_off: i32,
    },

    // Payment events
    PaymentPending {
        order_id: Uuid,
        amount: Decimal,
    },
    PaymentCancelled(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event to the processing loop. Failures are reported to the
    /// caller but must never abort the operation that produced the event;
    /// the transaction has already committed by the time this is called.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Event processing loop. Downstream delivery (notifications, analytics)
/// hangs off this consumer; the core only logs what happened.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "order created");
            }
            Event::OrderCancelled(order_id) => {
                info!(order_id = %order_id, "order cancelled");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id = %order_id, from = %old_status, to = %new_status, "order status changed");
            }
            Event::BatchReceived {
                batch_id,
                product_id,
                quantity,
            } => {
                info!(batch_id = %batch_id, product_id = %product_id, quantity = %quantity, "batch received");
            }
            Event::InventoryAllocated {
                product_id,
                quantity,
                batch_ids,
            } => {
                info!(product_id = %product_id, quantity = %quantity, batches = batch_ids.len(), "inventory allocated");
            }
            Event::InventoryAdjusted {
                batch_id,
                delta,
                new_quantity,
                reason,
            } => {
                info!(batch_id = %batch_id, delta = %delta, new_quantity = %new_quantity, reason = %reason, "inventory adjusted");
            }
            Event::StockRestored { batch_id, quantity } => {
                info!(batch_id = %batch_id, quantity = %quantity, "stock restored");
            }
            Event::BatchDestroyed {
                batch_id,
                quantity_written_off,
            } => {
                warn!(batch_id = %batch_id, written_off = %quantity_written_off, "batch destroyed");
            }
            Event::PaymentPending { order_id, amount } => {
                info!(order_id = %order_id, amount = %amount, "pending payment created");
            }
            Event::PaymentCancelled(order_id) => {
                info!(order_id = %order_id, "payment cancelled");
            }
        }
    }

    info!("Event processing loop stopped");
}
