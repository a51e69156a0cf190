use crate::{
    events::EventSender,
    services::{
        carts::CartService, inventory::InventoryService, orders::OrderService,
        payments::PaymentService, pricing::PricingService,
    },
};
use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod inventory;
pub mod orders;

/// All services, constructed once at startup and shared through AppState.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: InventoryService,
    pub orders: OrderService,
    pub carts: CartService,
    pub pricing: PricingService,
    pub payments: PaymentService,
}

impl AppServices {
    pub fn build(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            inventory: InventoryService::new(db.clone(), event_sender.clone()),
            orders: OrderService::new(db.clone(), event_sender),
            carts: CartService::new(db.clone()),
            pricing: PricingService::new(db.clone()),
            payments: PaymentService::new(db),
        }
    }
}

/// Versioned API surface: the inventory ledger and order contracts.
pub fn api_router() -> Router<crate::AppState> {
    Router::new()
        .nest("/inventory", inventory::router())
        .merge(orders::router())
}
