use crate::{
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    services::orders::{OrderAggregate, PlaceOrderRequest},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub status: Option<OrderStatus>,
}

fn default_page() -> u64 {
    1
}
fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(place_order).get(list_orders))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/status", post(update_status))
        .route("/orders/:order_id/cancel", post(cancel_order))
        .route("/customers/:customer_id/orders", get(list_customer_orders))
}

async fn place_order(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderAggregate>), ServiceError> {
    let aggregate = state.services.orders.place_order(request).await?;
    Ok((StatusCode::CREATED, Json(aggregate)))
}

async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderAggregate>, ServiceError> {
    let aggregate = state.services.orders.get_order(order_id).await?;
    Ok(Json(aggregate))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderListResponse>, ServiceError> {
    let (orders, total) = state
        .services
        .orders
        .list_orders(query.status, query.page, query.per_page)
        .await?;
    Ok(Json(OrderListResponse {
        orders,
        total,
        page: query.page,
        per_page: query.per_page,
    }))
}

async fn list_customer_orders(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderListResponse>, ServiceError> {
    let (orders, total) = state
        .services
        .orders
        .list_for_customer(customer_id, query.page, query.per_page)
        .await?;
    Ok(Json(OrderListResponse {
        orders,
        total,
        page: query.page,
        per_page: query.per_page,
    }))
}

async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<order::Model>, ServiceError> {
    let order = state
        .services
        .orders
        .update_status(order_id, request.status)
        .await?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<order::Model>, ServiceError> {
    let reason = request.reason.as_deref().unwrap_or("cancelled by staff");
    let order = state.services.orders.cancel_order(order_id, reason).await?;
    Ok(Json(order))
}
