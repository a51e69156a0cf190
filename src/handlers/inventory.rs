use crate::{
    entities::{inventory_adjustment, inventory_batch},
    errors::ServiceError,
    services::inventory::{AllocatedBatch, ReceiveBatchRequest, StockInfo},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub product_id: Uuid,
    pub available: i64,
}

#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub actor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i32,
    pub reason: String,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DestroyRequest {
    pub reason: String,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BatchListQuery {
    #[serde(default)]
    pub include_depleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}
fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize)]
pub struct AdjustmentListResponse {
    pub adjustments: Vec<inventory_adjustment::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/:product_id/availability", get(stock_availability))
        .route("/products/:product_id/stock-info", get(stock_info))
        .route("/products/:product_id/batches", get(list_batches))
        .route("/batches", post(receive_batch))
        .route("/batches/:batch_id/adjust", post(adjust_stock))
        .route("/batches/:batch_id/destroy", post(destroy_batch))
        .route("/batches/:batch_id/adjustments", get(list_adjustments))
        .route("/allocate", post(allocate))
}

async fn stock_availability(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<AvailabilityResponse>, ServiceError> {
    let available = state.services.inventory.stock_availability(product_id).await?;
    Ok(Json(AvailabilityResponse {
        product_id,
        available,
    }))
}

async fn stock_info(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<StockInfo>, ServiceError> {
    let info = state.services.inventory.stock_info(product_id).await?;
    Ok(Json(info))
}

async fn receive_batch(
    State(state): State<AppState>,
    Json(request): Json<ReceiveBatchRequest>,
) -> Result<Json<inventory_batch::Model>, ServiceError> {
    let batch = state.services.inventory.receive_batch(request).await?;
    Ok(Json(batch))
}

async fn list_batches(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<BatchListQuery>,
) -> Result<Json<Vec<inventory_batch::Model>>, ServiceError> {
    let batches = state
        .services
        .inventory
        .list_batches(product_id, query.include_depleted)
        .await?;
    Ok(Json(batches))
}

async fn allocate(
    State(state): State<AppState>,
    Json(request): Json<AllocateRequest>,
) -> Result<Json<Vec<AllocatedBatch>>, ServiceError> {
    let allocations = state
        .services
        .inventory
        .allocate(request.product_id, request.quantity, request.actor_id)
        .await?;
    Ok(Json(allocations))
}

async fn adjust_stock(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<inventory_batch::Model>, ServiceError> {
    let batch = state
        .services
        .inventory
        .adjust_stock(batch_id, request.delta, &request.reason, request.actor_id)
        .await?;
    Ok(Json(batch))
}

async fn destroy_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<DestroyRequest>,
) -> Result<Json<inventory_batch::Model>, ServiceError> {
    let batch = state
        .services
        .inventory
        .destroy_batch(batch_id, &request.reason, request.actor_id)
        .await?;
    Ok(Json(batch))
}

async fn list_adjustments(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<AdjustmentListResponse>, ServiceError> {
    let (adjustments, total) = state
        .services
        .inventory
        .list_adjustments(batch_id, query.page, query.per_page)
        .await?;
    Ok(Json(AdjustmentListResponse {
        adjustments,
        total,
        page: query.page,
        per_page: query.per_page,
    }))
}
