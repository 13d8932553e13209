//! Warehouse receipts, disbursements, stock levels and surplus.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use uuid::Uuid;

use mrf_database::InventoryRepository;
use mrf_models::{
    Disbursement, DisbursementDetail, DocumentFilter, InventoryStock, NewDisbursement, NewReceipt,
    NewSurplus, ReceiptDetail, StockFilter, StockUpdate, SurplusFilter, SurplusRecord,
    SurplusUpdate, Warehouse, WarehouseReceipt,
};
use mrf_utils::{validate_date_range, validate_each, validate_model, MrfError};

use super::{created, page, ApiResponse, ApiResult, PageResult};
use crate::{middleware::CurrentUser, AppState};

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), MrfError>;

fn repository(state: &AppState) -> InventoryRepository {
    InventoryRepository::new(state.pool.clone())
}

/// GET /api/inventory/warehouses
pub async fn list_warehouses(State(state): State<AppState>) -> ApiResult<Vec<Warehouse>> {
    Ok(ApiResponse::ok(repository(&state).warehouses().await?))
}

/// POST /api/inventory/receipts
pub async fn create_receipt(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<NewReceipt>,
) -> Created<ReceiptDetail> {
    validate_model(&input)?;
    validate_each("Item", &input.items)?;

    let receipt = repository(&state).create_receipt(&input, current.user.id).await?;
    tracing::info!(
        receipt_number = %receipt.receipt.receipt_number,
        lines = receipt.lines.len(),
        "Warehouse receipt created"
    );

    Ok(created(ApiResponse::with_message("Receipt created successfully", receipt)))
}

/// GET /api/inventory/receipts
pub async fn list_receipts(
    State(state): State<AppState>,
    Query(filter): Query<DocumentFilter>,
) -> PageResult<WarehouseReceipt> {
    validate_date_range(filter.from, filter.to)?;
    Ok(page(repository(&state).list_receipts(&filter).await?))
}

/// GET /api/inventory/receipts/:id
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReceiptDetail> {
    let receipt = repository(&state)
        .receipt(id)
        .await?
        .ok_or_else(|| MrfError::not_found("Receipt"))?;
    Ok(ApiResponse::ok(receipt))
}

/// POST /api/inventory/disbursements
///
/// Fails with 409 when a line would take a stock balance below zero.
pub async fn create_disbursement(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<NewDisbursement>,
) -> Created<DisbursementDetail> {
    validate_model(&input)?;
    validate_each("Item", &input.items)?;

    let disbursement = repository(&state)
        .create_disbursement(&input, current.user.id)
        .await?;
    tracing::info!(
        disbursement_number = %disbursement.disbursement.disbursement_number,
        lines = disbursement.lines.len(),
        "Disbursement created"
    );

    Ok(created(ApiResponse::with_message(
        "Disbursement created successfully",
        disbursement,
    )))
}

/// GET /api/inventory/disbursements
pub async fn list_disbursements(
    State(state): State<AppState>,
    Query(filter): Query<DocumentFilter>,
) -> PageResult<Disbursement> {
    validate_date_range(filter.from, filter.to)?;
    Ok(page(repository(&state).list_disbursements(&filter).await?))
}

/// GET /api/inventory/disbursements/:id
pub async fn get_disbursement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DisbursementDetail> {
    let disbursement = repository(&state)
        .disbursement(id)
        .await?
        .ok_or_else(|| MrfError::not_found("Disbursement"))?;
    Ok(ApiResponse::ok(disbursement))
}

/// GET /api/inventory/stock
pub async fn list_stock(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> PageResult<InventoryStock> {
    Ok(page(repository(&state).stock(&filter).await?))
}

/// PUT /api/inventory/stock/:id
pub async fn update_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<StockUpdate>,
) -> ApiResult<InventoryStock> {
    if input.reorder_level.is_some_and(|level| level < 0.0) {
        return Err(MrfError::validation("Reorder level cannot be negative"));
    }

    let stock = repository(&state)
        .update_stock(id, &input)
        .await?
        .ok_or_else(|| MrfError::not_found("Stock item"))?;
    Ok(ApiResponse::with_message("Stock updated successfully", stock))
}

/// POST /api/inventory/surplus
pub async fn create_surplus(
    State(state): State<AppState>,
    Json(input): Json<NewSurplus>,
) -> Created<SurplusRecord> {
    validate_model(&input)?;
    let record = repository(&state).create_surplus(&input).await?;
    Ok(created(ApiResponse::with_message("Surplus recorded successfully", record)))
}

/// GET /api/inventory/surplus
pub async fn list_surplus(
    State(state): State<AppState>,
    Query(filter): Query<SurplusFilter>,
) -> ApiResult<Vec<SurplusRecord>> {
    Ok(ApiResponse::ok(repository(&state).list_surplus(&filter).await?))
}

/// PUT /api/inventory/surplus/:id
pub async fn update_surplus(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SurplusUpdate>,
) -> ApiResult<SurplusRecord> {
    if input.quantity.is_some_and(|quantity| quantity < 0.0) {
        return Err(MrfError::validation("Quantity cannot be negative"));
    }

    let record = repository(&state)
        .update_surplus(id, &input)
        .await?
        .ok_or_else(|| MrfError::not_found("Surplus record"))?;
    Ok(ApiResponse::with_message("Surplus updated successfully", record))
}
