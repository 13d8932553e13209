use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use uuid::Uuid;

use mrf_database::AttachmentRepository;
use mrf_models::{Attachment, QuotationFilter, QuotationListing, QuotationStatusUpdate};
use mrf_utils::validate_date_range;

use super::{page, ApiResponse, ApiResult, PageResult};
use crate::{middleware::CurrentUser, AppState};

/// GET /api/quotations
pub async fn list_quotations(
    State(state): State<AppState>,
    Query(filter): Query<QuotationFilter>,
) -> PageResult<QuotationListing> {
    validate_date_range(filter.from, filter.to)?;

    let quotations = AttachmentRepository::new(state.pool.clone())
        .list_quotations(&filter)
        .await?;
    Ok(page(quotations))
}

/// PUT /api/quotations/:id
pub async fn update_quotation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<QuotationStatusUpdate>,
) -> ApiResult<Attachment> {
    let quotation = AttachmentRepository::new(state.pool.clone())
        .update_quotation_status(id, &input.status, input.notes.as_deref(), current.user.id)
        .await?;

    tracing::info!(
        attachment_id = %quotation.id,
        request_id = %quotation.request_id,
        status = %quotation.status,
        "Quotation reviewed"
    );
    Ok(ApiResponse::with_message("Quotation status updated", quotation))
}
