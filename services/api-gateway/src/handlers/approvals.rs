//! Approval workflow endpoints.
//!
//! The stage rules live in the models crate; these handlers only resolve
//! the caller, apply the transition and count it.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use uuid::Uuid;

use mrf_database::WorkflowRepository;
use mrf_models::{
    ApprovalDecision, ApprovalHistory, BlanketOrderInput, ComplianceInput, MaterialRequest,
    PendingApproval, PendingFilter, ProformaInput, RejectionInput, RescheduleInput,
};

use super::{page, requests::{ensure_can_view, load_request}, ApiResponse, ApiResult, PageResult};
use crate::{middleware::CurrentUser, AppState};

/// Counts the transition; the repository already logged it.
fn transitioned<T>(state: &AppState, action: &str, message: &str, data: T) -> ApiResult<T> {
    state.metrics.record_transition(action);
    Ok(ApiResponse::with_message(message, data))
}

/// GET /api/approvals/pending
pub async fn pending(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(filter): Query<PendingFilter>,
) -> PageResult<PendingApproval> {
    let pending = WorkflowRepository::new(state.pool.clone())
        .pending(&current.user, &filter)
        .await?;
    Ok(page(pending))
}

/// POST /api/approvals/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    decision: Option<Json<ApprovalDecision>>,
) -> ApiResult<MaterialRequest> {
    let decision = decision.map(|Json(d)| d).unwrap_or_default();
    let request = WorkflowRepository::new(state.pool.clone())
        .approve(id, &current.user, &decision)
        .await?;
    let message = format!("Request approved and moved to {}", request.workflow_stage.label());
    transitioned(&state, "approve", &message, request)
}

/// POST /api/approvals/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<RejectionInput>,
) -> ApiResult<MaterialRequest> {
    let request = WorkflowRepository::new(state.pool.clone())
        .reject(id, &current.user, &input.reason)
        .await?;
    transitioned(&state, "reject", "Request rejected", request)
}

/// POST /api/approvals/:id/reschedule
pub async fn reschedule(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<RescheduleInput>,
) -> ApiResult<MaterialRequest> {
    let request = WorkflowRepository::new(state.pool.clone())
        .reschedule(id, &current.user, &input)
        .await?;
    transitioned(&state, "reschedule", "Request rescheduled", request)
}

/// GET /api/approvals/:id/history
pub async fn history(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<ApprovalHistory>> {
    let request = load_request(&state, id).await?;
    ensure_can_view(&current.user, &request)?;

    let history = WorkflowRepository::new(state.pool.clone()).history(id).await?;
    Ok(ApiResponse::ok(history))
}

/// POST /api/approvals/:id/blanket-order
pub async fn blanket_order(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<BlanketOrderInput>,
) -> ApiResult<MaterialRequest> {
    let request = WorkflowRepository::new(state.pool.clone())
        .blanket_order(id, &current.user, &input)
        .await?;
    transitioned(
        &state,
        "blanket_order",
        "Blanket order recorded, quotation stage skipped",
        request,
    )
}

/// POST /api/approvals/:id/proforma
pub async fn proforma(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProformaInput>,
) -> ApiResult<MaterialRequest> {
    let request = WorkflowRepository::new(state.pool.clone())
        .proforma(id, &current.user, &input)
        .await?;
    transitioned(&state, "proforma", "Pro forma invoice submitted", request)
}

/// POST /api/approvals/:id/compliance
pub async fn compliance(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<ComplianceInput>,
) -> ApiResult<MaterialRequest> {
    let request = WorkflowRepository::new(state.pool.clone())
        .compliance(id, &current.user, &input)
        .await?;
    let message = format!("Compliance check recorded, request is now {}", request.workflow_stage.label());
    transitioned(&state, "compliance", &message, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrf_utils::AppConfig;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_transition_is_counted_once() {
        let config = AppConfig::default();
        let pool = PgPoolOptions::new().connect_lazy(&config.database.url).unwrap();
        let state = AppState::new(pool, config).unwrap();

        let Json(body) = transitioned(&state, "approve", "Approved", ()).unwrap();
        assert_eq!(body.message.as_deref(), Some("Approved"));

        let text = state.metrics.encode().unwrap();
        assert!(text.contains(r#"mrf_workflow_transitions_total{action="approve"} 1"#));
    }
}
