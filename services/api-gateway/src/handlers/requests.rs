//! Material request intake, tracking updates, PDF and attachments.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
    Extension,
};
use uuid::Uuid;

use mrf_database::{AttachmentRepository, RequestRepository, UserRepository};
use mrf_models::{
    Attachment, AttachmentCategory, Lookups, MaterialRequest, NewAttachment, NewMaterialRequest,
    QuotationStatus, RequestDetail, RequestFilter, RequestListItem, RequestUpdate, User,
};
use mrf_utils::{
    pdf::render_request_pdf, validate_date_range, validate_file_size, validate_file_type,
    MrfError, MrfResult, ATTACHMENT_TYPES, QUOTATION_TYPES,
};

use super::{created, download, page, today, ApiResponse, ApiResult, PageResult};
use crate::{middleware::CurrentUser, AppState};

/// Workers only see requests they own; managers and admins see all.
pub fn ensure_can_view(user: &User, request: &MaterialRequest) -> MrfResult<()> {
    if user.can_view_all_requests() || request.is_owned_by(user.id) {
        Ok(())
    } else {
        Err(MrfError::authorization("Access denied"))
    }
}

pub(crate) async fn load_request(state: &AppState, id: Uuid) -> MrfResult<MaterialRequest> {
    RequestRepository::new(state.pool.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| MrfError::not_found("Material request"))
}

/// GET /api/requests/lookups
pub async fn lookups() -> ApiResult<Lookups> {
    Ok(ApiResponse::ok(Lookups::standard()))
}

/// POST /api/requests
pub async fn create_request(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<NewMaterialRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RequestDetail>>), MrfError> {
    let errors = input.validation_errors();
    if !errors.is_empty() {
        return Err(MrfError::validation_list(errors));
    }

    let detail = RequestRepository::new(state.pool.clone())
        .create(&input, &current.user)
        .await?;

    if let Err(error) = state
        .notifier
        .notify_new_request(&detail.request, detail.lines.len())
        .await
    {
        tracing::warn!(
            mrf_number = %detail.request.mrf_number,
            error = %format!("{:#}", error),
            "Failed to send new request notification"
        );
    }

    Ok(created(ApiResponse::with_message(
        "Material request created successfully",
        detail,
    )))
}

/// GET /api/requests
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(filter): Query<RequestFilter>,
) -> PageResult<RequestListItem> {
    validate_date_range(filter.from, filter.to)?;

    let requests = RequestRepository::new(state.pool.clone())
        .list(&filter, &current.user)
        .await?;
    Ok(page(requests))
}

/// GET /api/requests/:id
pub async fn get_request(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<RequestDetail> {
    let detail = RequestRepository::new(state.pool.clone())
        .detail(id)
        .await?
        .ok_or_else(|| MrfError::not_found("Material request"))?;
    ensure_can_view(&current.user, &detail.request)?;

    Ok(ApiResponse::ok(detail))
}

/// PUT /api/requests/:id
///
/// Managers and admins update tracking fields; everyone with access may
/// update remarks.
pub async fn update_request(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<RequestUpdate>,
) -> ApiResult<MaterialRequest> {
    let existing = load_request(&state, id).await?;
    ensure_can_view(&current.user, &existing)?;

    let update = if current.user.can_view_all_requests() {
        input
    } else {
        input.remarks_only()
    };
    if update.is_empty() {
        return Err(MrfError::validation("No valid fields to update"));
    }
    if let Some(status) = update.quotation_status.as_deref() {
        if QuotationStatus::normalize(status).is_none() {
            return Err(MrfError::validation("Invalid quotation status"));
        }
    }

    let updated = RequestRepository::new(state.pool.clone())
        .update(id, &update, current.user.id)
        .await?
        .ok_or_else(|| MrfError::not_found("Material request"))?;

    if updated.status != existing.status {
        notify_requester(&state, &updated, existing.status.as_str()).await;
    }

    Ok(ApiResponse::with_message("Request updated successfully", updated))
}

async fn notify_requester(state: &AppState, request: &MaterialRequest, previous_status: &str) {
    let Some(owner) = request.user_id.or(request.created_by) else {
        return;
    };

    let result: anyhow::Result<()> = async {
        match UserRepository::new(state.pool.clone()).find_by_id(owner).await? {
            Some(user) => {
                state
                    .notifier
                    .notify_status_change(request, previous_status, &user.email)
                    .await
            }
            None => Ok(()),
        }
    }
    .await;

    if let Err(error) = result {
        tracing::warn!(
            mrf_number = %request.mrf_number,
            error = %format!("{:#}", error),
            "Failed to send status notification"
        );
    }
}

/// DELETE /api/requests/:id
pub async fn delete_request(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !current.user.is_admin() {
        return Err(MrfError::authorization("Admin access required"));
    }

    let stored_files = RequestRepository::new(state.pool.clone())
        .delete(id, current.user.id)
        .await?
        .ok_or_else(|| MrfError::not_found("Material request"))?;
    state.storage.remove_all(&stored_files).await;

    Ok(ApiResponse::with_message("Request deleted successfully", ()))
}

/// GET /api/requests/:id/pdf
pub async fn download_pdf(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, MrfError> {
    let repo = RequestRepository::new(state.pool.clone());
    let request = load_request(&state, id).await?;
    ensure_can_view(&current.user, &request)?;

    let lines = repo.lines(id).await?;
    let bytes = render_request_pdf(&request, &lines, today())?;

    tracing::info!(mrf_number = %request.mrf_number, size = bytes.len(), "Generated request PDF");
    Ok(download(
        bytes,
        "application/pdf",
        &format!("MRF_{}.pdf", request.mrf_number),
    ))
}

struct Upload {
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

fn upload_error(error: impl std::fmt::Display) -> MrfError {
    MrfError::validation(format!("Failed to read upload: {}", error))
}

/// Splits the multipart body into the file part and the metadata fields.
async fn read_attachment_form(multipart: &mut Multipart) -> MrfResult<(Option<Upload>, NewAttachment)> {
    let mut upload = None;
    let mut meta = NewAttachment::default();

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("attachment").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(upload_error)?.to_vec();
            upload = Some(Upload {
                file_name,
                content_type,
                data,
            });
            continue;
        }

        let value = field.text().await.map_err(upload_error)?;
        let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        match name.as_str() {
            "category" => meta.category = value,
            "status" => meta.status = value,
            "vendor_name" => meta.vendor_name = value,
            "quotation_reference" => meta.quotation_reference = value,
            "currency" => meta.currency = value,
            "notes" => meta.notes = value,
            "quotation_amount" => {
                meta.quotation_amount = value
                    .map(|v| v.parse::<f64>())
                    .transpose()
                    .map_err(|_| MrfError::validation("Quotation amount must be a number"))?;
            }
            _ => {}
        }
    }

    Ok((upload, meta))
}

/// POST /api/requests/:id/attachments
pub async fn upload_attachment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Attachment>>), MrfError> {
    let (upload, meta) = read_attachment_form(&mut multipart).await?;
    let upload = upload.ok_or_else(|| MrfError::validation("No file uploaded"))?;

    let allowed = match meta.category() {
        AttachmentCategory::Quotation => QUOTATION_TYPES,
        AttachmentCategory::General => ATTACHMENT_TYPES,
    };
    validate_file_type(&upload.file_name, allowed)?;
    validate_file_size(upload.data.len() as u64, state.config.storage.max_attachment_bytes)?;

    let request = load_request(&state, id).await?;
    ensure_can_view(&current.user, &request)?;

    let stored = state
        .storage
        .save(&upload.file_name, &upload.content_type, &upload.data)
        .await?;

    let attachment = match AttachmentRepository::new(state.pool.clone())
        .create(id, &meta, &stored, current.user.id)
        .await
    {
        Ok(attachment) => attachment,
        Err(error) => {
            state.storage.remove_all(&[stored.stored_name]).await;
            return Err(error.into());
        }
    };

    tracing::info!(
        mrf_number = %request.mrf_number,
        category = %attachment.category,
        status = %attachment.status,
        "Attachment uploaded"
    );
    Ok(created(ApiResponse::with_message(
        "Attachment uploaded successfully",
        attachment,
    )))
}

/// GET /api/requests/:id/attachments/:attachment_id
pub async fn download_attachment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, MrfError> {
    let request = load_request(&state, id).await?;
    ensure_can_view(&current.user, &request)?;

    let attachment = AttachmentRepository::new(state.pool.clone())
        .find_by_id(attachment_id)
        .await?
        .filter(|attachment| attachment.request_id == id)
        .ok_or_else(|| MrfError::not_found("Attachment"))?;

    let bytes = state.storage.read(&attachment.stored_name).await?;
    Ok(download(bytes, &attachment.content_type, &attachment.file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mrf_models::UserRole;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            user_code: None,
            designation: None,
            department: None,
            location: None,
            role,
            approval_level: 0,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn owned_request(owner: Option<Uuid>) -> MaterialRequest {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "mrf_number": "LAR-MTCE-001-2025",
            "request_date": "2025-03-01",
            "user_id": owner,
            "first_name": "Ada",
            "last_name": "Obi",
            "user_code": "EMP-1",
            "designation": "Technician",
            "office_extension": "",
            "asset": "OBOB",
            "unit_tag": "",
            "discipline": "MECHANICAL",
            "material_category": "",
            "criticality": "High",
            "work_order_no": "",
            "work_order_type": "",
            "reason": "Seal replacement",
            "service_material": "",
            "remarks": null,
            "status": "Pending",
            "status_notes": null,
            "internal_reference": null,
            "action_pending": null,
            "vendor_name": null,
            "blanket_order_number": null,
            "call_off_number": null,
            "purchase_order_no": null,
            "quotation_reference": null,
            "quotation_status": "Not Submitted",
            "quotation_approval_date": null,
            "quotation_amount_usd": null,
            "quotation_amount_eur": null,
            "quotation_amount_ngn": null,
            "estimated_delivery_date": null,
            "actual_delivery_date": null,
            "notes": null,
            "other": null,
            "workflow_stage": "MRF_CREATED",
            "approved_by_supervisor": null,
            "approved_date_supervisor": null,
            "supervisor_comments": null,
            "approved_by_manager": null,
            "approved_date_manager": null,
            "manager_comments": null,
            "approved_by_area_manager": null,
            "approved_date_area_manager": null,
            "area_manager_comments": null,
            "has_blanket_order": false,
            "blanket_order_ref": null,
            "proforma_ref": null,
            "proforma_amount_usd": null,
            "proforma_amount_ngn": null,
            "proforma_date": null,
            "compliance_status": null,
            "compliance_notes": null,
            "rejection_reason": null,
            "rejection_stage": null,
            "rescheduled_date": null,
            "reschedule_reason": null,
            "created_by": null,
            "created_at": Utc::now(),
            "updated_at": Utc::now()
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_workers_only_view_their_own_requests() {
        let worker = user(UserRole::Worker);
        assert!(ensure_can_view(&worker, &owned_request(Some(worker.id))).is_ok());

        let err = ensure_can_view(&worker, &owned_request(Some(Uuid::new_v4()))).unwrap_err();
        assert_eq!(err.http_status_code(), 403);

        let manager = user(UserRole::Manager);
        assert!(ensure_can_view(&manager, &owned_request(None)).is_ok());
    }
}
