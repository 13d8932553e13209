//! Spreadsheet import of historical requests.

use axum::{
    extract::{Multipart, Path, State},
    Extension,
};
use uuid::Uuid;

use mrf_database::ImportRepository;
use mrf_models::{DuplicateStrategy, ImportJob, ImportSummary};
use mrf_utils::{
    spreadsheet::{parse_import, ParsedImport},
    validate_file_size, validate_file_type, MrfError, MrfResult, IMPORT_TYPES,
};

use super::{today, ApiResponse, ApiResult};
use crate::{middleware::CurrentUser, AppState};

struct ImportUpload {
    file_name: String,
    data: Vec<u8>,
    strategy: DuplicateStrategy,
}

fn upload_error(error: impl std::fmt::Display) -> MrfError {
    MrfError::validation(format!("Failed to read upload: {}", error))
}

async fn read_import_form(multipart: &mut Multipart) -> MrfResult<ImportUpload> {
    let mut file = None;
    let mut strategy = DuplicateStrategy::default();

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("import.xlsx").to_string();
                let data = field.bytes().await.map_err(upload_error)?.to_vec();
                file = Some((file_name, data));
            }
            "duplicateStrategy" | "duplicate_strategy" => {
                let value = field.text().await.map_err(upload_error)?;
                strategy = DuplicateStrategy::parse(Some(&value));
            }
            _ => {}
        }
    }

    let (file_name, data) = file.ok_or_else(|| MrfError::validation("No file uploaded"))?;
    Ok(ImportUpload {
        file_name,
        data,
        strategy,
    })
}

/// POST /api/imports/process
pub async fn process_import(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<ImportSummary> {
    let upload = read_import_form(&mut multipart).await?;
    validate_file_type(&upload.file_name, IMPORT_TYPES)?;
    validate_file_size(upload.data.len() as u64, state.config.storage.max_import_bytes)?;

    let repo = ImportRepository::new(state.pool.clone());
    let file_name = upload.file_name.clone();
    let parsed: MrfResult<ParsedImport> =
        tokio::task::spawn_blocking(move || parse_import(&upload.file_name, &upload.data, today()))
            .await
            .map_err(|e| MrfError::internal(format!("Import parser panicked: {}", e)))?;

    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(error) => {
            let job = repo
                .create_job(&file_name, current.user.id, upload.strategy, &serde_json::json!({}))
                .await?;
            repo.mark_failed(job.id, &error.to_string()).await?;
            tracing::warn!(job_id = %job.id, file_name = %file_name, error = %error, "Import rejected");
            return Err(error);
        }
    };

    let job = repo
        .create_job(&file_name, current.user.id, upload.strategy, &parsed.mapping.to_json())
        .await?;
    tracing::info!(
        job_id = %job.id,
        file_name = %file_name,
        requests = parsed.requests.len(),
        "Import started"
    );

    let summary = repo
        .import_requests(
            &job,
            current.user.id,
            &parsed.requests,
            upload.strategy,
            parsed.errors,
            parsed.total_rows,
        )
        .await?;

    let message = format!(
        "Imported {} of {} rows ({} failed)",
        summary.successful, summary.total_rows, summary.failed
    );
    Ok(ApiResponse::with_message(message, summary))
}

/// GET /api/imports/status/:job_id
pub async fn import_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<ImportJob> {
    let job = ImportRepository::new(state.pool.clone())
        .job(job_id)
        .await?
        .ok_or_else(|| MrfError::not_found("Import job"))?;
    Ok(ApiResponse::ok(job))
}

/// GET /api/imports/history
pub async fn import_history(State(state): State<AppState>) -> ApiResult<Vec<ImportJob>> {
    let jobs = ImportRepository::new(state.pool.clone()).history().await?;
    Ok(ApiResponse::ok(jobs))
}
