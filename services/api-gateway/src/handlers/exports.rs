//! Tracker export and the import template.

use axum::{
    extract::{Query, State},
    response::Response,
    Extension,
};

use mrf_database::RequestRepository;
use mrf_models::{ActivityAction, ExportFilter, NewActivity};
use mrf_utils::{
    spreadsheet::{export_file_name, import_template, write_csv, write_xlsx, ExportFormat},
    validate_date_range, MrfError,
};

use super::{download, record_activity, today};
use crate::{middleware::CurrentUser, AppState};

const EXPORT_SHEET: &str = "MRF Export";
const TEMPLATE_FILE: &str = "MRF_Import_Template.xlsx";

/// GET /api/exports
pub async fn export_requests(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(filter): Query<ExportFilter>,
) -> Result<Response, MrfError> {
    validate_date_range(filter.from, filter.to)?;

    let rows = RequestRepository::new(state.pool.clone())
        .export_rows(&filter)
        .await?;
    if rows.is_empty() {
        return Err(MrfError::not_found("No data found for export"));
    }

    let format = ExportFormat::parse(filter.format.as_deref());
    let bytes = match format {
        ExportFormat::Xlsx => write_xlsx(&rows, EXPORT_SHEET)?,
        ExportFormat::Csv => write_csv(&rows)?,
    };
    let file_name = export_file_name(filter.location.as_deref(), &format, today());

    record_activity(
        &state,
        NewActivity::new(current.user.id, ActivityAction::DataExported)
            .details(format!("Exported {} requests to {}", rows.len(), file_name)),
    )
    .await;
    tracing::info!(rows = rows.len(), file_name = %file_name, "Export generated");

    Ok(download(bytes, format.content_type(), &file_name))
}

/// GET /api/exports/template
pub async fn download_template() -> Result<Response, MrfError> {
    let bytes = import_template()?;
    Ok(download(bytes, ExportFormat::Xlsx.content_type(), TEMPLATE_FILE))
}
