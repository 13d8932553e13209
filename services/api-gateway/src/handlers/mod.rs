//! HTTP handlers, one module per resource.
//!
//! Successful responses use the `{ "success": true, ... }` envelope; errors
//! are rendered by `MrfError` as `{ "error": true, ... }`.

pub mod admin;
pub mod analytics;
pub mod approvals;
pub mod auth;
pub mod exports;
pub mod health;
pub mod imports;
pub mod inventory;
pub mod quotations;
pub mod requests;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use mrf_database::ActivityRepository;
use mrf_models::{NewActivity, Paginated, Pagination};
use mrf_utils::MrfError;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> From<Paginated<T>> for PageResponse<T> {
    fn from(page: Paginated<T>) -> Self {
        Self {
            success: true,
            data: page.data,
            pagination: page.pagination,
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, MrfError>;
pub type PageResult<T> = Result<Json<PageResponse<T>>, MrfError>;

pub fn page<T>(page: Paginated<T>) -> Json<PageResponse<T>> {
    Json(page.into())
}

/// Binary download with a `Content-Disposition: attachment` file name.
pub fn download(bytes: Vec<u8>, content_type: &str, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub fn created<T: Serialize>(body: Json<ApiResponse<T>>) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, body)
}

pub async fn not_found() -> MrfError {
    MrfError::not_found("Route")
}

/// Activity rows are an audit aid; failing to write one never fails the caller.
pub async fn record_activity(state: &AppState, activity: NewActivity) {
    let action = activity.action;
    if let Err(error) = ActivityRepository::new(state.pool.clone()).log(activity).await {
        tracing::warn!(action = %action, error = %format!("{:#}", error), "Failed to record activity");
    }
}

pub fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
