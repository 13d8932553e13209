//! User management, the activity log and the destructive data reset.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mrf_database::{ActivityRepository, UserRepository};
use mrf_models::{
    ActivityAction, ActivityFilter, ActivityLog, CreateUser, DashboardStats, NewActivity,
    ResetPassword, UpdateUser, User, UserFilter,
};
use mrf_utils::{security::hash_password, validate_model, MrfError};

use super::{created, page, record_activity, ApiResponse, ApiResult, PageResult};
use crate::{middleware::CurrentUser, AppState};

pub const DELETE_CONFIRMATION: &str = "DELETE_ALL_DATA";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusUpdate {
    #[serde(alias = "is_active")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PurgeConfirmation {
    pub confirm: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResult {
    pub requests_deleted: u64,
    pub files_deleted: usize,
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> PageResult<User> {
    Ok(page(UserRepository::new(state.pool.clone()).list(&filter).await?))
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), MrfError> {
    validate_model(&input)?;
    let users = UserRepository::new(state.pool.clone());

    if users.find_by_email(&input.profile.email).await?.is_some() {
        return Err(MrfError::conflict("Email already registered"));
    }

    let user = users
        .create(
            &input.profile,
            &hash_password(&input.profile.password)?,
            input.role,
            input.approval_level,
        )
        .await?;

    record_activity(
        &state,
        NewActivity::new(current.user.id, ActivityAction::UserCreated)
            .on("user", user.id)
            .details(format!("Created user {} as {}", user.email, user.role)),
    )
    .await;

    Ok(created(ApiResponse::with_message("User created successfully", user)))
}

/// PUT /api/admin/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUser>,
) -> ApiResult<User> {
    validate_model(&input)?;

    let user = UserRepository::new(state.pool.clone())
        .update(id, &input)
        .await?
        .ok_or_else(|| MrfError::not_found("User"))?;

    record_activity(
        &state,
        NewActivity::new(current.user.id, ActivityAction::UserUpdated)
            .on("user", user.id)
            .details(format!("Updated user {}", user.email)),
    )
    .await;

    Ok(ApiResponse::with_message("User updated successfully", user))
}

/// PUT /api/admin/users/:id/status
pub async fn set_user_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UserStatusUpdate>,
) -> ApiResult<User> {
    if id == current.user.id && !input.is_active {
        return Err(MrfError::validation("You cannot deactivate your own account"));
    }

    let user = UserRepository::new(state.pool.clone())
        .set_active(id, input.is_active)
        .await?
        .ok_or_else(|| MrfError::not_found("User"))?;

    let status = if user.is_active { "activated" } else { "deactivated" };
    record_activity(
        &state,
        NewActivity::new(current.user.id, ActivityAction::UserUpdated)
            .on("user", user.id)
            .details(format!("User {} {}", user.email, status)),
    )
    .await;

    Ok(ApiResponse::with_message(format!("User {}", status), user))
}

/// PUT /api/admin/users/:id/password
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<ResetPassword>,
) -> ApiResult<()> {
    validate_model(&input)?;

    let updated = UserRepository::new(state.pool.clone())
        .set_password(id, &hash_password(&input.new_password)?)
        .await?;
    if !updated {
        return Err(MrfError::not_found("User"));
    }

    record_activity(
        &state,
        NewActivity::new(current.user.id, ActivityAction::PasswordReset).on("user", id),
    )
    .await;

    Ok(ApiResponse::with_message("Password reset successfully", ()))
}

/// GET /api/admin/activity-logs
pub async fn activity_logs(
    State(state): State<AppState>,
    Query(filter): Query<ActivityFilter>,
) -> PageResult<ActivityLog> {
    Ok(page(ActivityRepository::new(state.pool.clone()).list(&filter).await?))
}

/// GET /api/admin/dashboard-stats
pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let stats = ActivityRepository::new(state.pool.clone()).dashboard_stats().await?;
    Ok(ApiResponse::ok(stats))
}

pub fn check_confirmation(confirmation: &PurgeConfirmation) -> Result<(), MrfError> {
    match confirmation.confirm.as_deref() {
        Some(DELETE_CONFIRMATION) => Ok(()),
        _ => Err(MrfError::validation(format!(
            "Confirmation required: send confirm={}",
            DELETE_CONFIRMATION
        ))),
    }
}

/// DELETE /api/admin/delete-all-data?confirm=DELETE_ALL_DATA
///
/// Removes every request and its attachments, history and import jobs.
/// Users and inventory are kept.
pub async fn delete_all_data(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(confirmation): Query<PurgeConfirmation>,
) -> ApiResult<PurgeResult> {
    check_confirmation(&confirmation)?;

    let summary = ActivityRepository::new(state.pool.clone())
        .purge_request_data(current.user.id)
        .await?;
    let files_deleted = state.storage.remove_all(&summary.stored_files).await;

    tracing::warn!(
        user_id = %current.user.id,
        requests = summary.requests_deleted,
        files = files_deleted,
        "All request data deleted by admin"
    );

    Ok(ApiResponse::with_message(
        "All material request data deleted",
        PurgeResult {
            requests_deleted: summary.requests_deleted,
            files_deleted,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_requires_exact_confirmation() {
        let ok = PurgeConfirmation {
            confirm: Some(DELETE_CONFIRMATION.to_string()),
        };
        assert!(check_confirmation(&ok).is_ok());

        for value in [None, Some("delete_all_data".to_string()), Some(String::new())] {
            let err = check_confirmation(&PurgeConfirmation { confirm: value }).unwrap_err();
            assert_eq!(err.http_status_code(), 400);
        }
    }
}
