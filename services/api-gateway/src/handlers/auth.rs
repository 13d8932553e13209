//! Registration, login and the caller's own profile.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{Duration, Utc};

use mrf_database::UserRepository;
use mrf_models::{
    ActivityAction, ChangePassword, LoginRequest, LoginResponse, NewActivity, RegisterUser,
    UpdateUser, User, UserRole,
};
use mrf_utils::{
    security::{generate_token, hash_password, hash_token, verify_password},
    validate_model, MrfError,
};

use super::{created, record_activity, ApiResponse, ApiResult};
use crate::{middleware::CurrentUser, AppState};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterUser>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), MrfError> {
    validate_model(&input)?;
    let users = UserRepository::new(state.pool.clone());

    if users.find_by_email(&input.email).await?.is_some() {
        return Err(MrfError::conflict("Email already registered"));
    }

    let user = users
        .create(&input, &hash_password(&input.password)?, UserRole::Worker, 0)
        .await?;

    record_activity(
        &state,
        NewActivity::new(user.id, ActivityAction::Register)
            .on("user", user.id)
            .details(format!("New user registered: {}", user.email)),
    )
    .await;
    tracing::info!(user_id = %user.id, "User registered");

    Ok(created(ApiResponse::with_message("User registered successfully", user)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    if input.email.trim().is_empty() || input.password.is_empty() {
        return Err(MrfError::validation("Email and password are required"));
    }

    let users = UserRepository::new(state.pool.clone());
    let user = users
        .find_by_email(&input.email)
        .await?
        .filter(|user| verify_password(&input.password, &user.password_hash))
        .ok_or_else(|| MrfError::authentication(INVALID_CREDENTIALS))?;

    if !user.is_active {
        return Err(MrfError::authentication("Account is deactivated"));
    }

    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(state.config.auth.token_ttl_hours);
    users.create_session(user.id, &hash_token(&token), expires_at).await?;
    users.record_login(user.id).await?;

    record_activity(&state, NewActivity::new(user.id, ActivityAction::Login).on("user", user.id)).await;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(ApiResponse::with_message(
        "Login successful",
        LoginResponse {
            token,
            expires_at,
            user,
        },
    ))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<()> {
    UserRepository::new(state.pool.clone())
        .delete_session(&current.token_hash)
        .await?;
    record_activity(&state, NewActivity::new(current.user.id, ActivityAction::Logout)).await;

    Ok(ApiResponse::with_message("Logged out", ()))
}

/// GET /api/auth/profile
pub async fn get_profile(Extension(current): Extension<CurrentUser>) -> ApiResult<User> {
    Ok(ApiResponse::ok(current.user))
}

/// PUT /api/auth/profile
///
/// Role and approval level are ignored here; only admins change those.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<UpdateUser>,
) -> ApiResult<User> {
    let update = input.profile_only();
    validate_model(&update)?;

    let user = UserRepository::new(state.pool.clone())
        .update(current.user.id, &update)
        .await?
        .ok_or_else(|| MrfError::not_found("User"))?;

    record_activity(
        &state,
        NewActivity::new(user.id, ActivityAction::ProfileUpdated).on("user", user.id),
    )
    .await;

    Ok(ApiResponse::with_message("Profile updated successfully", user))
}

/// PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<ChangePassword>,
) -> ApiResult<()> {
    validate_model(&input)?;
    if !verify_password(&input.current_password, &current.user.password_hash) {
        return Err(MrfError::authentication("Current password is incorrect"));
    }

    UserRepository::new(state.pool.clone())
        .set_password(current.user.id, &hash_password(&input.new_password)?)
        .await?;

    record_activity(
        &state,
        NewActivity::new(current.user.id, ActivityAction::PasswordChanged).on("user", current.user.id),
    )
    .await;

    Ok(ApiResponse::with_message("Password changed successfully", ()))
}
