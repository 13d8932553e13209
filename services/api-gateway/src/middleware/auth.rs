use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use mrf_database::UserRepository;
use mrf_models::User;
use mrf_utils::{security::hash_token, MrfError};

use crate::AppState;

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token_hash: String,
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, MrfError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| MrfError::authentication("Missing authorization header"))?;

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(MrfError::authentication("Invalid authorization header format")),
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, MrfError> {
    let token_hash = hash_token(bearer_token(request.headers())?);

    let user = UserRepository::new(state.pool.clone())
        .find_by_session(&token_hash)
        .await?
        .ok_or_else(|| MrfError::authentication("Invalid or expired token"))?;

    request.extensions_mut().insert(CurrentUser { user, token_hash });
    Ok(next.run(request).await)
}

/// Runs after `auth_middleware`; rejects anyone but admins.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, MrfError> {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .map(|current| current.user.is_admin())
        .ok_or_else(|| MrfError::authentication("Authentication required"))?;

    if !is_admin {
        return Err(MrfError::authorization("Admin access required"));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            bearer_token(&headers).unwrap_err().to_string(),
            "Authentication error: Missing authorization header"
        );

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc123");
    }
}
