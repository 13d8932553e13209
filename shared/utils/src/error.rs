use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mrf_models::WorkflowError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum MrfError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Validation failed: {}", messages.join("; "))]
    Validation { messages: Vec<String> },

    #[error("{message}")]
    Workflow { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Insufficient stock for {material}")]
    InsufficientStock { material: String },

    #[error("Import error: {message}")]
    Import { message: String },

    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl MrfError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            messages: vec![message.into()],
        }
    }

    pub fn validation_list(messages: Vec<String>) -> Self {
        Self::Validation { messages }
    }

    pub fn workflow(message: impl Into<String>) -> Self {
        Self::Workflow {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn import(message: impl Into<String>) -> Self {
        Self::Import {
            message: message.into(),
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Workflow { .. } => "WORKFLOW_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Authorization { .. } => "AUTHORIZATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::Import { .. } => "IMPORT_ERROR",
            Self::Export { .. } => "EXPORT_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Database { .. } => 500,
            Self::Validation { .. } => 400,
            Self::Workflow { .. } => 400,
            Self::Authentication { .. } => 401,
            Self::Authorization { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::InsufficientStock { .. } => 409,
            Self::Import { .. } => 400,
            Self::Export { .. } => 500,
            Self::Storage { .. } => 500,
            Self::Configuration { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.http_status_code() >= 500
    }
}

pub type MrfResult<T> = Result<T, MrfError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
}

const GENERIC_SERVER_ERROR: &str = "Internal server error";

impl From<&MrfError> for ErrorResponse {
    fn from(error: &MrfError) -> Self {
        let (message, errors) = match error {
            MrfError::Validation { messages } => {
                ("Validation failed".to_string(), messages.clone())
            }
            e if e.is_server_error() => (GENERIC_SERVER_ERROR.to_string(), Vec::new()),
            e => (e.to_string(), Vec::new()),
        };

        Self {
            error: true,
            code: error.error_code().to_string(),
            message,
            errors,
        }
    }
}

impl IntoResponse for MrfError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "Request rejected");
        }

        let status =
            StatusCode::from_u16(self.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

// Conversion from common error types
impl From<sqlx::Error> for MrfError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => Self::not_found("record"),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                Self::conflict(db.message().to_string())
            }
            _ => Self::database(error.to_string()),
        }
    }
}

impl From<anyhow::Error> for MrfError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<MrfError>() {
            Ok(inner) => inner,
            Err(error) => match error.downcast::<sqlx::Error>() {
                Ok(sqlx_error) => sqlx_error.into(),
                Err(error) => Self::internal(format!("{:#}", error)),
            },
        }
    }
}

impl From<WorkflowError> for MrfError {
    fn from(error: WorkflowError) -> Self {
        Self::workflow(error.to_string())
    }
}

impl From<serde_json::Error> for MrfError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation(error.to_string())
    }
}

impl From<std::io::Error> for MrfError {
    fn from(error: std::io::Error) -> Self {
        Self::storage(error.to_string())
    }
}

impl From<csv::Error> for MrfError {
    fn from(error: csv::Error) -> Self {
        Self::import(error.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for MrfError {
    fn from(error: rust_xlsxwriter::XlsxError) -> Self {
        Self::export(error.to_string())
    }
}

impl From<lopdf::Error> for MrfError {
    fn from(error: lopdf::Error) -> Self {
        Self::export(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(MrfError::validation("x").http_status_code(), 400);
        assert_eq!(MrfError::workflow("x").http_status_code(), 400);
        assert_eq!(
            MrfError::InsufficientStock { material: "Gasket".into() }.http_status_code(),
            409
        );
        assert_eq!(MrfError::database("down").http_status_code(), 500);
    }

    #[test]
    fn test_validation_response_lists_messages() {
        let error = MrfError::validation_list(vec![
            "First name is required".into(),
            "Line 1: Quantity must be greater than 0".into(),
        ]);
        let body = ErrorResponse::from(&error);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.errors.len(), 2);
    }

    #[test]
    fn test_server_errors_are_masked() {
        let error = MrfError::database("password authentication failed for user mrf");
        let body = ErrorResponse::from(&error);
        assert_eq!(body.message, "Internal server error");
        assert!(body.errors.is_empty());
    }

    #[test]
    fn test_workflow_error_message_passes_through() {
        let error: MrfError = WorkflowError::ReasonTooShort.into();
        assert_eq!(
            ErrorResponse::from(&error).message,
            "Rejection reason must be at least 10 characters"
        );
    }

    #[test]
    fn test_anyhow_unwraps_domain_errors() {
        let wrapped = anyhow::Error::new(MrfError::not_found("Request"));
        let error: MrfError = wrapped.into();
        assert_eq!(error.http_status_code(), 404);

        let error: MrfError = anyhow::anyhow!("boom").into();
        assert_eq!(error.error_code(), "INTERNAL_SERVER_ERROR");
    }

    #[test]
    fn test_into_response_status() {
        let response = MrfError::authentication("Missing authorization header").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
