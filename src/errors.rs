use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("File not found")]
    FileNotFound,

    #[error("File with the same name already exists")]
    DuplicateFile,

    #[error("Storage limit exceeded")]
    QuotaExceeded,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Metadata store did not answer within {0:?}")]
    StoreTimeout(std::time::Duration),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateFile | AppError::QuotaExceeded => {
                StatusCode::BAD_REQUEST
            }
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound | AppError::FileNotFound => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::Io(_)
            | AppError::Storage(_)
            | AppError::Metadata(_)
            | AppError::StoreTimeout(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for the `errors_total` metric.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Io(_) => "io",
            AppError::Auth(_) => "auth",
            AppError::Validation(_) => "validation",
            AppError::UserNotFound => "user_not_found",
            AppError::FileNotFound => "file_not_found",
            AppError::DuplicateFile => "duplicate_file",
            AppError::QuotaExceeded => "quota_exceeded",
            AppError::Storage(_) => "storage",
            AppError::Metadata(_) => "metadata",
            AppError::StoreTimeout(_) => "store_timeout",
            AppError::Internal(_) => "internal",
        }
    }
}

/// Attached to error responses so the metrics layer can count by class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorKind(pub &'static str);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = ErrorKind(self.kind());
        let error_message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }
            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                "IO error".to_string()
            }
            AppError::Auth(ref msg) => msg.clone(),
            AppError::Validation(ref msg) => msg.clone(),
            AppError::Storage(ref msg) => {
                tracing::error!("Storage error: {}", msg);
                "Storage error".to_string()
            }
            AppError::Metadata(ref msg) => {
                tracing::error!("Metadata error: {}", msg);
                "Failed to save file metadata".to_string()
            }
            AppError::StoreTimeout(ref limit) => {
                tracing::error!("Metadata store timed out after {:?}", limit);
                "Database error".to_string()
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            AppError::UserNotFound
            | AppError::FileNotFound
            | AppError::DuplicateFile
            | AppError::QuotaExceeded => self.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(kind);
        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
