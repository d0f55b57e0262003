use lambda_http::http::StatusCode;
use thiserror::Error;

/// Error taxonomy surfaced on the wire as `{ "error": <code>, "message": ... }`.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Storage(String),
    #[error("{0}")]
    Persistence(String),
    #[error("{message}")]
    Deletion { storage_deleted: bool, message: String },
}

impl PortalError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::Authentication(_) => StatusCode::UNAUTHORIZED,
            PortalError::Authorization(_) => StatusCode::FORBIDDEN,
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Storage(_) | PortalError::Persistence(_) | PortalError::Deletion { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PortalError::Authentication(_) => "AuthenticationError",
            PortalError::Authorization(_) => "AuthorizationError",
            PortalError::Validation(_) => "ValidationError",
            PortalError::NotFound(_) => "NotFoundError",
            PortalError::Storage(_) => "StorageError",
            PortalError::Persistence(_) => "PersistenceError",
            PortalError::Deletion { .. } => "DeletionError",
        }
    }
}
