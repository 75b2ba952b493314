use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy for the vector store domain.
///
/// Upstream failures are carried as tagged variants rather than
/// provider-specific error types, so HTTP mapping stays
/// provider-agnostic.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Vector store {0} not found")]
    StoreNotFound(Uuid),

    #[error("File {0} not found")]
    FileNotFound(Uuid),

    #[error("Document parsing failed: {0}")]
    Parse(String),

    #[error("Embedding provider failed: {0}")]
    Embedding(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, VectorStoreError>;

impl From<qdrant_client::QdrantError> for VectorStoreError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        VectorStoreError::Upstream(format!("qdrant: {}", err))
    }
}

impl From<serde_json::Error> for VectorStoreError {
    fn from(err: serde_json::Error) -> Self {
        VectorStoreError::Internal(format!("JSON error: {}", err))
    }
}

/// Convert VectorStoreError to AppError for standardized HTTP error responses
impl From<VectorStoreError> for AppError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::InvalidArgument(msg) => AppError::BadRequest(msg),
            VectorStoreError::StoreNotFound(id) => {
                AppError::NotFound(format!("Vector store {} not found", id))
            }
            VectorStoreError::FileNotFound(id) => {
                AppError::NotFound(format!("File {} not found", id))
            }
            VectorStoreError::Parse(msg) => {
                AppError::UnprocessableEntity(format!("Document parsing failed: {}", msg))
            }
            VectorStoreError::Embedding(msg) => {
                AppError::BadGateway(format!("Embedding provider failed: {}", msg))
            }
            VectorStoreError::Upstream(msg) => {
                AppError::BadGateway(format!("Upstream failure: {}", msg))
            }
            VectorStoreError::Consistency(msg) => {
                AppError::InternalServerError(format!("Consistency violation: {}", msg))
            }
            VectorStoreError::Config(msg) => {
                AppError::InternalServerError(format!("Configuration error: {}", msg))
            }
            VectorStoreError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for VectorStoreError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
