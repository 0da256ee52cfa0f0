//! Error types for the cache store
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::cache::Unprocessed;
use crate::models::ErrorResponse;
use crate::provider::ProviderError;

// == Cache Error Enum ==
/// Unified error type for the cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache key cannot be mapped to the table's key attributes
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Key pattern is not `<partition>+<prefix>*`
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A batch chunk still had unprocessed items when its attempts ran out
    #[error("Unprocessed data after {attempts} attempts: {} items remaining", .remaining.count())]
    UnprocessedData {
        attempts: u32,
        remaining: Unprocessed,
    },

    /// The table call itself failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Value could not be converted to or from attributes
    #[error("Codec error: {0}")]
    Codec(String),

    /// Key not present (used by the HTTP layer)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::MalformedKey(_)
            | CacheError::InvalidPattern(_)
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::UnprocessedData { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Provider(_) => StatusCode::BAD_GATEWAY,
            CacheError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache store.
pub type Result<T> = std::result::Result<T, CacheError>;
