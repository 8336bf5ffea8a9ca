// Maps failures to HTTP responses
use crate::domain::error::CleanerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<CleanerError> for ApiError {
    fn from(err: CleanerError) -> Self {
        let status = match &err {
            CleanerError::InvalidTimeRange(_)
            | CleanerError::InvalidBounds { .. }
            | CleanerError::InvalidSelection(_) => StatusCode::BAD_REQUEST,
            CleanerError::UnknownEntity(_) => StatusCode::NOT_FOUND,
            CleanerError::MissingNeighborValue { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CleanerError::StoreUnavailable(_)
            | CleanerError::QueryFailed(_)
            | CleanerError::WriteRejected { .. } => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<CleanerError>() {
            Some(cleaner) => cleaner.clone().into(),
            None => {
                tracing::error!(error = %format!("{:#}", err), "internal error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<StatusCode> for ApiError {
    fn from(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("error"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(status = %self.status, "{}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: ApiError = CleanerError::InvalidBounds { min: 2.0, max: 1.0 }.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = anyhow::Error::from(CleanerError::QueryFailed("boom".to_string())).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.message, "Query failed: boom");

        let err: ApiError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
