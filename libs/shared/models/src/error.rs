use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub const GENERIC_NETWORK_ERROR: &str = "network error";

/// Classification of a failed call against the clinic backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401. Fatal for the session: polling stops and the user must sign in again.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 409/422. The server refused a transition that passed local validation.
    #[error("Conflict ({status}): {detail}")]
    Conflict { status: u16, detail: String },

    #[error("Request rejected ({status}): {}", .detail.as_deref().unwrap_or(GENERIC_NETWORK_ERROR))]
    Rejected { status: u16, detail: Option<String> },

    /// Timeout, connection failure or 5xx. Retried only by the next scheduled tick.
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ApiError {
    /// The text shown to the user: the server's `detail` verbatim, else a generic message.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized(detail) if !detail.is_empty() => detail.clone(),
            ApiError::Conflict { detail, .. } if !detail.is_empty() => detail.clone(),
            ApiError::Rejected { detail: Some(detail), .. } => detail.clone(),
            _ => GENERIC_NETWORK_ERROR.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }

    /// Failures that only make a view stale; the collection is left untouched.
    pub fn degrades_only(&self) -> bool {
        !self.is_unauthorized()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        let message = err.user_message();
        match err {
            ApiError::Unauthorized(_) => AppError::Auth(message),
            ApiError::Conflict { .. } => AppError::Conflict(message),
            ApiError::Rejected { status: 404, .. } => AppError::NotFound(message),
            ApiError::Rejected { status, .. } if status < 500 => AppError::BadRequest(message),
            _ => AppError::ExternalService(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::ExternalService(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        tracing::error!("Error: {}: {}", status, message);

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_detail() {
        let err = ApiError::Conflict { status: 409, detail: "Consultation already accepted".to_string() };
        assert_eq!(err.user_message(), "Consultation already accepted");

        let err = ApiError::Rejected { status: 403, detail: None };
        assert_eq!(err.user_message(), GENERIC_NETWORK_ERROR);

        let err = ApiError::Transient("connection refused".to_string());
        assert_eq!(err.user_message(), GENERIC_NETWORK_ERROR);
    }

    #[test]
    fn test_only_unauthorized_is_fatal() {
        assert!(!ApiError::Unauthorized(String::new()).degrades_only());
        assert!(ApiError::MalformedResponse("bad".into()).degrades_only());
        assert!(ApiError::Transient("timeout".into()).degrades_only());
    }

    #[test]
    fn test_app_error_mapping() {
        let not_found: AppError = ApiError::Rejected { status: 404, detail: Some("Consultation not found".into()) }.into();
        assert!(matches!(not_found, AppError::NotFound(ref m) if m == "Consultation not found"));

        let upstream: AppError = ApiError::Rejected { status: 503, detail: None }.into();
        assert!(matches!(upstream, AppError::ExternalService(_)));
    }
}
