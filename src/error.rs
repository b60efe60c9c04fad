use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Upstream bodies echoed back for diagnostics are cut to this many characters.
pub const MAX_DIAGNOSTIC_CHARS: usize = 500;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Forbidden origin")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Too many requests")]
    RateLimited,
    /// Never names the missing setting.
    #[error("Server not configured")]
    NotConfigured,
    /// A local failure that is neither the caller's nor the upstream's fault.
    #[error("Internal server error")]
    Internal,
    #[error("{message}")]
    Upstream {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ApiError::Upstream {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotConfigured | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ErrorResponse {
    pub fn from_api_error(err: &ApiError) -> Self {
        match err {
            ApiError::Upstream {
                message,
                status,
                body,
            } => Self {
                message: message.clone(),
                status: *status,
                body: body.clone(),
            },
            other => Self {
                message: other.to_string(),
                status: None,
                body: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::NotConfigured => tracing::error!("Request rejected: server not configured"),
            ApiError::Internal => tracing::error!("Request failed: internal error"),
            ApiError::Upstream {
                message,
                status: upstream_status,
                ..
            } => tracing::warn!(?upstream_status, "Upstream failure: {}", message),
            other => tracing::debug!(status = %status, "Request rejected: {}", other),
        }

        (status, Json(ErrorResponse::from_api_error(&self))).into_response()
    }
}

/// Truncate to at most `MAX_DIAGNOSTIC_CHARS` characters, on a char boundary.
pub fn truncate_diagnostic(text: &str) -> String {
    text.chars().take(MAX_DIAGNOSTIC_CHARS).collect()
}
