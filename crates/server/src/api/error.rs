//! Mapping of pipeline failures onto HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use audiograb_core::{ErrorClass, PipelineError};

/// Seconds a rejected client is asked to wait before retrying.
const RETRY_AFTER_SECS: u64 = 30;

/// Error body returned by every API endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: &'static str,
    pub class: ErrorClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A pipeline failure on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self(PipelineError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0.class() {
            ErrorClass::TryLater => StatusCode::TOO_MANY_REQUESTS,
            ErrorClass::Rejected => StatusCode::BAD_REQUEST,
            ErrorClass::Transient => StatusCode::BAD_GATEWAY,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            success: false,
            error: self.0.to_string(),
            kind: self.0.kind(),
            class: self.0.class(),
            detail: self.0.tool_detail().map(str::to_string),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}
