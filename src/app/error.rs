use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::RejectedContent;

/// Handler error rendered as `{"message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: anyhow::Error,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        let error = err.into();
        let status = if error.downcast_ref::<RejectedContent>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self { status, error }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = format!("{:#}", self.error);
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{message}");
        } else {
            tracing::debug!(status = %self.status, "{message}");
        }
        (self.status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context as _;

    use super::*;

    #[test]
    fn rejected_content_maps_to_bad_request_through_context() {
        let err: anyhow::Result<()> = Err(RejectedContent("bad path".to_string()).into());
        let api: ApiError = err.context("upload").unwrap_err().into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_errors_are_server_errors() {
        let api: ApiError = anyhow::anyhow!("disk full").into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
