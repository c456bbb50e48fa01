use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::app::AppState;
use crate::app::error::ApiError;
use crate::config::NavConfig;

pub const BAD_CREDENTIALS: &str = "Bad credentials";

/// Lets the request through only when `authorization` is `token <password>`.
/// The password is re-read for every request so rotation needs no restart.
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = match state.config.load().await {
        Ok(config) => config,
        Err(err) => return ApiError::from(err.context("load config for auth")).into_response(),
    };
    if !is_authorized(&config, request.headers()) {
        tracing::debug!(uri = %request.uri(), "rejected request with bad credentials");
        return unauthorized();
    }
    next.run(request).await
}

pub fn is_authorized(config: &NavConfig, headers: &HeaderMap) -> bool {
    let Some(expected) = config.expected_authorization() else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|actual| actual == expected)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "status": 401, "message": BAD_CREDENTIALS })),
    )
        .into_response()
}
