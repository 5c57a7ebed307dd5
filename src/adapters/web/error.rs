//! JSON error responses for the web adapter.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::MarketError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub detail: String,
}

impl WebError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

pub fn status_from_error(err: &MarketError) -> StatusCode {
    match err {
        MarketError::InvalidRequest { .. }
        | MarketError::InvalidRange { .. }
        | MarketError::InvalidSymbol { .. }
        | MarketError::InvalidThreshold { .. }
        | MarketError::InvalidQuantityOrPrice { .. } => StatusCode::BAD_REQUEST,
        MarketError::NotFound { .. }
        | MarketError::MissingPosition { .. }
        | MarketError::NoDataForSymbol { .. } => StatusCode::NOT_FOUND,
        MarketError::MissingPrice { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MarketError::ConfigMissing { .. }
        | MarketError::ConfigInvalid { .. }
        | MarketError::ConfigParse { .. } => StatusCode::BAD_REQUEST,
        MarketError::Database { .. } | MarketError::DatabaseQuery { .. } | MarketError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<MarketError> for WebError {
    fn from(err: MarketError) -> Self {
        if err.is_client_error() {
            tracing::debug!(error = %err, "request rejected");
        } else {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status_from_error(&err), err.to_string())
    }
}

impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for WebError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
