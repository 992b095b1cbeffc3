//! JSON response envelopes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata attached to every envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
        }
    }
}

/// Success body: `{status, statusCode, message, data, meta}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBody<T> {
    pub status: bool,
    pub status_code: u16,
    pub message: String,
    pub data: T,
    pub meta: Meta,
}

/// Failure body: `{status: false, statusCode, message, meta}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: bool,
    pub status_code: u16,
    pub message: String,
    pub meta: Meta,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: false,
            status_code: status.as_u16(),
            message: message.into(),
            meta: Meta::now(),
        }
    }
}

/// A successful response wrapped in the success envelope.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message: &'static str,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: &'static str, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message,
            data,
        }
    }

    pub fn created(message: &'static str, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            status: true,
            status_code: self.status.as_u16(),
            message: self.message.to_string(),
            data: self.data,
            meta: Meta::now(),
        };
        (self.status, Json(body)).into_response()
    }
}
