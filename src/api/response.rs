use serde::Serialize;
use axum::Json;
use axum::http::StatusCode;
use chrono::Utc;

use crate::error::AppError;

/// Every `/api` answer: `data` on success, `meta.message` on failure. Never both.
pub type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub meta: ResponseMeta,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    pub status: &'static str,
    pub status_code: u16,
    pub timestamp: String,
    pub message: Option<String>,
}

impl ResponseMeta {
    fn new(code: StatusCode, message: Option<String>) -> Self {
        ResponseMeta {
            status: if code.is_success() { "success" } else { "error" },
            status_code: code.as_u16(),
            timestamp: Utc::now().to_rfc3339(),
            message,
        }
    }
}

fn reply<T>(code: StatusCode, data: Option<T>, message: Option<String>) -> Reply<T> {
    let meta = ResponseMeta::new(code, message);
    (code, Json(ApiResponse { data, meta }))
}

pub fn success<T: Serialize>(data: T) -> Reply<T> {
    reply(StatusCode::OK, Some(data), None)
}

pub fn error<T>(code: StatusCode, message: String) -> Reply<T> {
    reply(code, None, Some(message))
}

pub fn from_error<T>(err: &AppError) -> Reply<T> {
    error(err.status_code(), err.to_string())
}
