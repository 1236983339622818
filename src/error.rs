use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::report::VisitError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("no such note")]
    NoSuchNote,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("rate limited")]
    RateLimited,
    #[error("visit failed: {0}")]
    Visit(#[from] VisitError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::InvalidParameter => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": "Invalid parameter" }),
            ),
            // Uniform miss payload: absent user, absent shared list, and
            // out-of-range index are indistinguishable to the caller.
            AppError::NoSuchNote => (
                StatusCode::NOT_FOUND,
                json!({ "title": "404 not found", "content": "no such note" }),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": "rate limited" }),
            ),
            AppError::Visit(e) => {
                tracing::error!("report visit failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "failed" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
