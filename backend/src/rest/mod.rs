//! # REST API Layer
//!
//! Thin axum handlers over the domain services. Handlers validate nothing
//! themselves; domain errors are mapped to status codes here and
//! everything else becomes a 500 with a generic message.

pub mod alert_apis;
pub mod budget_apis;
pub mod preferences_apis;
pub mod transaction_apis;

pub use alert_apis::*;
pub use budget_apis::*;
pub use preferences_apis::*;
pub use transaction_apis::*;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use log::error;

use crate::domain::DomainError;
use shared::ApiResponse;


/// Map a domain failure to an HTTP response. Validation failures are 400s,
/// missing entities are 404s, anything unexpected is a 500 that logs the
/// underlying error and tells the caller only the context string.
pub(crate) fn error_response(e: anyhow::Error, context: &str) -> Response {
    match e.downcast_ref::<DomainError>() {
        Some(DomainError::Validation(_)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response(),
        Some(DomainError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response(),
        None => {
            error!("{}: {:#}", context, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error(context)),
            )
                .into_response()
        }
    }
}
