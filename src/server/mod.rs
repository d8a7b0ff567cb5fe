//! REST API over [`ExpenseService`](crate::application::ExpenseService).

use std::collections::BTreeMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::application::AppError;

mod expenses;
mod router;
mod stats;

pub use router::{ServerState, router, run, run_with_listener};

pub enum ServerError {
    App(AppError),
    /// Request could not be decoded (bad JSON, query string or path)
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    /// Reason per offending field
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: BTreeMap<&'static str, String>,
}

impl ErrorBody {
    fn message(error: String) -> Self {
        ErrorBody {
            error,
            field: None,
            errors: BTreeMap::new(),
        }
    }
}

fn status_for_app_error(err: &AppError) -> StatusCode {
    match err {
        AppError::InvalidArgument { field: Some(_), .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::InvalidArgument { field: None, .. } => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict { .. } => StatusCode::CONFLICT,
        AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn body_for_app_error(err: AppError) -> ErrorBody {
    match err {
        AppError::Database(db_err) => {
            tracing::error!("database error: {db_err:#}");
            ErrorBody::message("internal server error".to_string())
        }
        AppError::InvalidArgument {
            field,
            reason,
            violations,
        } => ErrorBody {
            error: reason,
            field,
            errors: violations
                .into_iter()
                .map(|err| (err.field, err.reason))
                .collect(),
        },
        other => ErrorBody::message(other.to_string()),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::App(err) => (status_for_app_error(&err), body_for_app_error(err)),
            ServerError::BadRequest(error) => (StatusCode::BAD_REQUEST, ErrorBody::message(error)),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AppError> for ServerError {
    fn from(value: AppError) -> Self {
        Self::App(value)
    }
}
