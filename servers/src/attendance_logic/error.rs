use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lib_common::core::{StoreError, StudentId};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::attendance_logic::auth::AccessDenied;

/// # Application Error
///
/// Every failure a route can report, mapped to a status code and a JSON body
/// carrying an `error_type` and a `message`.
#[derive(Debug, Error)]
pub enum AppError {
    /// The gate rejected the request.
    #[error("{0}")]
    Access(#[from] AccessDenied),

    /// A single student addressed by path does not exist.
    #[error("student {0} not found")]
    StudentNotFound(StudentId),

    /// Part of an attendance sheet named unknown students.
    #[error("students not found: {ids:?}")]
    StudentsNotFound { ids: Vec<StudentId>, recorded: usize },

    /// Part of an attendance sheet could not be persisted. Unknown ids from
    /// the same sheet are reported alongside.
    #[error("attendance not stored for {ids:?}: {detail}")]
    AttendanceStore {
        ids: Vec<StudentId>,
        not_found: Vec<StudentId>,
        recorded: usize,
        detail: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request body or parameters are unusable.
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_json) = match self {
            AppError::Access(denied) => {
                warn!("Access denied: {}", denied);
                let status = match denied {
                    AccessDenied::Missing => StatusCode::UNAUTHORIZED,
                    AccessDenied::Invalid => StatusCode::FORBIDDEN,
                };
                (
                    status,
                    json!({
                        "error_type": "AccessDenied",
                        "message": denied.to_string()
                    }),
                )
            }
            AppError::StudentNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({
                    "error_type": "StudentNotFound",
                    "message": format!("Student {id} not found"),
                    "ids": [id]
                }),
            ),
            AppError::StudentsNotFound { ids, recorded } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error_type": "StudentNotFound",
                    "message": format!("Students not found: {ids:?}"),
                    "ids": ids,
                    "recorded": recorded
                }),
            ),
            AppError::AttendanceStore {
                ids,
                not_found,
                recorded,
                detail,
            } => {
                error!("Attendance store failure for {:?}: {}", ids, detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error_type": "StoreError",
                        "message": "Attendance could not be stored for some students.",
                        "ids": ids,
                        "not_found": not_found,
                        "recorded": recorded,
                        "detail": detail
                    }),
                )
            }
            AppError::Store(e) => {
                error!("Store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error_type": "StoreError",
                        "message": "The student store is unavailable or returned invalid data.",
                        "detail": e.to_string()
                    }),
                )
            }
            AppError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error_type": "InvalidRequest",
                    "message": "The request could not be processed.",
                    "detail": detail
                }),
            ),
        };
        (status, Json(error_json)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_failure_kind() {
        let cases = [
            (AppError::Access(AccessDenied::Missing), StatusCode::UNAUTHORIZED),
            (AppError::Access(AccessDenied::Invalid), StatusCode::FORBIDDEN),
            (AppError::StudentNotFound(3), StatusCode::NOT_FOUND),
            (
                AppError::StudentsNotFound { ids: vec![3], recorded: 1 },
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::AttendanceStore {
                    ids: vec![2],
                    not_found: vec![],
                    recorded: 1,
                    detail: "down".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Store(StoreError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
