//! Attendance routes: marking a sheet, the date views, reset and backup.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::attendance_logic::error::AppError;
use crate::attendance_logic::model::{
    AttendanceRequest, AttendanceView, Backup, DateFilterRequest, message, parse_body, validate_date,
};
use crate::attendance_logic::state::AppState;

/// `POST /api/v1/student/attendance`
///
/// Applies the sheet, then dispatches the streak notifications produced by
/// the ids that were stored, even when other ids failed.
pub async fn record_attendance(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, AppError> {
    let request: AttendanceRequest = parse_body(&body)?;
    validate_date(&request.date)?;
    info!(date = %request.date, ids = ?request.ids, "attendance sheet received");

    let outcome = state.accumulator.record_attendance(&request.date, &request.ids).await;
    state.notifier.dispatch(&outcome.events);

    let recorded = outcome.recorded.len();
    let missing = outcome.not_found();
    if let Some((ids, detail)) = outcome.store_failures() {
        return Err(AppError::AttendanceStore {
            ids,
            not_found: missing,
            recorded,
            detail,
        });
    }
    if !missing.is_empty() {
        return Err(AppError::StudentsNotFound { ids: missing, recorded });
    }
    Ok(message(StatusCode::CREATED, "Attendance updated successfully"))
}

/// `POST /api/v1/student/attendance/date`
///
/// With a date: the students who attended that day, without their date
/// history. Without one: every student with their most recent dates.
pub async fn attendance_by_date(State(state): State<AppState>, body: Bytes) -> Result<Json<Vec<AttendanceView>>, AppError> {
    let filter: DateFilterRequest = if body.iter().all(u8::is_ascii_whitespace) {
        DateFilterRequest::default()
    } else {
        parse_body(&body)?
    };
    let students = state.students.list().await?;

    let views = match filter.date.filter(|d| !d.is_empty()) {
        Some(date) => {
            validate_date(&date)?;
            students
                .into_iter()
                .filter(|s| s.dates.iter().any(|d| *d == date))
                .map(AttendanceView::without_dates)
                .collect()
        }
        None => students.into_iter().map(AttendanceView::with_recent_dates).collect(),
    };
    Ok(Json(views))
}

/// `DELETE /api/v1/student/attendance`
pub async fn reset_attendance(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.accumulator.reset_all().await?;
    Ok(message(StatusCode::OK, "Attendance reset successfully."))
}

/// `GET /api/v1/student/attendance/backup`
pub async fn export_backup(State(state): State<AppState>) -> Result<Json<Backup>, AppError> {
    let students = state.students.list().await?;
    info!(students = students.len(), "backup exported");
    Ok(Json(Backup { students }))
}

/// `POST /api/v1/student/attendance/backup`
///
/// Replaces every student with the payload. Counters that disagree with
/// `total` are re-derived before storing.
pub async fn import_backup(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, AppError> {
    let Backup { mut students } = parse_body(&body)?;

    let mut seen = HashSet::new();
    if let Some(dup) = students.iter().find(|s| !seen.insert(s.id)) {
        return Err(AppError::BadRequest(format!("duplicate student id {} in backup", dup.id)));
    }
    for student in &mut students {
        if student.normalize_counters() {
            warn!(student_id = student.id, total = student.total, "imported counters re-derived from total");
        }
    }

    let count = students.len();
    {
        let _guard = state.accumulator.write_guard().await;
        state.students.replace_all(students).await?;
    }
    info!(students = count, "backup imported");
    Ok(message(StatusCode::OK, "Backup restored successfully"))
}
