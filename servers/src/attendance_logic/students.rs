//! Student record routes.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use lib_common::core::{Student, StudentId};
use serde_json::json;
use tracing::info;

use crate::attendance_logic::error::AppError;
use crate::attendance_logic::model::{StudentContact, StudentInput, message, parse_body};
use crate::attendance_logic::state::AppState;

/// `POST /api/v1/student`
///
/// The new id is one past the highest existing id.
pub async fn create_student(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, AppError> {
    let input: StudentInput = parse_body(&body)?;
    input.validate()?;

    let _guard = state.accumulator.write_guard().await;
    let highest = state.students.list().await?.iter().map(|s| s.id).max().unwrap_or(0);
    let next_id = highest
        .checked_add(1)
        .ok_or_else(|| AppError::BadRequest(format!("no student id left after {highest}")))?;
    let mut student = Student::new(next_id, String::new());
    input.apply_to(&mut student);
    state.students.save(&student).await?;

    info!(student_id = next_id, "student created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Student added successfully", "id": next_id })),
    ))
}

/// `GET /api/v1/student/{id}`
pub async fn get_student(State(state): State<AppState>, Path(id): Path<StudentId>) -> Result<Json<StudentContact>, AppError> {
    let student = state.students.find_by_id(id).await?.ok_or(AppError::StudentNotFound(id))?;
    Ok(Json(StudentContact::from(student)))
}

/// `PUT /api/v1/student/{id}`
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let input: StudentInput = parse_body(&body)?;
    input.validate()?;

    let _guard = state.accumulator.write_guard().await;
    let mut student = state.students.find_by_id(id).await?.ok_or(AppError::StudentNotFound(id))?;
    input.apply_to(&mut student);
    state.students.save(&student).await?;

    info!(student_id = id, "student updated");
    Ok(message(StatusCode::OK, "Student updated successfully"))
}

/// `DELETE /api/v1/student/{id}`
pub async fn delete_student(State(state): State<AppState>, Path(id): Path<StudentId>) -> Result<impl IntoResponse, AppError> {
    let _guard = state.accumulator.write_guard().await;
    let removed = state.students.delete(id).await?;
    info!(student_id = id, removed, "student deleted");
    Ok(message(StatusCode::OK, "Student deleted successfully"))
}

/// `DELETE /api/v1/student`
pub async fn delete_all_students(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let _guard = state.accumulator.write_guard().await;
    state.students.replace_all(Vec::new()).await?;
    info!("all students deleted");
    Ok(message(StatusCode::OK, "All students deleted successfully"))
}
