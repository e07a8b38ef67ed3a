//! Dropdown option routes.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use crate::attendance_logic::error::AppError;
use crate::attendance_logic::model::{OptionRequest, message, parse_body};
use crate::attendance_logic::state::AppState;

/// `GET /api/v1/settings/dropdown-options`
pub async fn dropdown_options(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.settings.dropdown_options().await?))
}

/// `POST /api/v1/settings/dropdown-options`
pub async fn add_dropdown_option(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, AppError> {
    let OptionRequest { option } = parse_body(&body)?;
    if option.trim().is_empty() {
        return Err(AppError::BadRequest("option must not be empty".into()));
    }

    let _guard = state.settings_lock.lock().await;
    let mut options = state.settings.dropdown_options().await?;
    options.push(option);
    state.settings.set_dropdown_options(options).await?;

    info!("dropdown option added");
    Ok(message(StatusCode::CREATED, "Dropdown option added successfully"))
}

/// `POST /api/v1/settings/dropdown-options/delete`
///
/// Removes every entry equal to the given option.
pub async fn delete_dropdown_option(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, AppError> {
    let OptionRequest { option } = parse_body(&body)?;

    let _guard = state.settings_lock.lock().await;
    let mut options = state.settings.dropdown_options().await?;
    let before = options.len();
    options.retain(|value| *value != option);
    let removed = before - options.len();
    state.settings.set_dropdown_options(options).await?;

    info!(removed, "dropdown option deleted");
    Ok(message(StatusCode::OK, "Dropdown option deleted successfully"))
}
