use axum::{
    Router,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::attendance_logic::attendance::{
    attendance_by_date, export_backup, import_backup, record_attendance, reset_attendance,
};
use crate::attendance_logic::auth::{require_access, require_stream_access};
use crate::attendance_logic::notifications::{acknowledge, notification_stream};
use crate::attendance_logic::settings::{add_dropdown_option, delete_dropdown_option, dropdown_options};
use crate::attendance_logic::state::AppState;
use crate::attendance_logic::students::{
    create_student, delete_all_students, delete_student, get_student, update_student,
};

/// Builds the full router: `/health` outside the gate, everything else under
/// `/api/v1` behind it. The event stream also takes the token as a query
/// parameter.
pub fn router(state: AppState) -> Router {
    let stream = Router::new()
        .route("/notifications/stream", get(notification_stream))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_stream_access));

    let api = Router::new()
        .route("/student", post(create_student).delete(delete_all_students))
        .route("/student/{id}", get(get_student).put(update_student).delete(delete_student))
        .route("/student/attendance", post(record_attendance).delete(reset_attendance))
        .route("/student/attendance/date", post(attendance_by_date))
        .route("/student/attendance/backup", get(export_backup).post(import_backup))
        .route("/settings/dropdown-options", get(dropdown_options).post(add_dropdown_option))
        .route("/settings/dropdown-options/delete", post(delete_dropdown_option))
        .route("/notifications/acknowledge", post(acknowledge))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_access))
        .merge(stream);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Serves until `shutdown` resolves, then closes the push channel so open
/// event streams end and the server can drain.
pub async fn run(listener: TcpListener, state: AppState, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    let channel = state.channel.clone();
    let app = router(state);

    info!("Downstream server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Downstream server shutting down.");
            channel.close();
        })
        .await
}
