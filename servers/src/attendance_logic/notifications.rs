//! Server-sent event stream of streak notifications and the global
//! acknowledgement.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use serde_json::{Value, json};
use tracing::info;

use crate::attendance_logic::state::AppState;

/// `GET /api/v1/notifications/stream`
///
/// Each notification is one `data:` frame holding its JSON. The backlog is
/// replayed first. The subscriber is unregistered when the client goes away.
pub async fn notification_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscriber = state.channel.subscribe();
    info!(subscriber = subscriber.id(), "event stream opened");

    let events = subscriber.map(|notification| Event::default().json_data(&*notification));
    Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

/// `POST /api/v1/notifications/acknowledge`
pub async fn acknowledge(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let cleared = state.channel.acknowledge();
    (
        StatusCode::OK,
        Json(json!({ "message": "Notification acknowledged", "cleared": cleared })),
    )
}
