//! # Attendance Streak Server
//!
//! HTTP server for class attendance. Staff submit marked attendance sheets,
//! counters are kept per student, and every fourth class a student attends
//! produces a milestone notification pushed to connected browsers over
//! server-sent events.
//!
//! ## Functionality:
//! - **Attendance Pipeline**: `POST /api/v1/student/attendance` feeds the
//!   accumulator; completed streaks go through the notifier to the push
//!   channel.
//! - **Push Channel**: `GET /api/v1/notifications/stream` replays unacknowledged
//!   notifications, then streams live ones. `POST /api/v1/notifications/acknowledge`
//!   clears the backlog for everyone.
//! - **Records & Settings**: student CRUD, attendance views, backup and the
//!   class dropdown options.
//! - **Access Gate**: every `/api/v1` route requires the shared secret in the
//!   `access-token` header. The event stream also takes it as
//!   `?access-token=` for browser `EventSource` clients.
//! - **Telegram Alerts**: with `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID` set,
//!   every streak is also posted to a Telegram chat.
//! - **Storage**: Redis when `ATTENDANCE_REDIS_URL` is set, in-memory otherwise.
//! - **Graceful Shutdown**: `tokio-graceful` waits for in-flight requests after
//!   SIGINT/SIGTERM; open event streams are closed first.

mod attendance_logic;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_graceful::Shutdown;
use tracing::{error, info};

use attendance_logic::config::load_config;
use attendance_logic::downstream;
use attendance_logic::state::AppState;
use lib_common::loggers::setup_logging;

const APP_NAME: &str = "server_attendance";

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_config()?;

    // Flushes the file log on drop, keep it for the whole run.
    let _log_guard = setup_logging(&settings.log_dir, &settings.log_level, APP_NAME, settings.log_keep_files)?;
    info!(
        port = settings.port,
        redis = settings.redis_url.is_some(),
        telegram = settings.telegram.is_some(),
        backlog_capacity = settings.backlog_capacity,
        "{} starting",
        APP_NAME
    );

    let state = AppState::build(&settings).await?;
    let listener = TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("binding port {}", settings.port))?;

    let shutdown = Shutdown::default();
    shutdown.spawn_task_fn(move |guard| async move {
        // Held until the server has drained, not just until the signal fires.
        let _drain_guard = guard.clone();
        let signal = async move {
            guard.cancelled().await;
            info!("Signal received: initiate graceful shutdown");
        };
        if let Err(e) = downstream::run(listener, state, signal).await {
            error!("Server error: {}", e);
        }
    });

    match shutdown.shutdown_with_limit(settings.shutdown_grace).await {
        Ok(elapsed) => {
            info!(
                "shutdown: gracefully {}s after shutdown signal received",
                elapsed.as_secs_f64()
            );
        }
        Err(e) => {
            info!("shutdown: forcefully due to timeout: {}", e);
        }
    }

    info!("Bye!");

    Ok(())
}
