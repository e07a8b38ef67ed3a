/// Tracing subscriber setup and rotated log cleanup.
pub mod logger;

pub use logger::{cleanup_old_logs, setup_logging};
