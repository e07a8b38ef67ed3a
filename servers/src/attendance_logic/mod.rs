pub mod attendance;
pub mod auth;
pub mod config;
pub mod downstream;
pub mod error;
pub mod model;
pub mod notifications;
pub mod settings;
pub mod state;
pub mod students;
