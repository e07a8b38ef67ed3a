use anyhow::{Context, Result, bail};
use clap::Parser;
use lib_common::connections::TELEGRAM_API_URL;
use lib_common::core::DEFAULT_BACKLOG_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "server_attendance.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Attendance streak notification server", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "ATTENDANCE_PORT", help = "Port to listen on for client connections.")]
    pub port: Option<u16>,

    #[clap(long, env = "ATTENDANCE_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "ATTENDANCE_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "ATTENDANCE_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "ATTENDANCE_LOG_KEEP_FILES", help = "Number of rotated log files to keep.")]
    pub log_keep_files: Option<usize>,

    #[clap(long, env = "ATTENDANCE_ACCESS_TOKEN", help = "Shared secret expected in the access-token header.")]
    pub access_token: Option<String>,

    #[clap(long, env = "ATTENDANCE_REDIS_URL", help = "Redis URL. In-memory storage is used when unset.")]
    pub redis_url: Option<String>,

    #[clap(long, env = "ATTENDANCE_BACKLOG_CAPACITY", help = "Maximum unacknowledged notifications kept for replay.")]
    pub backlog_capacity: Option<usize>,

    #[clap(long, env = "ATTENDANCE_KEEP_ALIVE_SECONDS", help = "Interval between keep-alive comments on event streams.")]
    pub keep_alive_seconds: Option<u64>,

    #[clap(long, env = "ATTENDANCE_SHUTDOWN_GRACE_SECONDS", help = "Seconds to wait for open connections on shutdown.")]
    pub shutdown_grace_seconds: Option<u64>,

    #[clap(long, env = "TELEGRAM_BOT_TOKEN", help = "Telegram bot token for streak alerts. Alerts are off unless the chat id is set too.")]
    pub telegram_bot_token: Option<String>,

    #[clap(long, env = "TELEGRAM_CHAT_ID", help = "Telegram chat receiving streak alerts.")]
    pub telegram_chat_id: Option<String>,

    #[clap(long, env = "ATTENDANCE_TELEGRAM_API_URL", help = "Base URL of the Telegram Bot API.")]
    pub telegram_api_url: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_keep_files: other.log_keep_files.or(self.log_keep_files),
            access_token: other.access_token.or(self.access_token),
            redis_url: other.redis_url.or(self.redis_url),
            backlog_capacity: other.backlog_capacity.or(self.backlog_capacity),
            keep_alive_seconds: other.keep_alive_seconds.or(self.keep_alive_seconds),
            shutdown_grace_seconds: other.shutdown_grace_seconds.or(self.shutdown_grace_seconds),
            telegram_bot_token: other.telegram_bot_token.or(self.telegram_bot_token),
            telegram_chat_id: other.telegram_chat_id.or(self.telegram_chat_id),
            telegram_api_url: other.telegram_api_url.or(self.telegram_api_url),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(9010),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            log_keep_files: Some(7),
            backlog_capacity: Some(DEFAULT_BACKLOG_CAPACITY),
            keep_alive_seconds: Some(15),
            shutdown_grace_seconds: Some(10),
            telegram_api_url: Some(TELEGRAM_API_URL.to_string()),
            ..Default::default()
        }
    }

    /// Resolves the merged options into concrete settings.
    fn resolve(self) -> Result<Settings> {
        let access_token = match self.access_token {
            Some(token) if !token.trim().is_empty() => token,
            _ => bail!("no access token configured, set ATTENDANCE_ACCESS_TOKEN or --access-token"),
        };
        let redis_url = self.redis_url.filter(|url| !url.trim().is_empty());
        let telegram = match (
            self.telegram_bot_token.filter(|token| !token.trim().is_empty()),
            self.telegram_chat_id.filter(|chat| !chat.trim().is_empty()),
        ) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramSettings {
                bot_token,
                chat_id,
                api_url: self.telegram_api_url.unwrap_or_else(|| TELEGRAM_API_URL.to_string()),
            }),
            _ => None,
        };

        Ok(Settings {
            port: self.port.unwrap_or(9010),
            log_dir: self.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
            log_keep_files: self.log_keep_files.unwrap_or(7),
            access_token,
            redis_url,
            backlog_capacity: self.backlog_capacity.unwrap_or(DEFAULT_BACKLOG_CAPACITY),
            keep_alive: Duration::from_secs(self.keep_alive_seconds.unwrap_or(15).max(1)),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_seconds.unwrap_or(10)),
            telegram,
        })
    }
}

/// Fully resolved server settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub log_keep_files: usize,
    pub access_token: String,
    pub redis_url: Option<String>,
    pub backlog_capacity: usize,
    pub keep_alive: Duration,
    pub shutdown_grace: Duration,
    // None unless both the bot token and the chat id are set
    pub telegram: Option<TelegramSettings>,
}

/// Where streak alerts are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub api_url: String,
}

fn read_config_file(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str::<Config>(&config_str).with_context(|| format!("parsing config file {}", path.display()))
}

/// Merges defaults, the optional config file and the parsed CLI/env options.
pub fn load_config_from(cli_args: Config) -> Result<Settings> {
    // 1. Load defaults
    let mut current_config = Config::defaults();

    // 2. Load from config file (server_attendance.conf) if present.
    //    An explicitly named file must exist.
    let explicit_path = cli_args.config_path.clone();
    let config_file_path = explicit_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if config_file_path.exists() {
        current_config = current_config.merge(read_config_file(&config_file_path)?);
    } else if explicit_path.is_some() {
        bail!("config file not found at {}", config_file_path.display());
    }

    // 3. Override with environment variables and CLI arguments
    current_config.merge(cli_args).resolve()
}

/// Loads `.env`, parses the command line and environment, then merges them
/// over the config file and the defaults.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();
    load_config_from(Config::parse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn with_token() -> Config {
        Config {
            access_token: Some("secret".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply_when_nothing_else_is_set() {
        let settings = Config::defaults().merge(with_token()).resolve().unwrap();
        assert_eq!(settings.port, 9010);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.backlog_capacity, 256);
        assert_eq!(settings.keep_alive, Duration::from_secs(15));
        assert!(settings.redis_url.is_none());
        assert!(settings.telegram.is_none());
    }

    #[test]
    fn telegram_alerts_need_both_token_and_chat() {
        let only_token = Config {
            telegram_bot_token: Some("bot".into()),
            ..with_token()
        };
        assert!(Config::defaults().merge(only_token).resolve().unwrap().telegram.is_none());

        let both = Config {
            telegram_bot_token: Some("bot".into()),
            telegram_chat_id: Some("42".into()),
            ..with_token()
        };
        let telegram = Config::defaults().merge(both).resolve().unwrap().telegram.unwrap();
        assert_eq!(telegram.chat_id, "42");
        assert_eq!(telegram.api_url, "https://api.telegram.org");
    }

    #[test]
    fn missing_or_blank_token_is_rejected() {
        assert!(Config::defaults().resolve().is_err());
        let blank = Config {
            access_token: Some("  ".into()),
            ..Default::default()
        };
        assert!(Config::defaults().merge(blank).resolve().is_err());
    }

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 8100, "logLevel": "debug", "accessToken": "from-file", "backlogCapacity": 16}}"#).unwrap();

        let cli = Config {
            config_path: Some(file.path().to_path_buf()),
            port: Some(8200),
            ..Default::default()
        };
        let settings = load_config_from(cli).unwrap();

        assert_eq!(settings.port, 8200);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.access_token, "from-file");
        assert_eq!(settings.backlog_capacity, 16);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Config {
            config_path: Some(dir.path().join("absent.conf")),
            ..with_token()
        };
        assert!(load_config_from(cli).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "port = 8100").unwrap();
        let cli = Config {
            config_path: Some(file.path().to_path_buf()),
            ..with_token()
        };
        assert!(load_config_from(cli).is_err());
    }
}
