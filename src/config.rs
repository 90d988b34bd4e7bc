//! Client runtime configuration.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::countdown::DEFAULT_TURN_SECONDS;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no battle id given (pass --battle-id or set BATTLE_ID)")]
    MissingBattleId,
}

/// Everything the client needs to join one battle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub user_id: Option<String>,
    pub battle_id: Option<String>,
    pub turn_seconds: u32,
    pub request_timeout: Duration,
    pub log_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            auth_token: None,
            user_id: None,
            battle_id: None,
            turn_seconds: DEFAULT_TURN_SECONDS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            log_dir: None,
        }
    }
}

impl ClientConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `BATTLE_API_URL` - Battle service base URL (default: `http://localhost:3000/api`)
    /// - `BATTLE_AUTH_TOKEN` - Bearer token sent with every request
    /// - `BATTLE_USER_ID` - Current user, used to tell the player team apart
    /// - `BATTLE_ID` - Battle to join (required, unless given on the command line)
    /// - `BATTLE_TURN_SECONDS` - Turn countdown budget (default: 30, minimum 1)
    /// - `BATTLE_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 15)
    /// - `BATTLE_LOG_DIR` - Log file directory (default: platform cache dir)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty("BATTLE_API_URL") {
            config.api_url = url;
        }
        config.auth_token = non_empty("BATTLE_AUTH_TOKEN");
        config.user_id = non_empty("BATTLE_USER_ID");
        config.battle_id = non_empty("BATTLE_ID");

        if let Some(seconds) = read_parsed::<u32>(&lookup, "BATTLE_TURN_SECONDS") {
            config.turn_seconds = seconds.max(1);
        }
        if let Some(seconds) = read_parsed::<u64>(&lookup, "BATTLE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(seconds.max(1));
        }
        config.log_dir = non_empty("BATTLE_LOG_DIR").map(PathBuf::from);

        config
    }

    pub fn battle_id(&self) -> Result<&str, ConfigError> {
        self.battle_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(ConfigError::MissingBattleId)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }
}

fn default_log_dir() -> PathBuf {
    dirs_next::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("battletui")
        .join("logs")
}

fn read_parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    lookup(key)?.trim().parse().ok()
}
