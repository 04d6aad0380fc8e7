//! Monitor configuration from environment variables, with defaults derived
//! from the user's home directory.

use crate::poller::TRANSFER_POLL_INTERVAL;
use std::time::Duration;

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// User home; queue paths are shown relative to it
    pub home: String,
    /// Where shares are shown to the user
    pub share_link: String,
    /// Where shares live on disk
    pub share_real: String,
    /// Time between transfer progress fetches
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `SYNC_MONITOR_HOME`: home directory (defaults to the user's home)
    /// - `SYNC_MONITOR_POLL_SECS`: transfer poll interval in seconds (defaults to 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let home = match lookup("SYNC_MONITOR_HOME") {
            Some(home) => expand_tilde(&home)?,
            None => user_home()?,
        };

        let poll_interval = match lookup("SYNC_MONITOR_POLL_SECS") {
            Some(value) => parse_interval(&value)?,
            None => TRANSFER_POLL_INTERVAL,
        };

        let mut config = Self::for_home(home);
        config.poll_interval = poll_interval;
        Ok(config)
    }

    /// Defaults for a given home: the standard shares locations under it.
    pub fn for_home(home: impl Into<String>) -> Self {
        let home = home.into();
        let trimmed = home.trim_end_matches('/');
        Self {
            share_link: format!("{trimmed}/Ubuntu One/Shared With Me"),
            share_real: format!("{trimmed}/.local/share/ubuntuone/shares"),
            home,
            poll_interval: TRANSFER_POLL_INTERVAL,
        }
    }
}

fn user_home() -> Result<String, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::MissingHome)?;
    home.into_os_string()
        .into_string()
        .map_err(|path| ConfigError::NonUtf8Home(path.to_string_lossy().into_owned()))
}

/// Expand ~ or ~/ prefix to the user's home directory.
fn expand_tilde(path: &str) -> Result<String, ConfigError> {
    if path == "~" {
        user_home()
    } else if let Some(rest) = path.strip_prefix("~/") {
        Ok(format!("{}/{rest}", user_home()?.trim_end_matches('/')))
    } else {
        Ok(path.to_string())
    }
}

fn parse_interval(value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidPollInterval(value.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine the home directory; set SYNC_MONITOR_HOME")]
    MissingHome,
    #[error("Home directory {0:?} is not valid UTF-8")]
    NonUtf8Home(String),
    #[error("SYNC_MONITOR_POLL_SECS must be a positive number of seconds, got {0:?}")]
    InvalidPollInterval(String),
}
