//! Bot configuration loaded from `multifeed.toml` with env overrides.
//!
//! Priority order (later overrides earlier):
//! 1. Built-in defaults
//! 2. The TOML config file
//! 3. `MULTIFEED_BOT_TOKEN` environment variable

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable that overrides the bot token from the file.
pub const BOT_TOKEN_ENV: &str = "MULTIFEED_BOT_TOKEN";

/// Default config file name looked up in the working directory.
pub const CONFIG_FILENAME: &str = "multifeed.toml";

/// Errors from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("bot token is not set (config file `bot_token` or {BOT_TOKEN_ENV})")]
    MissingToken,
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token. May be left empty in the file and supplied via
    /// the environment instead.
    #[serde(default)]
    pub bot_token: String,

    /// Path to the SQLite database. `None` runs with the in-memory store
    /// (records are lost on restart).
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Long-poll timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Telegram API base URL. Only overridden in tests.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            database_path: None,
            poll_timeout_secs: default_poll_timeout(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl BotConfig {
    /// Load configuration from the given file (or the default file name if
    /// it exists), then apply environment overrides.
    ///
    /// A missing default file is not an error; a missing explicit path is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Path::new(CONFIG_FILENAME);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(token) = std::env::var(BOT_TOKEN_ENV) {
            if !token.is_empty() {
                config.bot_token = token;
            }
        }

        Ok(config)
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fail unless a bot token is present. Called once at startup.
    pub fn require_token(&self) -> Result<(), ConfigError> {
        if self.bot_token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = BotConfig::default();
        assert!(config.bot_token.is_empty());
        assert!(config.database_path.is_none());
        assert_eq!(config.poll_timeout_secs, 30);
        assert_eq!(config.api_base_url, "https://api.telegram.org");
    }

    #[test]
    fn parse_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "bot_token = \"123:abc\"\ndatabase_path = \"multifeed.db\"\npoll_timeout_secs = 10"
        )
        .unwrap();

        let config = BotConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.database_path.unwrap(), PathBuf::from("multifeed.db"));
        assert_eq!(config.poll_timeout_secs, 10);
        assert_eq!(config.api_base_url, "https://api.telegram.org");
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bot_token = \"123:abc\"").unwrap();

        let config = BotConfig::from_file(file.path()).unwrap();
        assert_eq!(config.poll_timeout_secs, 30);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bot_token = [not valid").unwrap();

        match BotConfig::from_file(file.path()) {
            Err(ConfigError::Parse { .. }) => {}
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        match BotConfig::load(Some(Path::new("/nonexistent/multifeed.toml"))) {
            Err(ConfigError::Read { .. }) => {}
            other => panic!("expected Read error, got {other:?}"),
        }
    }

    #[test]
    fn require_token_rejects_empty() {
        let config = BotConfig::default();
        assert!(matches!(
            config.require_token(),
            Err(ConfigError::MissingToken)
        ));
    }
}
