//! Configuration for the ovenlink client.
//!
//! TOML config file, `OVENLINK_*` environment overrides, keyring-backed
//! credential storage, and translation to `ovenlink_core::SessionConfig`.

mod vault;

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ovenlink_api::auth::DEFAULT_TOKEN_REFRESH_URL;
use ovenlink_api::session::DEFAULT_RELAY_URL;
use ovenlink_api::{RelayConfig, SecureTokenClient};
use ovenlink_core::{HistoryLocation, SessionConfig};

pub use vault::{KEYRING_ACCOUNT, KEYRING_SERVICE, KeyringStore};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "OVENLINK_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for ovenlink_core::CoreError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

// ── TOML config ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Relay websocket endpoint.
    pub relay_url: String,
    /// Sent as the relay's `platform` parameter.
    pub platform: String,
    /// Sent as the relay's `supportedAccessories` parameter.
    pub supported_accessories: String,

    pub token_refresh_url: String,
    /// API key for the token refresh endpoint (plaintext; prefer the env var).
    pub token_api_key: Option<String>,

    /// History database. Defaults to the platform data dir.
    pub database_path: Option<PathBuf>,
    /// Trace every SQL statement.
    pub sql_trace: bool,

    /// Interval of the "wait for an appliance" poll.
    pub poll_interval_ms: u64,
    /// Network and wait timeout, in seconds.
    pub timeout: u64,
    pub output: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.into(),
            platform: "ios".into(),
            supported_accessories: "APO".into(),
            token_refresh_url: DEFAULT_TOKEN_REFRESH_URL.into(),
            token_api_key: None,
            database_path: None,
            sql_trace: false,
            poll_interval_ms: 1000,
            timeout: 30,
            output: "table".into(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Where history is stored: the configured path, else the platform
    /// data dir.
    pub fn history_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(default_database_path)
    }

    /// Runtime session settings for `ovenlink-core`.
    pub fn to_session_config(&self) -> Result<SessionConfig, ConfigError> {
        url::Url::parse(&self.relay_url).map_err(|e| ConfigError::Validation {
            field: "relay_url".into(),
            reason: format!("{e}: {}", self.relay_url),
        })?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "poll_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(SessionConfig {
            relay: RelayConfig {
                url: self.relay_url.clone(),
                platform: self.platform.clone(),
                supported_accessories: self.supported_accessories.clone(),
                connect_timeout: self.timeout(),
            },
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            history: HistoryLocation::File(self.history_path()),
            sql_trace: self.sql_trace,
        })
    }

    /// HTTP client for the token refresh endpoint.
    pub fn token_refresher(&self) -> Result<SecureTokenClient, ConfigError> {
        let api_key = self.token_api_key.clone().map(SecretString::from);
        SecureTokenClient::new(&self.token_refresh_url, api_key.as_ref(), self.timeout()).map_err(
            |e| ConfigError::Validation {
                field: "token_refresh_url".into(),
                reason: e.to_string(),
            },
        )
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "ovenlink", "ovenlink")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ovenlink");
    p
}

/// Resolve the config file path: `OVENLINK_CONFIG`, else the platform
/// config dir.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

pub fn default_database_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("history.sqlite"),
        |dirs| dirs.data_dir().join("history.sqlite"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load config from the canonical path and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then the TOML file at `path` (if any), then `OVENLINK_*`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("OVENLINK_").ignore(&["config"]));

    let config: Config = figment.extract()?;
    Ok(config)
}

pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.relay_url, DEFAULT_RELAY_URL);
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert_eq!(cfg.platform, "ios");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "relay_url = \"wss://relay.example/\"\npoll_interval_ms = 250\nsql_trace = true\n",
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.relay_url, "wss://relay.example/");
        assert_eq!(cfg.poll_interval_ms, 250);
        assert!(cfg.sql_trace);
        assert_eq!(cfg.supported_accessories, "APO");
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            database_path: Some(dir.path().join("h.sqlite")),
            timeout: 5,
            ..Config::default()
        };

        save_config_to(&cfg, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }

    #[test]
    fn session_config_translation() {
        let cfg = Config {
            database_path: Some(PathBuf::from("/tmp/ovenlink.sqlite")),
            poll_interval_ms: 500,
            ..Config::default()
        };
        let session = cfg.to_session_config().unwrap();
        assert_eq!(session.poll_interval, Duration::from_millis(500));
        assert_eq!(
            session.history,
            HistoryLocation::File(PathBuf::from("/tmp/ovenlink.sqlite"))
        );
        assert_eq!(session.relay.url, DEFAULT_RELAY_URL);
        assert_eq!(session.relay.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_url = Config {
            relay_url: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(
            bad_url.to_session_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "relay_url"
        ));

        let zero_poll = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };
        assert!(zero_poll.to_session_config().is_err());
    }

    #[test]
    fn token_refresher_builds_from_defaults() {
        assert!(Config::default().token_refresher().is_ok());
    }
}
