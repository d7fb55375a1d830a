//! Relay configuration loaded once at startup.
//!
//! The configuration is a JSON file (`./cfg.json` by default) with
//! kebab-case keys. Keys this crate does not know are ignored, so files
//! written for older deployments (with e.g. `admin-list`) still load.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::cleanup::DEFAULT_CLEANUP_GRACE;
use crate::delivery::DEFAULT_TELEGRAM_URL;
use crate::fetch::DEFAULT_TIKWM_URL;
use crate::http_client::READ_TIMEOUT_SECS;
use crate::media::{DEFAULT_TRANSCODE_THRESHOLD_BYTES, ToolPaths};

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "./cfg.json";

/// Default scratch directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Upper bound accepted for any timeout setting (1 hour).
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Errors loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file {path}: {source}\n  Suggestion: pass --cfg <path> or create ./cfg.json")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for this schema.
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// The JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range or malformed.
    #[error("invalid config value for `{key}`: {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The scratch directory could not be created.
    #[error("cannot create data directory {path}: {source}")]
    DataDir {
        /// Directory path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Everything the relay needs to run.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RelayConfig {
    /// Bot API token.
    pub token: String,
    /// Scratch directory for downloads and derived files.
    pub data_dir_path: PathBuf,
    /// Bot API base URL.
    pub tg_url: String,
    /// tikwm API base URL.
    pub tikwm_url: String,
    /// Files larger than this are delivered without re-encoding.
    pub transcode_threshold_bytes: u64,
    /// Delay before scratch files are deleted.
    pub cleanup_grace_secs: u64,
    /// Per-call limit for external programs; unset means no limit.
    pub process_timeout_secs: Option<u64>,
    /// Overall HTTP request timeout.
    pub http_timeout_secs: u64,
    /// External program paths.
    pub tools: ToolPaths,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            data_dir_path: PathBuf::from(DEFAULT_DATA_DIR),
            tg_url: DEFAULT_TELEGRAM_URL.to_string(),
            tikwm_url: DEFAULT_TIKWM_URL.to_string(),
            transcode_threshold_bytes: DEFAULT_TRANSCODE_THRESHOLD_BYTES,
            cleanup_grace_secs: DEFAULT_CLEANUP_GRACE.as_secs(),
            process_timeout_secs: None,
            http_timeout_secs: READ_TIMEOUT_SECS,
            tools: ToolPaths::default(),
        }
    }
}

impl RelayConfig {
    /// Reads, parses and validates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is unreadable, malformed or invalid.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(config = ?config, "Loaded configuration");
        Ok(config)
    }

    /// Checks every value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::invalid("token", "must not be empty"));
        }
        if self.data_dir_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("data-dir-path", "must not be empty"));
        }
        validate_http_url("tg-url", &self.tg_url)?;
        validate_http_url("tikwm-url", &self.tikwm_url)?;
        validate_timeout("http-timeout-secs", self.http_timeout_secs)?;
        if let Some(secs) = self.process_timeout_secs {
            validate_timeout("process-timeout-secs", secs)?;
        }
        Ok(())
    }

    /// Creates the scratch directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DataDir`] if creation fails.
    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        if self.data_dir_path.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.data_dir_path).map_err(|source| ConfigError::DataDir {
            path: self.data_dir_path.clone(),
            source,
        })?;
        info!(path = %self.data_dir_path.display(), "Created data directory");
        Ok(())
    }

    /// Cleanup grace period.
    #[must_use]
    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }

    /// External program timeout, if configured.
    #[must_use]
    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("token", &"<redacted>")
            .field("data_dir_path", &self.data_dir_path)
            .field("tg_url", &self.tg_url)
            .field("tikwm_url", &self.tikwm_url)
            .field("transcode_threshold_bytes", &self.transcode_threshold_bytes)
            .field("cleanup_grace_secs", &self.cleanup_grace_secs)
            .field("process_timeout_secs", &self.process_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("tools", &self.tools)
            .finish()
    }
}

fn validate_http_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(key, format!("{value}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            key,
            format!("{value}: expected an http(s) URL"),
        ));
    }
    Ok(())
}

fn validate_timeout(key: &'static str, secs: u64) -> Result<(), ConfigError> {
    if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(ConfigError::invalid(
            key,
            format!("{secs}. Expected range: 1..={MAX_TIMEOUT_SECS}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("cfg.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), r#"{"token":"123:abc"}"#);
        let config = RelayConfig::load(&path).unwrap();
        assert_eq!(config.transcode_threshold_bytes, 20_000_000);
        assert_eq!(config.cleanup_grace(), Duration::from_secs(300));
        assert_eq!(config.tg_url, DEFAULT_TELEGRAM_URL);
        assert!(config.process_timeout().is_none());
    }

    #[test]
    fn test_load_legacy_file_ignores_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{"token":"t","admin-list":[1,2],"data-dir-path":"/srv/tt","tg-url":"http://localhost:8081","is-local":true}"#,
        );
        let config = RelayConfig::load(&path).unwrap();
        assert_eq!(config.data_dir_path, PathBuf::from("/srv/tt"));
        assert_eq!(config.tg_url, "http://localhost:8081");
    }

    #[test]
    fn test_load_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{"token":"t","transcode-threshold-bytes":1000,"cleanup-grace-secs":5,
                "process-timeout-secs":60,"http-timeout-secs":30,
                "tools":{"convert":"/usr/bin/magick"}}"#,
        );
        let config = RelayConfig::load(&path).unwrap();
        assert_eq!(config.transcode_threshold_bytes, 1000);
        assert_eq!(config.process_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.tools.convert, PathBuf::from("/usr/bin/magick"));
        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_missing_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), r#"{"data-dir-path":"x"}"#);
        let err = RelayConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("`token`"), "got: {err}");
    }

    #[test]
    fn test_bad_url_rejected() {
        let config = RelayConfig {
            token: "t".to_string(),
            tikwm_url: "ftp://tikwm".to_string(),
            ..RelayConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tikwm-url"), "got: {err}");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = RelayConfig {
            token: "t".to_string(),
            process_timeout_secs: Some(0),
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_has_suggestion() {
        let err = RelayConfig::load(Path::new("/nope/cfg.json")).unwrap_err();
        assert!(err.to_string().contains("Suggestion"));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "{token: nope");
        assert!(matches!(
            RelayConfig::load(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn test_ensure_data_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig {
            token: "t".to_string(),
            data_dir_path: dir.path().join("a/b"),
            ..RelayConfig::default()
        };
        config.ensure_data_dir().unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = RelayConfig {
            token: "123:secret".to_string(),
            ..RelayConfig::default()
        };
        assert!(!format!("{config:?}").contains("secret"));
    }
}
