use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::{Prompts, WireConvention};
use crate::protocol::MAX_PAYLOAD_SIZE;

/// Console configuration, loaded from TOML.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Debugger host to connect to.
    pub host: String,
    /// Debugger port.
    pub port: u16,
    /// Which inbound convention the host speaks.
    pub convention: WireConvention,
    /// Largest accepted frame payload, in bytes.
    pub max_payload: u32,
    /// Give up on a connect attempt after this many milliseconds.
    pub connect_timeout_ms: u64,
    /// Append `\n` to every outbound command.
    pub newline_terminated: bool,
    /// Send `quit` to the host when the user disconnects.
    pub quit_on_disconnect: bool,
    pub idle_prompt: String,
    pub break_prompt: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        let prompts = Prompts::default();
        Self {
            host: "localhost".to_string(),
            port: 10240,
            convention: WireConvention::default(),
            max_payload: MAX_PAYLOAD_SIZE,
            connect_timeout_ms: 5000,
            newline_terminated: true,
            quit_on_disconnect: true,
            idle_prompt: prompts.idle,
            break_prompt: prompts.brk,
        }
    }
}

impl ConsoleConfig {
    /// Load config from a TOML file path. Returns None if file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        tracing::debug!(path = %path.display(), "loaded console config");
        Ok(Some(config))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn prompts(&self) -> Prompts {
        Prompts {
            idle: self.idle_prompt.clone(),
            brk: self.break_prompt.clone(),
        }
    }
}

/// `$XDG_CONFIG_HOME/ldb/config.toml` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ldb").join("config.toml"))
}

/// Errors that can occur when loading config.
#[derive(Debug)]
pub enum ConfigError {
    ReadFailed(PathBuf, std::io::Error),
    ParseFailed(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed(path, e) => {
                write!(f, "Failed to read config {}: {}", path.display(), e)
            }
            Self::ParseFailed(path, e) => {
                write!(f, "Failed to parse config {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: ConsoleConfig = toml::from_str("").unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!((config.host.as_str(), config.port), ("localhost", 10240));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            host = "192.168.1.20"
            port = 9000
            convention = "local_directive"
            break_prompt = "Debug> "
        "#;
        let config: ConsoleConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.host, "192.168.1.20");
        assert_eq!(config.port, 9000);
        assert_eq!(config.convention, WireConvention::LocalDirective);
        assert_eq!(config.prompts().brk, "Debug> ");
        assert_eq!(config.prompts().idle, "slua> ");
        assert!(config.newline_terminated);
    }

    #[test]
    fn test_parse_rejects_unknown_convention() {
        let result: Result<ConsoleConfig, _> = toml::from_str(r#"convention = "both""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ConsoleConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        let err = ConsoleConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(..)));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 10241\nquit_on_disconnect = false\n").unwrap();
        let loaded = ConsoleConfig::load(&path).unwrap().unwrap();
        assert_eq!(
            loaded,
            ConsoleConfig {
                port: 10241,
                quit_on_disconnect: false,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("ldb/config.toml"));
        }
    }
}
