//! Configuration for the Wi-Fi fingerprint agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Location service endpoints and credentials
    pub server: ServerConfig,

    /// Default number of scans per upload (mapping) cycle
    pub mapping_polls: u32,

    /// Default number of scans per query cycle
    pub query_polls: u32,

    /// Longest wait for a single scan before the cycle is aborted
    #[serde(with = "duration_serde")]
    pub scan_timeout: Duration,

    /// Wireless interface to scan on
    pub interface: String,

    /// Read cached scan results instead of triggering fresh scans
    pub use_cached_scans: bool,

    /// Pause between query cycles in `track` mode
    #[serde(with = "duration_serde")]
    pub track_interval: Duration,

    /// Path for exporting fingerprints when running offline
    pub export_path: PathBuf,

    /// Path for storing state and transparency logs
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wifi-fingerprint-agent");

        Self {
            server: ServerConfig::default(),
            mapping_polls: 10,
            query_polls: 2,
            scan_timeout: Duration::from_secs(15),
            interface: "wlan0".to_string(),
            use_cached_scans: false,
            track_interval: Duration::from_secs(30),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, falling back to defaults when
    /// the file does not exist.
    pub fn load_from(config_path: &std::path::Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wifi-fingerprint-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mapping_polls == 0 || self.query_polls == 0 {
            return Err(ConfigError::Invalid(
                "poll counts must be at least 1".to_string(),
            ));
        }
        if self.scan_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "scan_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Location service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the location service
    pub base_url: String,
    /// Path fingerprints are uploaded to as ground truth
    pub upload_path: String,
    /// Path fingerprints are sent to for location matching
    pub query_path: String,
    /// HTTP basic auth user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// HTTP basic auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            upload_path: "/api/v1/accesspoints/".to_string(),
            query_path: "/api/v1/locate/".to_string(),
            username: None,
            password: None,
        }
    }
}

impl ServerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Get the ground-truth upload URL.
    pub fn upload_url(&self) -> String {
        join_url(&self.base_url, &self.upload_path)
    }

    /// Get the location query URL.
    pub fn query_url(&self) -> String {
        join_url(&self.base_url, &self.query_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mapping_polls, 10);
        assert_eq!(config.query_polls, 2);
        assert_eq!(config.scan_timeout, Duration::from_secs(15));
        assert!(!config.use_cached_scans);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_urls() {
        let server = ServerConfig::new("http://maps.example.org/");
        assert_eq!(
            server.upload_url(),
            "http://maps.example.org/api/v1/accesspoints/"
        );
        assert_eq!(server.query_url(), "http://maps.example.org/api/v1/locate/");
    }

    #[test]
    fn test_validate_rejects_zero_polls() {
        let config = Config {
            query_polls: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!(
            "wifi-fingerprint-config-{}",
            uuid::Uuid::new_v4()
        ));
        let path = dir.join("config.json");

        let mut config = Config::default();
        config.interface = "wlp2s0".to_string();
        config.scan_timeout = Duration::from_secs(4);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.interface, "wlp2s0");
        assert_eq!(loaded.scan_timeout, Duration::from_secs(4));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("wifi-fingerprint-does-not-exist.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.mapping_polls, 10);
    }
}
