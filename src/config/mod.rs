//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// The aggregation site enforces at least this gap between write calls.
pub const MIN_UNSAVE_PAUSE_MS: u64 = 2000;

/// Inputs to the file namer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamingConfig {
    /// People or topics recognized in titles, authors and categories.
    /// Matching names become the leading token of the file name.
    #[serde(default)]
    pub names: Vec<String>,

    /// Authors whose posts are named after them first
    #[serde(default)]
    pub following: Vec<String>,

    /// Categories where the post title is itself a name
    #[serde(default)]
    pub title_is_name: Vec<String>,
}

/// Cleanup pass that marks downloaded posts as handled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsaveConfig {
    #[serde(default = "default_unsave_enabled")]
    pub enabled: bool,

    #[serde(default = "default_unsave_pause")]
    pub pause_ms: u64,
}

fn default_unsave_enabled() -> bool {
    true
}

fn default_unsave_pause() -> u64 {
    MIN_UNSAVE_PAUSE_MS
}

impl Default for UnsaveConfig {
    fn default() -> Self {
        Self {
            enabled: default_unsave_enabled(),
            pause_ms: default_unsave_pause(),
        }
    }
}

impl UnsaveConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("saved-media/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Code tables for the link list downloader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Short person code -> full name
    #[serde(default)]
    pub names: BTreeMap<String, String>,

    /// Short extension code -> file extension
    #[serde(default = "default_extensions")]
    pub extensions: BTreeMap<String, String>,
}

fn default_extensions() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("m".to_string(), "mp4".to_string()),
        ("j".to_string(), "jpg".to_string()),
    ])
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            names: BTreeMap::new(),
            extensions: default_extensions(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable hosts whose strategies are less reliable
    #[serde(default)]
    pub experimental: bool,

    /// Stop after this many downloads; 0 means no limit
    #[serde(default)]
    pub limit: usize,

    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub unsave: UnsaveConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub links: LinksConfig,
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("./saved")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            log_level: default_log_level(),
            experimental: false,
            limit: 0,
            naming: NamingConfig::default(),
            unsave: UnsaveConfig::default(),
            http: HttpConfig::default(),
            links: LinksConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text, expanding `~` in `save_dir`.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(contents)?;
        config.save_dir = expand_home(&config.save_dir, std::env::var_os("HOME"));
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.save_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "save_dir must not be empty".to_string(),
            ));
        }

        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "HTTP timeout must be greater than 0".to_string(),
            ));
        }

        if self.unsave.pause_ms < MIN_UNSAVE_PAUSE_MS {
            return Err(ConfigError::ValidationError(format!(
                "unsave pause must be at least {}ms",
                MIN_UNSAVE_PAUSE_MS
            )));
        }

        Ok(())
    }

    /// The download limit, `None` when unlimited.
    pub fn limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }
}

/// Replace a leading `~` with the home directory, when one is known.
fn expand_home(path: &Path, home: Option<std::ffi::OsString>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) => PathBuf::from(home).join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.save_dir, PathBuf::from("./saved"));
        assert_eq!(config.log_level, "info");
        assert!(!config.experimental);
        assert_eq!(config.limit(), None);
        assert_eq!(config.unsave.pause(), Duration::from_secs(2));
        assert_eq!(config.links.extensions.get("m").map(String::as_str), Some("mp4"));
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_timeout() {
        let mut config = AppConfig::default();
        config.http.timeout_seconds = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_short_pause() {
        let mut config = AppConfig::default();
        config.unsave.pause_ms = 500;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config = AppConfig::from_toml(
            r#"
            save_dir = "/data/saved"
            experimental = true
            limit = 5

            [naming]
            names = ["Jane Doe"]
            following = ["someuser"]
            title_is_name = ["PortraitsByName"]

            [links.names]
            jd = "janedoe"
            "#,
        )
        .unwrap();

        assert_eq!(config.save_dir, PathBuf::from("/data/saved"));
        assert!(config.experimental);
        assert_eq!(config.limit(), Some(5));
        assert_eq!(config.naming.names, vec!["Jane Doe".to_string()]);
        assert_eq!(config.links.names.get("jd").map(String::as_str), Some("janedoe"));
        assert!(config.unsave.enabled);
    }

    #[test]
    fn test_config_parse_error() {
        let result = AppConfig::from_toml("limit = \"many\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_expand_home() {
        let home = Some(std::ffi::OsString::from("/home/me"));
        assert_eq!(
            expand_home(Path::new("~/Pictures"), home.clone()),
            PathBuf::from("/home/me/Pictures")
        );
        assert_eq!(
            expand_home(Path::new("/abs/dir"), home),
            PathBuf::from("/abs/dir")
        );
        assert_eq!(
            expand_home(Path::new("~/Pictures"), None),
            PathBuf::from("~/Pictures")
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.save_dir, parsed.save_dir);
    }
}
