//! Configuration file handling for logo-animator.
//!
//! Loads configuration from `<config dir>/logo-animator/config.toml` or a custom path.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::genai::{
    PollPolicy, DEFAULT_IMAGE_MODEL, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_RESOLUTION,
    DEFAULT_VIDEO_MODEL, GEMINI_API_BASE_URL,
};

/// Configuration file structure for logo-animator.
#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_video_model")]
    pub video_model: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            image_model: default_image_model(),
            video_model: default_video_model(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct VideoConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// 0 means poll until the job finishes.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_resolution")]
    pub resolution: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
            resolution: default_resolution(),
        }
    }
}

impl VideoConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: (self.max_poll_attempts > 0).then_some(self.max_poll_attempts),
        }
    }
}

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    /// Where logos and videos are written. Defaults to the current directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl OutputConfig {
    pub fn dir_or_current(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

fn default_base_url() -> String {
    GEMINI_API_BASE_URL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_video_model() -> String {
    DEFAULT_VIDEO_MODEL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    DEFAULT_MAX_POLL_ATTEMPTS
}

fn default_resolution() -> String {
    DEFAULT_RESOLUTION.to_string()
}

impl Config {
    /// Load configuration from the default path.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_path();
        if path.exists() {
            Self::load_from_explicit(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a path given on the command line.
    /// The file must exist.
    pub fn load_from_explicit(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("logo-animator")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api.base_url, GEMINI_API_BASE_URL);
        assert_eq!(config.video.poll_interval_secs, 5);
        assert_eq!(config.video.resolution, "720p");
        assert_eq!(config.output.dir_or_current(), PathBuf::from("."));
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            [api]
            video_model = "veo-3.1-generate-preview"

            [video]
            poll_interval_secs = 10
            max_poll_attempts = 0

            [output]
            dir = "/tmp/logos"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.video_model, "veo-3.1-generate-preview");
        assert_eq!(config.api.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.output.dir, Some(PathBuf::from("/tmp/logos")));

        let policy = config.video.poll_policy();
        assert_eq!(policy.interval, Duration::from_secs(10));
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn test_default_poll_policy_matches_client_default() {
        assert_eq!(VideoConfig::default().poll_policy(), PollPolicy::default());
    }

    #[test]
    fn test_load_from_explicit_missing_file() {
        let result = Config::load_from_explicit(Path::new("/nonexistent/logo-animator.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_from_explicit_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[video\npoll_interval_secs = ").unwrap();

        let err = Config::load_from_explicit(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_default_path() {
        let path = default_path();
        assert!(path.ends_with("logo-animator/config.toml"));
    }
}
