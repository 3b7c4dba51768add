//! Configuration management for imago.
//!
//! Settings are layered, later sources winning:
//! 1. Default values
//! 2. Config file (`--config`, `IMAGO_CONFIG`, or `~/.imago/config.toml`)
//! 3. Environment variables (`OPENAI_BASE_URL`, `OPENAI_MODEL`, ...)
//! 4. Command-line flags, applied by the binary
//!
//! Credentials (`OPENAI_API_KEY`, `HF_TOKEN`) are only ever read from the
//! environment and never written to disk.

mod schema;

pub use schema::{
    AgentConfig, AppConfig, ConfigIssue, IssueLevel, LlmConfig, ServerConfig, VisionConfig,
};

use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "IMAGO_CONFIG";

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    /// Invalid value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        Self::config(err.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Get the default config directory path.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".imago")
}

/// Get the default config file path.
#[must_use]
pub fn config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load the effective configuration.
///
/// An explicit path must exist. Without one, the default path is used
/// when present and defaults otherwise. Environment overrides are applied
/// and the result is validated.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed, or when validation
/// reports an error-level issue.
pub async fn load_config(explicit: Option<&Path>) -> ConfigResult<AppConfig> {
    load_config_with(explicit, |_| {}).await
}

/// Like [`load_config`], with command-line overrides applied after the
/// environment and before validation.
///
/// # Errors
///
/// Same as [`load_config`]; overridden values are validated too.
pub async fn load_config_with(
    explicit: Option<&Path>,
    overrides: impl FnOnce(&mut AppConfig),
) -> ConfigResult<AppConfig> {
    let config = match explicit {
        Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
        Some(path) => load_config_from(path).await?,
        None => load_config_from(&config_path()).await?,
    };

    let mut config = config.with_env();
    overrides(&mut config);
    config.ensure_valid()?;
    Ok(config)
}

/// Load configuration from a specific path, falling back to defaults when
/// the file does not exist.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub async fn load_config_from(path: &Path) -> ConfigResult<AppConfig> {
    if !path.exists() {
        info!(path = %path.display(), "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: AppConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), "loaded config file");

    Ok(config)
}

/// Save configuration to a specific path, creating parent directories.
///
/// # Errors
///
/// Fails when the file cannot be written.
pub async fn save_config_to(config: &AppConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(path, config.to_toml()?).await?;
    info!(path = %path.display(), "saved config file");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        assert!(default_config_dir().ends_with(".imago"));
        assert!(config_path().ends_with("config.toml"));
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml")))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_overrides_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        save_config_to(&AppConfig::default(), &path).await.unwrap();

        let config = load_config_with(Some(&path), |c| c.server.bind = "localhost:9000".into())
            .await
            .unwrap();
        assert_eq!(config.server.bind, "localhost:9000");

        let err = load_config_with(Some(&path), |c| c.server.bind = "no-port".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(err.to_string().contains("server.bind"));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.agent.max_iterations = 3;
        config.vision.detection_threshold = 0.75;
        save_config_to(&config, &path).await.unwrap();

        let loaded = load_config_from(&path).await.unwrap();
        assert_eq!(loaded.agent.max_iterations, 3);
        assert!((loaded.vision.detection_threshold - 0.75).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_parse_error_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        tokio::fs::write(&path, "[llm\nmodel = ").await.unwrap();

        let err = load_config_from(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_into_crate_error() {
        let err: crate::Error = ConfigError::InvalidValue("x".into()).into();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
