//! Configuration schema definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, EarlyStopping};
use crate::llms::OpenAIConfig;
use crate::memory::DEFAULT_WINDOW;
use crate::tools::InferenceConfig;

use super::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Chat model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Reasoning loop settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Image inference settings.
    #[serde(default)]
    pub vision: VisionConfig,

    /// Web server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Chat model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
    /// Chat completions base URL.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    OpenAIConfig::DEFAULT_MODEL.to_owned()
}

fn default_llm_base_url() -> String {
    OpenAIConfig::DEFAULT_BASE_URL.to_owned()
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: 0.0,
            base_url: default_llm_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Maximum reasoning iterations per question.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Policy once the iteration limit is hit.
    #[serde(default)]
    pub early_stopping: EarlyStopping,
    /// Exchanges kept in conversation memory.
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
    /// System prompt override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

const fn default_max_iterations() -> usize {
    Agent::DEFAULT_MAX_ITERATIONS
}

const fn default_memory_window() -> usize {
    DEFAULT_WINDOW
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            early_stopping: EarlyStopping::default(),
            memory_window: default_memory_window(),
            instructions: None,
        }
    }
}

/// Image inference configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisionConfig {
    /// Inference base URL; the model id is appended.
    #[serde(default = "default_vision_base_url")]
    pub base_url: String,
    /// Captioning model id.
    #[serde(default = "default_caption_model")]
    pub caption_model: String,
    /// Object detection model id.
    #[serde(default = "default_detection_model")]
    pub detection_model: String,
    /// Minimum detection score reported.
    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: f64,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_vision_base_url() -> String {
    InferenceConfig::DEFAULT_BASE_URL.to_owned()
}

fn default_caption_model() -> String {
    InferenceConfig::DEFAULT_CAPTION_MODEL.to_owned()
}

fn default_detection_model() -> String {
    InferenceConfig::DEFAULT_DETECTION_MODEL.to_owned()
}

const fn default_detection_threshold() -> f64 {
    InferenceConfig::DEFAULT_DETECTION_THRESHOLD
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: default_vision_base_url(),
            caption_model: default_caption_model(),
            detection_model: default_detection_model(),
            detection_threshold: default_detection_threshold(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Web server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory for staged uploads (system temp dir when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// Largest accepted upload, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_owned()
}

const fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            temp_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl AppConfig {
    /// Validate the configuration and return any issues found.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            issues.push(ConfigIssue::error(
                "llm.temperature",
                "Temperature must be between 0.0 and 2.0",
            ));
        }

        if self.agent.max_iterations == 0 {
            issues.push(ConfigIssue::warning(
                "agent.max_iterations",
                "Max iterations is 0, every question goes straight to early stopping",
            ));
        }

        if self.agent.memory_window == 0 {
            issues.push(ConfigIssue::warning(
                "agent.memory_window",
                "Memory window is 0, follow-up questions get no context",
            ));
        }

        if !(0.0..=1.0).contains(&self.vision.detection_threshold) {
            issues.push(ConfigIssue::error(
                "vision.detection_threshold",
                "Detection threshold must be between 0.0 and 1.0",
            ));
        }

        if !is_listen_address(&self.server.bind) {
            issues.push(ConfigIssue::error(
                "server.bind",
                format!("'{}' is not a host:port address", self.server.bind),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            issues.push(ConfigIssue::error(
                "server.max_upload_bytes",
                "Upload limit must be at least 1 byte",
            ));
        }

        issues
    }

    /// Check if the configuration is valid (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|issue| issue.level != IssueLevel::Error)
    }

    /// Fails on the first error-level issue; warnings are logged.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending setting.
    pub fn ensure_valid(&self) -> ConfigResult<()> {
        for issue in self.validate() {
            match issue.level {
                IssueLevel::Error => return Err(ConfigError::InvalidValue(issue.to_string())),
                IssueLevel::Warning => tracing::warn!("{issue}"),
            }
        }
        Ok(())
    }

    /// Merge environment variables into the configuration.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Merge overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = var("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = var("IMAGO_VISION_BASE_URL") {
            self.vision.base_url = url;
        }
        if let Some(bind) = var("IMAGO_BIND") {
            self.server.bind = bind;
        }

        self
    }

    /// `base` (credentials and organization) with the configured endpoint,
    /// model and timeout.
    #[must_use]
    pub fn openai_config(&self, base: OpenAIConfig) -> OpenAIConfig {
        base.with_base_url(&self.llm.base_url)
            .with_model(&self.llm.model)
            .with_timeout(self.llm.timeout_secs)
    }

    /// `base` (the token) with the configured endpoint, models, threshold
    /// and timeout.
    #[must_use]
    pub fn inference_config(&self, base: InferenceConfig) -> InferenceConfig {
        base.with_base_url(&self.vision.base_url)
            .with_caption_model(&self.vision.caption_model)
            .with_detection_model(&self.vision.detection_model)
            .with_detection_threshold(self.vision.detection_threshold)
            .with_timeout(self.vision.timeout_secs)
    }

    /// Render the configuration as pretty TOML.
    ///
    /// # Errors
    ///
    /// Fails when serialization fails.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Whether `addr` has the `host:port` shape a listener accepts. The host is
/// not resolved here.
fn is_listen_address(addr: &str) -> bool {
    addr.rsplit_once(':').is_some_and(|(host, port)| {
        !host.is_empty() && !host.contains(char::is_whitespace) && port.parse::<u16>().is_ok()
    })
}

/// Configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    /// Issue severity level.
    pub level: IssueLevel,
    /// Configuration path (e.g., `vision.detection_threshold`).
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl ConfigIssue {
    /// Create an error-level issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a warning-level issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.level {
            IssueLevel::Error => "ERROR",
            IssueLevel::Warning => "WARN",
        };
        write!(f, "[{prefix}] {}: {}", self.path, self.message)
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// Prevents startup.
    Error,
    /// Logged, startup continues.
    Warning,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let config = AppConfig::default();
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert!(config.llm.temperature.abs() < f32::EPSILON);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.early_stopping, EarlyStopping::Generate);
        assert_eq!(config.agent.memory_window, 5);
        assert!(config.is_valid());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [agent]
            early_stopping = "force"

            [vision]
            detection_threshold = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.early_stopping, EarlyStopping::Force);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.vision.detection_model, "facebook/detr-resnet-50");
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(toml::from_str::<AppConfig>("[llm]\nmodle = \"x\"").is_err());
    }

    #[test]
    fn validate_reports_bad_values() {
        let mut config = AppConfig::default();
        config.llm.temperature = 3.0;
        config.vision.detection_threshold = 1.5;
        config.server.bind = "nowhere".into();
        config.agent.memory_window = 0;

        let issues = config.validate();
        let errors = issues.iter().filter(|i| i.level == IssueLevel::Error).count();
        assert_eq!(errors, 3);
        assert!(!config.is_valid());
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn bind_accepts_host_names() {
        for bind in ["127.0.0.1:8501", "localhost:8501", "0.0.0.0:80", "[::1]:8501"] {
            let mut config = AppConfig::default();
            config.server.bind = bind.into();
            assert!(config.is_valid(), "{bind} should be accepted");
        }
        for bind in ["nowhere", "localhost", ":8501", "localhost:http", "local host:1"] {
            let mut config = AppConfig::default();
            config.server.bind = bind.into();
            assert!(!config.is_valid(), "{bind} should be rejected");
        }
    }

    #[test]
    fn env_overrides_apply() {
        let config = AppConfig::default().with_env_from(|key| match key {
            "OPENAI_MODEL" => Some("gpt-4o-mini".into()),
            "OPENAI_BASE_URL" => Some("http://localhost:8000/v1".into()),
            "IMAGO_BIND" => Some("   ".into()),
            _ => None,
        });

        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.base_url, "http://localhost:8000/v1");
        assert_eq!(config.server.bind, "127.0.0.1:8501");
    }

    #[test]
    fn client_configs_follow_settings() {
        let mut config = AppConfig::default();
        config.vision.detection_threshold = 0.8;

        let openai = config.openai_config(OpenAIConfig::new("sk-test"));
        assert_eq!(openai.model, "gpt-3.5-turbo");
        assert_eq!(openai.timeout_secs, Some(120));

        let inference = config.inference_config(InferenceConfig::default().with_token("hf_x"));
        assert_eq!(inference.token.as_deref(), Some("hf_x"));
        assert!((inference.detection_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn toml_output_has_sections() {
        let text = AppConfig::default().to_toml().unwrap();
        assert!(text.contains("[llm]"));
        assert!(text.contains("[agent]"));
        assert!(text.contains("early_stopping = \"generate\""));
    }
}
