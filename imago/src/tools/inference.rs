//! Client for the hosted image-inference endpoint.
//!
//! Requests follow the Hugging Face Inference API convention: the raw image
//! bytes are POSTed to `{base_url}/{model}` and the model's JSON output
//! comes back.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{LlmError, Result, ToolError};
use crate::tool::ToolResult;

use super::input::LoadedImage;

/// Configuration for the inference endpoint.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL; the model id is appended to it.
    pub base_url: String,
    /// Bearer token. Public endpoints accept anonymous calls.
    pub token: Option<String>,
    /// Model used by the captioner.
    pub caption_model: String,
    /// Model used by the detector.
    pub detection_model: String,
    /// Minimum score a detection needs to be reported.
    pub detection_threshold: f64,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl InferenceConfig {
    /// Default inference base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://router.huggingface.co/hf-inference/models";
    /// Default captioning model.
    pub const DEFAULT_CAPTION_MODEL: &'static str = "Salesforce/blip-image-captioning-large";
    /// Default detection model.
    pub const DEFAULT_DETECTION_MODEL: &'static str = "facebook/detr-resnet-50";
    /// Default detection score threshold.
    pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.9;
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Defaults plus `HF_TOKEN` from the environment, when set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults plus `HF_TOKEN` from an arbitrary lookup. A blank token
    /// counts as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            token: lookup("HF_TOKEN").filter(|t| !t.trim().is_empty()),
            ..Self::default()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the captioning model.
    #[must_use]
    pub fn with_caption_model(mut self, model: impl Into<String>) -> Self {
        self.caption_model = model.into();
        self
    }

    /// Sets the detection model.
    #[must_use]
    pub fn with_detection_model(mut self, model: impl Into<String>) -> Self {
        self.detection_model = model.into();
        self
    }

    /// Sets the detection threshold.
    #[must_use]
    pub const fn with_detection_threshold(mut self, threshold: f64) -> Self {
        self.detection_threshold = threshold;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            token: None,
            caption_model: Self::DEFAULT_CAPTION_MODEL.to_owned(),
            detection_model: Self::DEFAULT_DETECTION_MODEL.to_owned(),
            detection_threshold: Self::DEFAULT_DETECTION_THRESHOLD,
            timeout_secs: Some(Self::DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Error body returned by the inference endpoint.
#[derive(Debug, Deserialize)]
struct InferenceErrorBody {
    error: String,
}

/// HTTP client for the inference endpoint, cheap to clone.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    config: Arc<InferenceConfig>,
    client: Client,
}

impl InferenceClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| LlmError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    /// The client's configuration.
    #[must_use]
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub(crate) fn model_url(&self, model: &str) -> String {
        format!("{}/{model}", self.config.base_url.trim_end_matches('/'))
    }

    /// Runs `model` on `image` and decodes its JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Execution`] on transport failures, non-success
    /// statuses and unexpected response bodies.
    pub async fn infer<T: DeserializeOwned>(
        &self,
        model: &str,
        image: &LoadedImage,
    ) -> ToolResult<T> {
        let url = self.model_url(model);
        tracing::debug!(%url, size = image.bytes.len(), "Calling inference endpoint");

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", image.mime_type())
            .body(image.bytes.clone());
        if let Some(token) = &self.config.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<InferenceErrorBody>(&text)
                .map_or(text, |body| body.error);
            return Err(ToolError::execution(format!(
                "{model} returned HTTP {}: {message}",
                status.as_u16()
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            ToolError::execution(format!("unexpected response from {model}: {e}"))
        })
    }
}
