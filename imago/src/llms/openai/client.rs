//! OpenAI API client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::chat::ChatRequest;
use crate::error::{LlmError, Result};
use crate::message::Message;
use crate::tool::ToolDefinition;

use super::config::OpenAIConfig;
use super::types::{
    OpenAIChatRequest, OpenAIErrorResponse, OpenAIFunction, OpenAIFunctionCall, OpenAIMessage,
    OpenAITool, OpenAIToolCall,
};

/// OpenAI API client.
#[derive(Debug, Clone)]
pub struct OpenAI {
    pub(crate) config: Arc<OpenAIConfig>,
    pub(crate) client: Client,
}

impl OpenAI {
    /// Create a new OpenAI client with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails when the API key is empty or the HTTP client cannot be built.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::auth("openai", "API key is required").into());
        }

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

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get the default model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Build the chat completions URL.
    pub(crate) fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Build request headers for JSON requests.
    pub(crate) fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        if let Some(org) = &self.config.organization {
            req = req.header("OpenAI-Organization", org);
        }

        req
    }

    /// Convert Message to OpenAI format.
    pub(crate) fn convert_message(msg: &Message) -> OpenAIMessage {
        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|tc| OpenAIToolCall {
                    id: tc.id.clone(),
                    call_type: "function".to_owned(),
                    function: OpenAIFunctionCall {
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    },
                })
                .collect()
        });

        OpenAIMessage {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    /// Convert ToolDefinition to OpenAI format.
    pub(crate) fn convert_tool(tool: &ToolDefinition) -> OpenAITool {
        OpenAITool {
            tool_type: "function".to_owned(),
            function: OpenAIFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }

    /// Build the request body.
    pub(crate) fn build_body(&self, request: &ChatRequest) -> OpenAIChatRequest {
        let messages = request.messages.iter().map(Self::convert_message).collect();

        let tools = request
            .tools
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| t.iter().map(Self::convert_tool).collect());

        let model = if request.model.is_empty() {
            self.config.model.clone()
        } else {
            request.model.clone()
        };

        OpenAIChatRequest {
            model,
            messages,
            temperature: request.temperature,
            tool_choice: tools.as_ref().and(request.tool_choice.clone()),
            parallel_tool_calls: tools.as_ref().and(request.parallel_tool_calls),
            tools,
        }
    }

    /// Parse an error response from OpenAI.
    pub(crate) fn parse_error(status: u16, body: &str) -> LlmError {
        if let Ok(error_response) = serde_json::from_str::<OpenAIErrorResponse>(body) {
            let error = error_response.error;
            let code = error
                .code
                .or(error.error_type)
                .unwrap_or_else(|| status.to_string());

            return match status {
                401 => LlmError::auth("openai", error.message),
                429 => LlmError::rate_limited("openai"),
                400 if code == "context_length_exceeded" => {
                    LlmError::context_exceeded(error.message)
                }
                _ => LlmError::provider_code("openai", code, error.message),
            };
        }

        LlmError::http_status(status, body.to_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::LlmErrorKind;
    use crate::message::ToolCall;

    #[test]
    fn test_new_requires_api_key() {
        let err = OpenAI::new(OpenAIConfig::default()).unwrap_err();
        assert!(err.to_string().contains("API key is required"));
    }

    #[test]
    fn test_message_conversion() {
        let converted = OpenAI::convert_message(&Message::user("Hello!"));
        assert_eq!(converted.role, "user");
        assert_eq!(converted.content.as_deref(), Some("Hello!"));

        let call = Message::assistant_tool_calls(vec![ToolCall::function(
            "call_1",
            "object_detector",
            "{}",
        )]);
        let converted = OpenAI::convert_message(&call);
        assert!(converted.content.is_none());
        assert_eq!(converted.tool_calls.map(|c| c[0].call_type.clone()).as_deref(), Some("function"));
    }

    #[test]
    fn test_tool_conversion() {
        let tool = ToolDefinition::new(
            "test_tool",
            "A test tool",
            serde_json::json!({"type": "object", "properties": {}}),
        );

        let converted = OpenAI::convert_tool(&tool);
        assert_eq!(converted.function.name, "test_tool");
        assert_eq!(converted.tool_type, "function");
    }

    #[test]
    fn test_build_body_falls_back_to_default_model() {
        let client = OpenAI::new(OpenAIConfig::new("key")).unwrap();
        let body = client.build_body(&ChatRequest::default().user("hi").tool_choice("auto"));

        assert_eq!(body.model, "gpt-3.5-turbo");
        // No tools means no tool_choice either; the API rejects the pair otherwise.
        assert!(body.tools.is_none());
        assert!(body.tool_choice.is_none());
    }

    #[test]
    fn test_parse_error_mapping() {
        let body = r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(OpenAI::parse_error(401, body).kind, LlmErrorKind::Auth);
        assert_eq!(OpenAI::parse_error(429, body).kind, LlmErrorKind::RateLimited);
        assert_eq!(OpenAI::parse_error(500, body).kind, LlmErrorKind::Provider);
        assert_eq!(OpenAI::parse_error(502, "bad gateway").kind, LlmErrorKind::HttpStatus);
    }
}
