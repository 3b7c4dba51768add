//! OpenAI ChatProvider implementation.

use async_trait::async_trait;

use crate::chat::{ChatProvider, ChatRequest, ChatResponse, StopReason};
use crate::error::{LlmError, Result};
use crate::message::{Message, Role, ToolCall};

use super::client::OpenAI;
use super::types::OpenAIChatResponse;

impl OpenAI {
    /// Parse the response into ChatResponse.
    pub(crate) fn parse_response(response: OpenAIChatResponse) -> Result<ChatResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::response_format("at least one choice", "empty choices"))?;

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("length") => StopReason::Length,
            Some("tool_calls") => StopReason::ToolCalls,
            Some("content_filter") => StopReason::ContentFilter,
            _ => StopReason::Stop,
        };

        let tool_calls = choice.message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|tc| ToolCall::function(tc.id, tc.function.name, tc.function.arguments))
                .collect()
        });

        let message = Message {
            role: Role::Assistant,
            content: choice.message.content,
            tool_calls,
            tool_call_id: None,
        };

        Ok(ChatResponse {
            message,
            stop_reason,
            usage: response.usage,
            model: Some(response.model),
            id: Some(response.id),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAI {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.chat_url();
        let body = self.build_body(request);

        let response = self
            .build_request(&url)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &error_text).into());
        }

        let response_text = response.text().await.map_err(LlmError::from)?;
        let parsed: OpenAIChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            LlmError::response_format(
                "valid OpenAI response",
                format!("parse error: {e}, response: {response_text}"),
            )
        })?;

        Self::parse_response(parsed)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn default_model(&self) -> &str {
        self.model()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::error::{Error, LlmErrorKind};
    use crate::llms::openai::OpenAIConfig;

    fn client(server: &MockServer) -> OpenAI {
        OpenAI::new(OpenAIConfig::new("sk-test").with_base_url(server.base_url())).unwrap()
    }

    #[tokio::test]
    async fn chat_returns_text_answer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .body_includes(r#""model":"gpt-3.5-turbo""#)
                    .body_includes(r#""temperature":0.0"#);
                then.status(200).json_body(json!({
                    "id": "chatcmpl-1",
                    "model": "gpt-3.5-turbo",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "A cat on a sofa."},
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 6, "total_tokens": 18}
                }));
            })
            .await;

        let request = ChatRequest::new("gpt-3.5-turbo")
            .user("what is in the image?")
            .temperature(0.0);
        let response = client(&server).chat(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.text().as_deref(), Some("A cat on a sofa."));
        assert_eq!(response.stop_reason, StopReason::Stop);
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(18));
    }

    #[tokio::test]
    async fn chat_parses_tool_calls() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "id": "chatcmpl-2",
                    "model": "gpt-3.5-turbo",
                    "choices": [{
                        "index": 0,
                        "message": {
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_9",
                                "type": "function",
                                "function": {"name": "object_detector", "arguments": "{\"image_path\":\"/tmp/x.png\"}"}
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }]
                }));
            })
            .await;

        let response = client(&server)
            .chat(&ChatRequest::new("gpt-3.5-turbo").user("how many dogs?"))
            .await
            .unwrap();

        assert_eq!(response.stop_reason, StopReason::ToolCalls);
        let calls = response.tool_calls().unwrap();
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].function.name, "object_detector");
    }

    #[tokio::test]
    async fn chat_maps_auth_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401).json_body(json!({
                    "error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "code": "invalid_api_key"}
                }));
            })
            .await;

        let err = client(&server)
            .chat(&ChatRequest::new("gpt-3.5-turbo").user("hi"))
            .await
            .unwrap_err();

        match err {
            Error::Llm(llm) => assert_eq!(llm.kind, LlmErrorKind::Auth),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn chat_rejects_empty_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .json_body(json!({"id": "x", "model": "gpt-3.5-turbo", "choices": []}));
            })
            .await;

        let err = client(&server)
            .chat(&ChatRequest::new("gpt-3.5-turbo").user("hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty choices"));
    }
}
