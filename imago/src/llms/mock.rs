//! Scripted chat provider for testing.
//!
//! [`MockChatProvider`] replays predefined replies in sequence, cycling
//! through them, and records every request it receives so tests can assert
//! on what the agent sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::chat::{ChatProvider, ChatRequest, ChatResponse};
use crate::error::{LlmError, Result};

/// A chat provider that returns scripted replies.
///
/// # Example
///
/// ```rust,ignore
/// use imago::llms::MockChatProvider;
///
/// let provider = MockChatProvider::from_texts(["A cat.", "Two cats."]);
/// // First call answers "A cat.", second "Two cats.", third "A cat." again...
/// ```
#[derive(Debug)]
pub struct MockChatProvider {
    model: String,
    replies: Vec<std::result::Result<ChatResponse, LlmError>>,
    index: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatProvider {
    /// Creates a provider that replays `replies` in order.
    #[must_use]
    pub fn new(replies: Vec<ChatResponse>) -> Self {
        Self::scripted(replies.into_iter().map(Ok).collect())
    }

    /// Creates a provider from replies that may also be errors.
    #[must_use]
    pub fn scripted(replies: Vec<std::result::Result<ChatResponse, LlmError>>) -> Self {
        Self {
            model: "mock-model".to_owned(),
            replies,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a provider answering with plain text replies.
    #[must_use]
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(ChatResponse::from_text).collect())
    }

    /// Creates a provider whose every call fails with `error`.
    #[must_use]
    pub fn failing(error: LlmError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    /// Sets the model name reported by [`ChatProvider::default_model`].
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Number of `chat` calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Copies of every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let index = self.index.fetch_add(1, Ordering::SeqCst);
        if self.replies.is_empty() {
            return Err(LlmError::internal("mock provider has no scripted replies").into());
        }

        self.replies[index % self.replies.len()]
            .clone()
            .map_err(Into::into)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cycles_replies_and_records_requests() {
        let provider = MockChatProvider::from_texts(["first", "second"]);
        let request = ChatRequest::new("m").user("hi");

        let r1 = provider.chat(&request).await.unwrap();
        let r2 = provider.chat(&request).await.unwrap();
        let r3 = provider.chat(&request).await.unwrap();

        assert_eq!(r1.text().as_deref(), Some("first"));
        assert_eq!(r2.text().as_deref(), Some("second"));
        assert_eq!(r3.text().as_deref(), Some("first"));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn failing_provider_returns_error() {
        let provider = MockChatProvider::failing(LlmError::network("connection reset"));
        let err = provider.chat(&ChatRequest::new("m")).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn empty_script_is_an_error() {
        let provider = MockChatProvider::new(Vec::new());
        assert!(provider.chat(&ChatRequest::new("m")).await.is_err());
    }
}
