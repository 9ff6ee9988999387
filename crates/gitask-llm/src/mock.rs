//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex};

use crate::error::GenerationError;
use crate::provider::{LlmProvider, Message};

/// One call observed by [`MockProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Chat(Vec<Message>),
    CodeSnippet { context: String, question: String },
    Embed(String),
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    pub fail: bool,
    /// Milliseconds to sleep before answering a generation call.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: vec![0.0; 384],
            fail: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Every call received so far, oldest first. Clones share the log.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn respond(&self) -> Result<String, GenerationError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            return Err(GenerationError::Status {
                endpoint: "mock",
                status: 500,
                body: "mock LLM error".into(),
            });
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }
}

impl LlmProvider for MockProvider {
    async fn chat_completion(&self, messages: &[Message]) -> Result<String, GenerationError> {
        self.record(MockCall::Chat(messages.to_vec()));
        self.respond().await
    }

    async fn generate_code_snippet(
        &self,
        context: &str,
        question: &str,
    ) -> Result<String, GenerationError> {
        self.record(MockCall::CodeSnippet {
            context: context.to_owned(),
            question: question.to_owned(),
        });
        self.respond().await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, GenerationError> {
        self.record(MockCall::Embed(text.to_owned()));
        if self.fail {
            return Err(GenerationError::Other("mock embedding error".into()));
        }
        Ok(self.embedding.clone())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responses_are_consumed_in_order() {
        let mock = MockProvider::with_responses(vec!["first".into(), "second".into()]);
        assert_eq!(mock.chat_completion(&[]).await.unwrap(), "first");
        assert_eq!(mock.generate_code_snippet("c", "q").await.unwrap(), "second");
        assert_eq!(mock.chat_completion(&[]).await.unwrap(), "mock response");
    }

    #[tokio::test]
    async fn calls_are_recorded() {
        let mock = MockProvider::default();
        let shared = mock.clone();
        mock.generate_code_snippet("ctx", "why?").await.unwrap();
        mock.embed("text").await.unwrap();
        assert_eq!(
            shared.calls(),
            vec![
                MockCall::CodeSnippet {
                    context: "ctx".into(),
                    question: "why?".into()
                },
                MockCall::Embed("text".into()),
            ]
        );
    }

    #[tokio::test]
    async fn failing_returns_status_error() {
        let mock = MockProvider::failing();
        let err = mock.chat_completion(&[Message::user("x")]).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(mock.embed("x").await.is_err());
    }
}
