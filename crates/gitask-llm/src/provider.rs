use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged chat message, serialized as `{role, content}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// The generation surface the question flow depends on.
///
/// Calls are stateless: no conversation history is kept between them.
pub trait LlmProvider: Send + Sync {
    /// Send role-tagged messages and return the assistant reply text.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or answers with a
    /// non-success status.
    fn chat_completion(
        &self,
        messages: &[Message],
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;

    /// Answer `question` from `context` with an example and explanation.
    ///
    /// # Errors
    ///
    /// Returns an error if the generation request fails.
    fn generate_code_snippet(
        &self,
        context: &str,
        question: &str,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;

    /// Embed `text` with the configured embedding model.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding request fails.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, GenerationError>> + Send;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::System).unwrap();
        assert_eq!(json, "\"system\"");
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn message_serializes_role_and_content() {
        let msg = Message::user("hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn message_roundtrips_through_json() {
        let msg = Message::system("be brief");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
