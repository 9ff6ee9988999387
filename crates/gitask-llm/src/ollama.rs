use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::prompt::code_snippet_prompt;
use crate::provider::{LlmProvider, Message};
use crate::retry::send_with_retry;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/api";
pub const DEFAULT_MODEL: &str = "llama3";

/// Sampling parameters sent with every `/generate` request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.9,
        }
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: String,
    options: SamplingOptions,
    max_retries: u32,
}

impl fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaClient")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("options", &self.options)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    /// Client for the server at `base_url` (the `/api` root), using `model`
    /// for generation and for embeddings.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let model = model.into();
        Self {
            client: crate::http::default_client(Duration::from_secs(120)),
            base_url,
            embedding_model: model.clone(),
            model,
            options: SamplingOptions::default(),
            max_retries: 0,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = crate::http::default_client(timeout);
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: SamplingOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Non-streaming completion of a raw prompt with the configured sampling
    /// options. The response text is returned unprocessed.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// body that is not JSON.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.options,
        };
        let parsed: GenerateResponse = self.post_json("generate", &body).await?;
        Ok(parsed.response)
    }

    async fn post_json<B, R>(&self, endpoint: &'static str, body: &B) -> Result<R, GenerationError>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = send_with_retry(endpoint, self.max_retries, || {
            self.client.post(&url).json(body).send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::error!(endpoint, status = status.as_u16(), "inference server error: {text}");
            return Err(GenerationError::Status {
                endpoint,
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl LlmProvider for OllamaClient {
    async fn chat_completion(&self, messages: &[Message]) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let parsed: ChatResponse = self.post_json("chat", &body).await?;
        Ok(parsed.message.map(|m| m.content).unwrap_or_default())
    }

    async fn generate_code_snippet(
        &self,
        context: &str,
        question: &str,
    ) -> Result<String, GenerationError> {
        self.generate(&code_snippet_prompt(context, question)).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, GenerationError> {
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };
        let parsed: EmbeddingResponse = self.post_json("embeddings", &body).await?;
        Ok(parsed.embedding)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}
