//! Client for a locally hosted Ollama inference server.
//!
//! Exposes embedding generation, stateless chat completion and the
//! "answer with a code example" generation used by the question flow.

pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod prompt;
pub mod provider;
pub(crate) mod retry;

pub use error::{GenerationError, Result};
pub use ollama::{OllamaClient, SamplingOptions};
pub use provider::{LlmProvider, Message, Role};
