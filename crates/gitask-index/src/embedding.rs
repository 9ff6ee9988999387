use std::future::Future;

use gitask_llm::{LlmProvider, OllamaClient};

use crate::error::{IndexError, Result};

pub const DEFAULT_HASH_DIMENSION: usize = 384;

/// Maps text to a fixed-dimension vector, deterministically.
///
/// The name is persisted with the collection; reopening a collection with a
/// differently named function is rejected.
pub trait EmbeddingFunction: Send + Sync {
    fn name(&self) -> String;

    /// # Errors
    ///
    /// Returns an error if the backing model cannot produce a vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

/// Local feature-hashing embedder: lower-cased alphanumeric terms hashed
/// with blake3 into signed buckets, then L2-normalized. Needs no model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEmbedding {
    dimension: usize,
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

impl HashEmbedding {
    /// # Errors
    ///
    /// Returns [`IndexError::Schema`] if `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(IndexError::Schema(
                "hash embedding dimension must be at least 1".into(),
            ));
        }
        Ok(Self { dimension })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimension];
        for term in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
        {
            let hash = blake3::hash(term.to_lowercase().as_bytes());
            let bytes = hash.as_bytes();
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[..8]);
            let h = u64::from_le_bytes(word);
            let idx = (h % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl EmbeddingFunction for HashEmbedding {
    fn name(&self) -> String {
        format!("hash-{}", self.dimension)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// Embeddings from the inference server's `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbedding {
    client: OllamaClient,
}

impl OllamaEmbedding {
    #[must_use]
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

impl EmbeddingFunction for OllamaEmbedding {
    fn name(&self) -> String {
        format!("ollama:{}", self.client.embedding_model())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.client.embed(text).await?;
        if vector.is_empty() {
            return Err(IndexError::Schema(format!(
                "model {} returned an empty embedding",
                self.client.embedding_model()
            )));
        }
        Ok(vector)
    }
}

/// Embedding function chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyEmbedding {
    Hash(HashEmbedding),
    Ollama(OllamaEmbedding),
}

impl EmbeddingFunction for AnyEmbedding {
    fn name(&self) -> String {
        match self {
            Self::Hash(e) => e.name(),
            Self::Ollama(e) => e.name(),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            Self::Hash(e) => e.embed(text).await,
            Self::Ollama(e) => e.embed(text).await,
        }
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn zero_dimension_rejected() {
        assert!(matches!(HashEmbedding::new(0), Err(IndexError::Schema(_))));
    }

    #[test]
    fn hash_embedding_is_deterministic_and_normalized() {
        let e = HashEmbedding::default();
        let a = e.embed_sync("fn parse_config(path: &Path)");
        let b = e.embed_sync("fn parse_config(path: &Path)");
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hash_embedding_ignores_case_and_punctuation() {
        let e = HashEmbedding::default();
        assert_eq!(e.embed_sync("Hello, World!"), e.embed_sync("hello world"));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashEmbedding::new(8).unwrap();
        assert_eq!(e.embed_sync("  ...  "), vec![0.0; 8]);
    }

    #[test]
    fn related_text_is_closer_than_unrelated() {
        let e = HashEmbedding::default();
        let query = e.embed_sync("install the package with cargo");
        let related = e.embed_sync("to install the package run cargo install");
        let unrelated = e.embed_sync("quarterly revenue grew in europe");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn names_include_parameters() {
        assert_eq!(HashEmbedding::new(16).unwrap().name(), "hash-16");
        let ollama = OllamaEmbedding::new(
            OllamaClient::new("http://localhost:11434/api", "llama3")
                .with_embedding_model("nomic-embed-text"),
        );
        assert_eq!(ollama.name(), "ollama:nomic-embed-text");
        assert_eq!(AnyEmbedding::Ollama(ollama).name(), "ollama:nomic-embed-text");
    }

    #[test]
    fn cosine_similarity_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_similarity_zero_vector() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn ollama_embedding_calls_server() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embedding": [0.5, 0.5]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let e = AnyEmbedding::Ollama(OllamaEmbedding::new(OllamaClient::new(
            format!("{}/api", server.uri()),
            "llama3",
        )));
        assert_eq!(e.embed("x").await.unwrap(), vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn ollama_empty_embedding_is_schema_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let e = OllamaEmbedding::new(OllamaClient::new(format!("{}/api", server.uri()), "m"));
        assert!(matches!(e.embed("x").await, Err(IndexError::Schema(_))));
    }

    proptest! {
        #[test]
        fn hash_embedding_norm_is_zero_or_one(text in "\\PC{0,200}") {
            let v = HashEmbedding::new(32).unwrap().embed_sync(&text);
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            prop_assert!(norm.abs() < 1e-6 || (norm - 1.0).abs() < 1e-4);
        }
    }
}
