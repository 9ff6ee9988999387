mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use gitask_index::{AnyEmbedding, HashEmbedding, OllamaEmbedding};
use gitask_llm::{OllamaClient, SamplingOptions};
use gitask_loader::TokenizerSource;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.loader.max_tokens == 0 {
            bail!("loader.max_tokens must be at least 1");
        }
        if self.loader.tokenizer.source == TokenizerKind::File
            && self.loader.tokenizer.path.is_none()
        {
            bail!("loader.tokenizer.path is required when source = \"file\"");
        }
        if self.index.collection.is_empty() {
            bail!("index.collection must not be empty");
        }
        if self.index.top_k == 0 {
            bail!("index.top_k must be at least 1");
        }
        if self.index.batch_size == 0 {
            bail!("index.batch_size must be at least 1");
        }
        if self.index.hash_dimension == 0 {
            bail!("index.hash_dimension must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!(
                "llm.temperature must be within [0, 2], got {}",
                self.llm.temperature
            );
        }
        if !(self.llm.top_p > 0.0 && self.llm.top_p <= 1.0) {
            bail!("llm.top_p must be within (0, 1], got {}", self.llm.top_p);
        }
        Ok(())
    }

    #[must_use]
    pub fn tokenizer_source(&self) -> TokenizerSource {
        let tokenizer = &self.loader.tokenizer;
        match (tokenizer.source, &tokenizer.path) {
            (TokenizerKind::File, Some(path)) => TokenizerSource::File(path.clone()),
            (TokenizerKind::ByteLevel, _) => TokenizerSource::ByteLevel,
            _ => TokenizerSource::Pretrained {
                repo: tokenizer.repo.clone(),
            },
        }
    }

    #[must_use]
    pub fn loader_config(&self) -> gitask_loader::LoaderConfig {
        gitask_loader::LoaderConfig {
            max_tokens: self.loader.max_tokens,
            ignored_dirs: self.loader.ignored_dirs.clone(),
            text_extensions: self.loader.text_extensions.clone(),
            markdown_extensions: self.loader.markdown_extensions.clone(),
            ignore_match: self.loader.ignore_match,
            max_file_size: self.loader.max_file_size,
            clone_depth: self.loader.clone_depth,
        }
    }

    #[must_use]
    pub fn ollama_client(&self) -> OllamaClient {
        OllamaClient::new(&self.llm.base_url, &self.llm.model)
            .with_timeout(Duration::from_secs(self.llm.timeout_secs))
            .with_embedding_model(&self.llm.embedding_model)
            .with_options(SamplingOptions {
                temperature: self.llm.temperature,
                top_p: self.llm.top_p,
            })
            .with_max_retries(self.llm.max_retries)
    }

    /// # Errors
    ///
    /// Returns an error if the hash dimension is zero.
    pub fn embedding(&self) -> anyhow::Result<AnyEmbedding> {
        Ok(match self.index.embedding {
            EmbeddingKind::Hash => AnyEmbedding::Hash(
                HashEmbedding::new(self.index.hash_dimension)
                    .context("invalid hash embedding dimension")?,
            ),
            EmbeddingKind::Ollama => AnyEmbedding::Ollama(OllamaEmbedding::new(self.ollama_client())),
        })
    }
}
