use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use gitask_loader::IgnoreMatch;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_max_tokens() -> usize {
    gitask_loader::chunker::DEFAULT_MAX_TOKENS
}

fn default_ignored_dirs() -> Vec<String> {
    gitask_loader::walker::DEFAULT_IGNORED_DIRS
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

fn default_text_extensions() -> Vec<String> {
    gitask_loader::walker::DEFAULT_TEXT_EXTENSIONS
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

fn default_markdown_extensions() -> Vec<String> {
    vec![".md".into()]
}

fn default_max_file_size() -> u64 {
    gitask_loader::loader::DEFAULT_MAX_FILE_SIZE
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoaderConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
    #[serde(default = "default_markdown_extensions")]
    pub markdown_extensions: Vec<String>,
    #[serde(default)]
    pub ignore_match: IgnoreMatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_depth: Option<u32>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            ignored_dirs: default_ignored_dirs(),
            text_extensions: default_text_extensions(),
            markdown_extensions: default_markdown_extensions(),
            ignore_match: IgnoreMatch::default(),
            clone_depth: None,
            max_file_size: default_max_file_size(),
            tokenizer: TokenizerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenizerKind {
    #[default]
    Pretrained,
    File,
    ByteLevel,
}

fn default_tokenizer_repo() -> String {
    gitask_loader::tokenizer::DEFAULT_TOKENIZER_REPO.into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub source: TokenizerKind,
    #[serde(default = "default_tokenizer_repo")]
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            source: TokenizerKind::default(),
            repo: default_tokenizer_repo(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    #[default]
    Hash,
    Ollama,
}

fn default_index_path() -> String {
    "./gitask.db".into()
}

fn default_collection() -> String {
    gitask_index::DEFAULT_COLLECTION.into()
}

fn default_hash_dimension() -> usize {
    gitask_index::embedding::DEFAULT_HASH_DIMENSION
}

fn default_batch_size() -> usize {
    64
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub embedding: EmbeddingKind,
    #[serde(default = "default_hash_dimension")]
    pub hash_dimension: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            collection: default_collection(),
            embedding: EmbeddingKind::default(),
            hash_dimension: default_hash_dimension(),
            batch_size: default_batch_size(),
            top_k: default_top_k(),
        }
    }
}

fn default_base_url() -> String {
    gitask_llm::ollama::DEFAULT_BASE_URL.into()
}

fn default_model() -> String {
    gitask_llm::ollama::DEFAULT_MODEL.into()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_top_p() -> f32 {
    0.9
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_model")]
    pub embedding_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}
