use crate::config::Config;

use std::str::FromStr;

fn parse_enum<T: serde::de::DeserializeOwned>(key: &str, v: &str) -> Option<T> {
    let parsed = serde_json::from_value(serde_json::Value::String(v.to_owned())).ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {key} value: {v}");
    }
    parsed
}

fn parse_number<T: FromStr>(key: &str, v: &str) -> Option<T> {
    let parsed = v.parse().ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {key} value: {v}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_loader();
        self.apply_env_overrides_index();
        self.apply_env_overrides_llm();
    }

    fn apply_env_overrides_loader(&mut self) {
        if let Ok(v) = std::env::var("GITASK_LOADER_MAX_TOKENS")
            && let Some(tokens) = parse_number::<usize>("GITASK_LOADER_MAX_TOKENS", &v)
        {
            self.loader.max_tokens = tokens;
        }
        if let Ok(v) = std::env::var("GITASK_LOADER_IGNORE_MATCH")
            && let Some(mode) = parse_enum("GITASK_LOADER_IGNORE_MATCH", &v)
        {
            self.loader.ignore_match = mode;
        }
        if let Ok(v) = std::env::var("GITASK_LOADER_CLONE_DEPTH")
            && let Some(depth) = parse_number::<u32>("GITASK_LOADER_CLONE_DEPTH", &v)
        {
            self.loader.clone_depth = (depth > 0).then_some(depth);
        }
        if let Ok(v) = std::env::var("GITASK_TOKENIZER_SOURCE")
            && let Some(kind) = parse_enum("GITASK_TOKENIZER_SOURCE", &v)
        {
            self.loader.tokenizer.source = kind;
        }
        if let Ok(v) = std::env::var("GITASK_TOKENIZER_REPO") {
            self.loader.tokenizer.repo = v;
        }
        if let Ok(v) = std::env::var("GITASK_TOKENIZER_PATH") {
            self.loader.tokenizer.path = Some(v.into());
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("GITASK_INDEX_PATH") {
            self.index.path = v;
        }
        if let Ok(v) = std::env::var("GITASK_INDEX_COLLECTION") {
            self.index.collection = v;
        }
        if let Ok(v) = std::env::var("GITASK_INDEX_EMBEDDING")
            && let Some(kind) = parse_enum("GITASK_INDEX_EMBEDDING", &v)
        {
            self.index.embedding = kind;
        }
        if let Ok(v) = std::env::var("GITASK_INDEX_HASH_DIMENSION")
            && let Some(dimension) = parse_number::<usize>("GITASK_INDEX_HASH_DIMENSION", &v)
        {
            self.index.hash_dimension = dimension;
        }
        if let Ok(v) = std::env::var("GITASK_INDEX_BATCH_SIZE")
            && let Some(size) = parse_number::<usize>("GITASK_INDEX_BATCH_SIZE", &v)
        {
            self.index.batch_size = size;
        }
        if let Ok(v) = std::env::var("GITASK_INDEX_TOP_K")
            && let Some(k) = parse_number::<usize>("GITASK_INDEX_TOP_K", &v)
        {
            self.index.top_k = k;
        }
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("GITASK_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("GITASK_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("GITASK_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("GITASK_LLM_TEMPERATURE")
            && let Some(temperature) = parse_number::<f32>("GITASK_LLM_TEMPERATURE", &v)
        {
            self.llm.temperature = temperature;
        }
        if let Ok(v) = std::env::var("GITASK_LLM_TOP_P")
            && let Some(top_p) = parse_number::<f32>("GITASK_LLM_TOP_P", &v)
        {
            self.llm.top_p = top_p;
        }
        if let Ok(v) = std::env::var("GITASK_LLM_TIMEOUT")
            && let Some(secs) = parse_number::<u64>("GITASK_LLM_TIMEOUT", &v)
        {
            self.llm.timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("GITASK_LLM_MAX_RETRIES")
            && let Some(retries) = parse_number::<u32>("GITASK_LLM_MAX_RETRIES", &v)
        {
            self.llm.max_retries = retries;
        }
    }
}
