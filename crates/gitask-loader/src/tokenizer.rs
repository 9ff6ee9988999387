//! Deterministic subword tokenization for chunking.
//!
//! The default vocabulary is `cl100k_base` in `HuggingFace` tokenizer format,
//! fetched once through `hf-hub` and cached on disk. A local
//! `tokenizer.json` can be used instead, and a built-in byte-level codec
//! (one token per UTF-8 byte) works fully offline.
//!
//! Decoding a window that ends or starts inside a multi-byte UTF-8 sequence
//! yields U+FFFD for the partial sequence on both sides of the boundary.
//! ASCII text round-trips exactly.

use std::fmt;
use std::path::{Path, PathBuf};

use tokenizers::Tokenizer;

use crate::error::{LoaderError, Result};

pub const DEFAULT_TOKENIZER_REPO: &str = "Xenova/gpt-4";

/// Where the tokenizer vocabulary comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerSource {
    /// `tokenizer.json` from a `HuggingFace` Hub model repository.
    Pretrained { repo: String },
    /// A `tokenizer.json` on local disk.
    File(PathBuf),
    /// Byte-level BPE without merges: every UTF-8 byte is one token.
    ByteLevel,
}

impl Default for TokenizerSource {
    fn default() -> Self {
        Self::Pretrained {
            repo: DEFAULT_TOKENIZER_REPO.to_owned(),
        }
    }
}

pub struct TokenCodec {
    tokenizer: Tokenizer,
    name: String,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Load the codec described by `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vocabulary cannot be downloaded, read or parsed.
    pub fn load(source: &TokenizerSource) -> Result<Self> {
        match source {
            TokenizerSource::Pretrained { repo } => Self::pretrained(repo),
            TokenizerSource::File(path) => Self::from_file(path),
            TokenizerSource::ByteLevel => Self::byte_level(),
        }
    }

    /// Fetch `tokenizer.json` from a Hub repository (cached after the first call).
    ///
    /// # Errors
    ///
    /// Returns an error if the download or parsing fails.
    pub fn pretrained(repo: &str) -> Result<Self> {
        let api = hf_hub::api::sync::Api::new().map_err(|e| LoaderError::TokenizerFetch {
            repo: repo.to_owned(),
            message: format!("failed to create HuggingFace API client: {e}"),
        })?;
        let path = api
            .model(repo.to_owned())
            .get("tokenizer.json")
            .map_err(|e| LoaderError::TokenizerFetch {
                repo: repo.to_owned(),
                message: e.to_string(),
            })?;
        tracing::debug!(repo, path = %path.display(), "loaded pretrained tokenizer");
        let mut codec = Self::from_file(&path)?;
        codec.name = repo.to_owned();
        Ok(codec)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a tokenizer definition.
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            LoaderError::Tokenizer(format!("failed to load {}: {e}", path.display()))
        })?;
        Ok(Self {
            tokenizer,
            name: path.display().to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns an error only if the embedded definition fails to parse.
    pub fn byte_level() -> Result<Self> {
        let definition = serde_json::to_vec(&byte_level_definition())
            .map_err(|e| LoaderError::Tokenizer(e.to_string()))?;
        let tokenizer = Tokenizer::from_bytes(definition)
            .map_err(|e| LoaderError::Tokenizer(format!("byte-level definition: {e}")))?;
        Ok(Self {
            tokenizer,
            name: "byte-level".to_owned(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token ids for `text`, without special tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer pipeline fails.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| LoaderError::Tokenizer(format!("encode failed: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// # Errors
    ///
    /// Returns an error if an id is outside the vocabulary.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, false)
            .map_err(|e| LoaderError::Tokenizer(format!("decode failed: {e}")))
    }
}

/// GPT-2 byte-to-unicode table: printable bytes map to themselves, the
/// rest to consecutive code points from U+0100.
fn byte_to_char() -> [char; 256] {
    let printable =
        |b: u8| matches!(b, b'!'..=b'~') || matches!(b, 0xA1..=0xAC) || matches!(b, 0xAE..=0xFF);
    let mut table = ['\0'; 256];
    let mut next = 256u32;
    for b in 0..=255u8 {
        table[usize::from(b)] = if printable(b) {
            char::from(b)
        } else {
            let c = char::from_u32(next).unwrap_or(char::REPLACEMENT_CHARACTER);
            next += 1;
            c
        };
    }
    table
}

fn byte_level_definition() -> serde_json::Value {
    let vocab: serde_json::Map<String, serde_json::Value> = byte_to_char()
        .iter()
        .enumerate()
        .map(|(id, c)| (c.to_string(), serde_json::Value::from(id)))
        .collect();
    let byte_level = serde_json::json!({
        "type": "ByteLevel",
        "add_prefix_space": false,
        "trim_offsets": true,
        "use_regex": true,
    });
    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": byte_level,
        "post_processor": null,
        "decoder": byte_level,
        "model": {
            "type": "BPE",
            "dropout": null,
            "unk_token": null,
            "continuing_subword_prefix": null,
            "end_of_word_suffix": null,
            "fuse_unk": false,
            "byte_fallback": false,
            "ignore_merges": false,
            "vocab": vocab,
            "merges": [],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_table_is_a_bijection() {
        let table = byte_to_char();
        let mut seen: Vec<char> = table.to_vec();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 256);
        assert_eq!(table[usize::from(b'a')], 'a');
        assert_eq!(table[usize::from(b' ')], '\u{120}');
        assert_eq!(table[usize::from(b'\n')], '\u{10a}');
    }

    #[test]
    fn byte_level_one_token_per_byte() {
        let codec = TokenCodec::byte_level().unwrap();
        let ids = codec.encode("hello world\n").unwrap();
        assert_eq!(ids.len(), 12);
        assert_eq!(ids[0], u32::from(b'h'));
        assert_eq!(ids[5], u32::from(b' '));
        assert_eq!(codec.decode(&ids).unwrap(), "hello world\n");
    }

    #[test]
    fn byte_level_counts_utf8_bytes() {
        let codec = TokenCodec::byte_level().unwrap();
        let ids = codec.encode("héllo").unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(codec.decode(&ids).unwrap(), "héllo");
    }

    #[test]
    fn split_multibyte_sequence_decodes_to_replacement() {
        let codec = TokenCodec::byte_level().unwrap();
        let ids = codec.encode("é").unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(codec.decode(&ids[..1]).unwrap(), "\u{fffd}");
    }

    #[test]
    fn empty_text_has_no_tokens() {
        let codec = TokenCodec::byte_level().unwrap();
        assert!(codec.encode("").unwrap().is_empty());
    }

    #[test]
    fn from_file_missing_path_errors() {
        let err = TokenCodec::from_file(Path::new("/nonexistent/tokenizer.json")).unwrap_err();
        assert!(matches!(err, LoaderError::Tokenizer(_)));
    }

    #[test]
    fn from_file_reads_saved_definition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, serde_json::to_vec(&byte_level_definition()).unwrap()).unwrap();
        let codec = TokenCodec::load(&TokenizerSource::File(path.clone())).unwrap();
        assert_eq!(codec.name(), path.display().to_string());
        assert_eq!(codec.encode("abc").unwrap(), vec![97, 98, 99]);
    }

    #[test]
    fn default_source_is_cl100k() {
        assert_eq!(
            TokenizerSource::default(),
            TokenizerSource::Pretrained {
                repo: "Xenova/gpt-4".into()
            }
        );
    }
}
