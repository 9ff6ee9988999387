use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A token-bounded slice of one file, with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Path relative to the repository root, `/`-separated.
    pub source: String,
    /// Lower-cased extension including the leading dot.
    pub file_type: String,
    /// Zero-based position within the file's chunk sequence.
    pub chunk_index: usize,
}

/// Counters for one ingestion pass.
///
/// `total_files` and `file_types` count every file that passed the
/// directory and extension filters, including files later skipped because
/// they could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStats {
    pub total_files: usize,
    pub file_types: BTreeMap<String, usize>,
    pub total_chunks: usize,
}

impl RepoStats {
    pub(crate) fn record_file(&mut self, extension: &str) {
        self.total_files += 1;
        *self.file_types.entry(extension.to_owned()).or_default() += 1;
    }
}

/// All chunks of one file, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunks {
    pub source: String,
    pub file_type: String,
    pub chunks: Vec<Chunk>,
}

impl FileChunks {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}
