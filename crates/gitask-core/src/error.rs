use std::path::PathBuf;

use gitask_index::IndexError;
use gitask_llm::GenerationError;
use gitask_loader::{CloneError, LoaderError};

/// Everything an ingestion or question can fail with.
///
/// Per-file read failures never appear here: the repository walk logs and
/// skips them.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("operation cancelled")]
    Cancelled,

    #[error("background scan task failed: {0}")]
    ScanTask(String),

    #[error("tokenizer loading task failed: {0}")]
    TokenizerTask(String),
}
