/// Failures while fetching a remote repository.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("failed to create clone workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git clone of {url} failed with exit code {code}: {stderr}")]
    Failed {
        url: String,
        code: i32,
        stderr: String,
    },

    #[error("clone cancelled")]
    Cancelled,
}

/// A single file that could not be turned into text.
///
/// Never escapes a repository walk: the walk logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum FileReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8: {source}")]
    Decode {
        path: String,
        source: std::string::FromUtf8Error,
    },

    #[error("{path} is {size} bytes, above the {limit} byte limit")]
    TooLarge { path: String, size: u64, limit: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("failed to fetch tokenizer from {repo}: {message}")]
    TokenizerFetch { repo: String, message: String },

    #[error("max_tokens must be at least 1")]
    InvalidChunkSize,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
