use std::num::TryFromIntError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Malformed insert, id collision or incompatible collection.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] gitask_llm::GenerationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),
}

pub type Result<T> = std::result::Result<T, IndexError>;
