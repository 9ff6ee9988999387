//! A named, persistent embedding collection stored in `SQLite`.
//!
//! Documents carry their chunk text and provenance metadata. Similarity
//! search ranks every stored vector by cosine distance to the embedded query.

pub mod embedding;
pub mod error;
pub mod store;
pub mod types;

pub use embedding::{AnyEmbedding, EmbeddingFunction, HashEmbedding, OllamaEmbedding};
pub use error::{IndexError, Result};
pub use store::{DEFAULT_COLLECTION, VectorIndex};
pub use types::{CollectionStats, DocumentMetadata, QueryResult};
