//! Repository loading: clone a remote repository into a disposable
//! workspace, walk its text files, normalize markdown and split every file
//! into token-bounded chunks with provenance.

pub mod chunker;
pub mod clone;
pub mod error;
pub mod loader;
pub mod markdown;
pub mod tokenizer;
pub mod types;
pub mod walker;

pub use clone::{ClonedRepo, clone_repository};
pub use error::{CloneError, FileReadError, LoaderError};
pub use loader::{LoaderConfig, RepoLoader, RepoScan};
pub use tokenizer::{TokenCodec, TokenizerSource};
pub use types::{Chunk, FileChunks, RepoStats};
pub use walker::{IgnoreMatch, RepoWalker};
