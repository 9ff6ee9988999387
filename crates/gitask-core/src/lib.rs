//! Configuration and orchestration: ingest a repository into the vector
//! index, then answer questions from retrieved chunks.

pub mod config;
pub mod error;
pub mod session;

pub use config::Config;
pub use error::CoreError;
pub use session::{Answer, AnswerMode, IngestReport, Session, document_id};
