//! The explicit session context: one loader, one collection, one language
//! model, and the statistics of the last successful ingestion.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use gitask_index::{
    AnyEmbedding, CollectionStats, DocumentMetadata, EmbeddingFunction, QueryResult, VectorIndex,
};
use gitask_llm::prompt::documentation_messages;
use gitask_llm::{LlmProvider, OllamaClient};
use gitask_loader::{
    Chunk, FileChunks, LoaderConfig, RepoLoader, RepoStats, TokenCodec, TokenizerSource,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::CoreError;

const DEFAULT_BATCH_SIZE: usize = 64;
const DEFAULT_TOP_K: usize = 5;
const SCAN_CHANNEL_CAPACITY: usize = 16;

/// Stable document id for the `chunk_index`-th chunk of `source`.
///
/// Distinct for every `(source, chunk_index)` pair and identical across
/// re-ingestions of the same tree.
#[must_use]
pub fn document_id(source: &str, chunk_index: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(&[0]);
    hasher.update(chunk_index.to_string().as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnswerMode {
    /// Single generation asking for a code example with explanation.
    #[default]
    CodeSnippet,
    /// Documentation-assistant chat completion.
    Chat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// One `- {source}` line per retrieved chunk, in rank order.
    pub sources: String,
    pub results: QueryResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub stats: RepoStats,
    pub documents: usize,
    pub elapsed_ms: u64,
}

/// The chunking pipeline, or what is needed to build it on first ingestion.
#[derive(Debug)]
enum LoaderSlot {
    Ready(RepoLoader),
    Deferred {
        tokenizer: TokenizerSource,
        config: LoaderConfig,
    },
}

#[derive(Debug)]
pub struct Session<P, E> {
    loader: LoaderSlot,
    index: VectorIndex<E>,
    provider: P,
    batch_size: usize,
    top_k: usize,
    stats: Option<RepoStats>,
}

impl Session<OllamaClient, AnyEmbedding> {
    /// Build a session from validated configuration.
    ///
    /// The tokenizer is loaded on the first ingestion, so sessions that only
    /// query never fetch it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the index cannot
    /// be opened.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let loader = LoaderSlot::Deferred {
            tokenizer: config.tokenizer_source(),
            config: config.loader_config(),
        };
        let index = VectorIndex::open(
            &config.index.path,
            &config.index.collection,
            config.embedding()?,
        )
        .await
        .with_context(|| format!("failed to open index at {}", config.index.path))?;

        Ok(Self::with_loader(loader, index, config.ollama_client())
            .with_batch_size(config.index.batch_size)
            .with_top_k(config.index.top_k))
    }
}

impl<P: LlmProvider, E: EmbeddingFunction + Clone> Session<P, E> {
    #[must_use]
    pub fn new(loader: RepoLoader, index: VectorIndex<E>, provider: P) -> Self {
        Self::with_loader(LoaderSlot::Ready(loader), index, provider)
    }

    fn with_loader(loader: LoaderSlot, index: VectorIndex<E>, provider: P) -> Self {
        Self {
            loader,
            index,
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
            top_k: DEFAULT_TOP_K,
            stats: None,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex<E> {
        &self.index
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Statistics of the last successful ingestion in this session.
    #[must_use]
    pub fn stats(&self) -> Option<&RepoStats> {
        self.stats.as_ref()
    }

    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.stats.is_some()
    }

    /// The chunking pipeline, loading the tokenizer on first use.
    async fn loader(&mut self) -> Result<RepoLoader, CoreError> {
        let loader = match &self.loader {
            LoaderSlot::Ready(loader) => loader.clone(),
            LoaderSlot::Deferred { tokenizer, config } => {
                let (tokenizer, config) = (tokenizer.clone(), config.clone());
                let codec = tokio::task::spawn_blocking(move || TokenCodec::load(&tokenizer))
                    .await
                    .map_err(|e| CoreError::TokenizerTask(e.to_string()))??;
                tracing::info!(tokenizer = codec.name(), "tokenizer loaded");
                let loader = RepoLoader::new(codec, config)?;
                self.loader = LoaderSlot::Ready(loader.clone());
                loader
            }
        };
        Ok(loader)
    }

    /// Clone `url`, replace the collection with its chunks, and remove the
    /// clone again.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer cannot be loaded, cloning, chunking
    /// or indexing fails, or `cancel` fires. The clone is removed and the
    /// previous collection and statistics are kept.
    pub async fn ingest(
        &mut self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, CoreError> {
        let loader = self.loader().await?;
        let clone = loader.clone_repo(url, cancel).await?;
        let result = self.ingest_tree(&loader, clone.path(), cancel).await;
        if let Err(e) = clone.close() {
            tracing::warn!(url, "failed to remove cloned repository: {e}");
        }
        result
    }

    /// Replace the collection with the chunks of an existing local tree.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotADirectory`] if `path` is not a directory,
    /// otherwise as [`Session::ingest`].
    pub async fn ingest_path(
        &mut self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, CoreError> {
        if !path.is_dir() {
            return Err(CoreError::NotADirectory(path.to_path_buf()));
        }
        let loader = self.loader().await?;
        self.ingest_tree(&loader, path, cancel).await
    }

    /// Build the new collection beside the live one and swap it in only when
    /// the whole tree was indexed.
    async fn ingest_tree(
        &mut self,
        loader: &RepoLoader,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, CoreError> {
        let started = Instant::now();
        let _guard = self.index.lock_for_ingestion().await;
        tracing::info!(path = %root.display(), collection = self.index.name(), "ingesting");

        let staging = self.index.begin_replacement().await?;
        let filled = match self.fill(loader, &staging, root, cancel).await {
            Ok(filled) => self
                .index
                .commit_replacement(&staging)
                .await
                .map(|_| filled)
                .map_err(CoreError::from),
            Err(e) => Err(e),
        };
        let (stats, documents) = match filled {
            Ok(filled) => filled,
            Err(e) => {
                if let Err(discard_err) = staging.discard().await {
                    tracing::warn!("failed to discard partial ingestion: {discard_err}");
                }
                return Err(e);
            }
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            files = stats.total_files,
            chunks = stats.total_chunks,
            documents,
            elapsed_ms,
            "ingestion complete"
        );
        self.stats = Some(stats.clone());
        Ok(IngestReport {
            stats,
            documents,
            elapsed_ms,
        })
    }

    /// Chunk `root` on a blocking thread and insert the chunks into `target`
    /// in batches.
    async fn fill(
        &self,
        loader: &RepoLoader,
        target: &VectorIndex<E>,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<(RepoStats, usize), CoreError> {
        let (tx, rx) = mpsc::channel::<FileChunks>(SCAN_CHANNEL_CAPACITY);
        let loader = loader.clone();
        let root = root.to_path_buf();
        let scan_cancel = cancel.clone();

        let producer = tokio::task::spawn_blocking(move || -> Result<RepoStats, CoreError> {
            let mut scan = loader.scan(&root);
            for file in scan.by_ref() {
                if scan_cancel.is_cancelled() {
                    return Err(CoreError::Cancelled);
                }
                let file = file?;
                if file.is_empty() {
                    continue;
                }
                if tx.blocking_send(file).is_err() {
                    break;
                }
            }
            Ok(scan.into_stats())
        });

        let consumed = self.consume(target, rx, cancel).await;
        let scanned = producer
            .await
            .map_err(|e| CoreError::ScanTask(e.to_string()));
        let documents = consumed?;
        let stats = scanned??;
        Ok((stats, documents))
    }

    async fn consume(
        &self,
        target: &VectorIndex<E>,
        mut rx: mpsc::Receiver<FileChunks>,
        cancel: &CancellationToken,
    ) -> Result<usize, CoreError> {
        let mut batch: Vec<Chunk> = Vec::with_capacity(self.batch_size);
        let mut inserted = 0;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(CoreError::Cancelled),
                next = rx.recv() => next,
            };
            let Some(file) = next else { break };
            batch.extend(file.chunks);
            while batch.len() >= self.batch_size {
                let rest = batch.split_off(self.batch_size);
                inserted += insert_batch(target, &batch, cancel).await?;
                batch = rest;
            }
        }
        if !batch.is_empty() {
            inserted += insert_batch(target, &batch, cancel).await?;
        }
        Ok(inserted)
    }

    /// Retrieve the nearest chunks for `question` and generate an answer
    /// from them.
    ///
    /// An empty collection is not an error: the model is asked with an empty
    /// context.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or generation fails, or `cancel` fires.
    pub async fn ask(
        &self,
        question: &str,
        mode: AnswerMode,
        cancel: &CancellationToken,
    ) -> Result<Answer, CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let results = self.index.query(question, self.top_k).await?;
        let context = results.documents.join("\n\n");
        let sources = format_sources(&results);
        tracing::debug!(retrieved = results.len(), ?mode, "answering question");

        let generation = async {
            match mode {
                AnswerMode::CodeSnippet => {
                    self.provider
                        .generate_code_snippet(&context, question)
                        .await
                }
                AnswerMode::Chat => {
                    self.provider
                        .chat_completion(&documentation_messages(&context, question))
                        .await
                }
            }
        };
        let text = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CoreError::Cancelled),
            text = generation => text?,
        };

        Ok(Answer {
            text,
            sources,
            results,
        })
    }

    /// Raw similarity search, bypassing generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn search(&self, text: &str, top_k: usize) -> Result<QueryResult, CoreError> {
        Ok(self.index.query(text, top_k).await?)
    }

    /// Empty the collection and forget the last ingestion.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be reset.
    pub async fn reset(&mut self) -> Result<(), CoreError> {
        let _guard = self.index.lock_for_ingestion().await;
        self.index.reset().await?;
        self.stats = None;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the collection cannot be counted.
    pub async fn collection_stats(&self) -> Result<CollectionStats, CoreError> {
        Ok(self.index.stats().await?)
    }
}

async fn insert_batch<E: EmbeddingFunction>(
    index: &VectorIndex<E>,
    chunks: &[Chunk],
    cancel: &CancellationToken,
) -> Result<usize, CoreError> {
    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    let mut texts = Vec::with_capacity(chunks.len());
    let mut metadatas = Vec::with_capacity(chunks.len());
    let mut ids = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        texts.push(chunk.text.clone());
        metadatas.push(DocumentMetadata {
            source: chunk.source.clone(),
            file_type: chunk.file_type.clone(),
            chunk_index: chunk.chunk_index,
        });
        ids.push(document_id(&chunk.source, chunk.chunk_index));
    }
    let added = index.add_documents(&texts, &metadatas, &ids).await?;
    tracing::debug!(added, "batch indexed");
    Ok(added)
}

fn format_sources(results: &QueryResult) -> String {
    results
        .metadatas
        .iter()
        .map(|m| format!("- {}", m.source))
        .collect::<Vec<_>>()
        .join("\n")
}
