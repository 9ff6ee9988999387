//! Repository processing: walk → read → normalize → chunk.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::chunker::{DEFAULT_MAX_TOKENS, split_tokens};
use crate::clone::{ClonedRepo, clone_repository};
use crate::error::{CloneError, FileReadError, LoaderError, Result};
use crate::markdown::to_plain_text;
use crate::tokenizer::TokenCodec;
use crate::types::{Chunk, FileChunks, RepoStats};
use crate::walker::{
    DEFAULT_IGNORED_DIRS, DEFAULT_TEXT_EXTENSIONS, IgnoreMatch, RepoWalker, WalkedFile,
};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub max_tokens: usize,
    pub ignored_dirs: Vec<String>,
    pub text_extensions: Vec<String>,
    /// Extensions rendered from markdown to plain text before tokenizing.
    pub markdown_extensions: Vec<String>,
    pub ignore_match: IgnoreMatch,
    pub max_file_size: u64,
    pub clone_depth: Option<u32>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|s| (*s).to_owned()).collect(),
            text_extensions: DEFAULT_TEXT_EXTENSIONS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            markdown_extensions: vec![".md".to_owned()],
            ignore_match: IgnoreMatch::Substring,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            clone_depth: None,
        }
    }
}

/// Produces chunks from repositories. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct RepoLoader {
    codec: Arc<TokenCodec>,
    config: Arc<LoaderConfig>,
    walker: RepoWalker,
}

impl RepoLoader {
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidChunkSize`] if `config.max_tokens` is zero.
    pub fn new(codec: TokenCodec, mut config: LoaderConfig) -> Result<Self> {
        if config.max_tokens == 0 {
            return Err(LoaderError::InvalidChunkSize);
        }
        for ext in &mut config.markdown_extensions {
            *ext = ext.to_lowercase();
        }
        let walker = RepoWalker::new(
            config.ignored_dirs.clone(),
            config.text_extensions.clone(),
            config.ignore_match,
        );
        Ok(Self {
            codec: Arc::new(codec),
            config: Arc::new(config),
            walker,
        })
    }

    /// Clone `url` into a fresh temporary workspace.
    ///
    /// # Errors
    ///
    /// See [`clone_repository`].
    pub async fn clone_repo(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<ClonedRepo, CloneError> {
        clone_repository(url, self.config.clone_depth, cancel).await
    }

    /// Lazily chunk every accepted file under `root`, one file at a time.
    #[must_use]
    pub fn scan(&self, root: &Path) -> RepoScan {
        RepoScan {
            files: Box::new(self.walker.walk(root)),
            loader: self.clone(),
            stats: RepoStats::default(),
        }
    }

    /// Chunk the whole repository at once.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization fails. Unreadable files are skipped.
    pub fn process(&self, root: &Path) -> Result<(RepoStats, Vec<Chunk>)> {
        let mut scan = self.scan(root);
        let mut chunks = Vec::new();
        for file in scan.by_ref() {
            chunks.extend(file?.chunks);
        }
        Ok((scan.into_stats(), chunks))
    }

    fn read_file(&self, file: &WalkedFile) -> std::result::Result<String, FileReadError> {
        let io_err = |source| FileReadError::Io {
            path: file.relative.clone(),
            source,
        };
        let size = std::fs::metadata(&file.path).map_err(io_err)?.len();
        if size > self.config.max_file_size {
            return Err(FileReadError::TooLarge {
                path: file.relative.clone(),
                size,
                limit: self.config.max_file_size,
            });
        }
        let bytes = std::fs::read(&file.path).map_err(io_err)?;
        String::from_utf8(bytes).map_err(|source| FileReadError::Decode {
            path: file.relative.clone(),
            source,
        })
    }

    fn chunk_file(&self, file: &WalkedFile, content: &str) -> Result<FileChunks> {
        let normalized;
        let text = if self.config.markdown_extensions.contains(&file.extension) {
            normalized = to_plain_text(content);
            normalized.as_str()
        } else {
            content
        };

        let chunks = split_tokens(&self.codec, text, self.config.max_tokens)?
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                text,
                source: file.relative.clone(),
                file_type: file.extension.clone(),
                chunk_index,
            })
            .collect();

        Ok(FileChunks {
            source: file.relative.clone(),
            file_type: file.extension.clone(),
            chunks,
        })
    }
}

/// Finite, per-file producer over one repository.
///
/// Yields one [`FileChunks`] per readable accepted file, in walk order, and
/// accumulates [`RepoStats`] as it goes. Only one file's chunks are held at a
/// time.
pub struct RepoScan {
    files: Box<dyn Iterator<Item = WalkedFile>>,
    loader: RepoLoader,
    stats: RepoStats,
}

impl RepoScan {
    /// Counters for the files yielded so far.
    #[must_use]
    pub fn stats(&self) -> &RepoStats {
        &self.stats
    }

    #[must_use]
    pub fn into_stats(self) -> RepoStats {
        self.stats
    }
}

impl Iterator for RepoScan {
    type Item = Result<FileChunks>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let file = self.files.next()?;
            self.stats.record_file(&file.extension);

            let content = match self.loader.read_file(&file) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(file = %file.relative, "skipping file: {e}");
                    continue;
                }
            };

            let result = self.loader.chunk_file(&file, &content);
            if let Ok(chunks) = &result {
                self.stats.total_chunks += chunks.len();
                tracing::debug!(file = %file.relative, chunks = chunks.len(), "file chunked");
            }
            return Some(result);
        }
    }
}

impl std::fmt::Debug for RepoScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoScan")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn loader(max_tokens: usize) -> RepoLoader {
        RepoLoader::new(
            TokenCodec::byte_level().unwrap(),
            LoaderConfig {
                max_tokens,
                ..LoaderConfig::default()
            },
        )
        .unwrap()
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let err = RepoLoader::new(
            TokenCodec::byte_level().unwrap(),
            LoaderConfig {
                max_tokens: 0,
                ..LoaderConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, LoaderError::InvalidChunkSize));
    }

    #[test]
    fn readme_and_app_produce_three_chunks() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "README.md", "x".repeat(299).as_bytes());
        write(dir.path(), "src/app.py", "y".repeat(800).as_bytes());

        let (stats, chunks) = loader(512).process(dir.path()).unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.file_types.len(), 2);
        assert_eq!(stats.file_types[".md"], 1);
        assert_eq!(stats.file_types[".py"], 1);
        assert_eq!(stats.total_chunks, 3);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].source, "README.md");
        assert_eq!(chunks[0].file_type, ".md");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].source, "src/app.py");
        assert_eq!(chunks[1].text.len(), 512);
        assert_eq!(chunks[1].chunk_index, 0);
        assert_eq!(chunks[2].text.len(), 288);
        assert_eq!(chunks[2].chunk_index, 1);
    }

    #[test]
    fn empty_file_counts_but_has_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.txt", b"");

        let (stats, chunks) = loader(512).process(dir.path()).unwrap();
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.file_types[".txt"], 1);
        assert_eq!(stats.total_chunks, 0);
        assert!(chunks.is_empty());
    }

    #[test]
    fn disallowed_extension_contributes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "logo.png", b"\x89PNG");
        write(dir.path(), "data.json", b"{}");

        let (stats, chunks) = loader(512).process(dir.path()).unwrap();
        assert_eq!(stats, RepoStats::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn invalid_utf8_is_skipped_but_counted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a_bad.txt", &[0xff, 0xfe, 0x00]);
        write(dir.path(), "b_good.txt", b"fine");

        let (stats, chunks) = loader(512).process(dir.path()).unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.file_types[".txt"], 2);
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, "b_good.txt");
    }

    #[test]
    fn oversized_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.txt", &[b'z'; 64]);
        let loader = RepoLoader::new(
            TokenCodec::byte_level().unwrap(),
            LoaderConfig {
                max_file_size: 16,
                ..LoaderConfig::default()
            },
        )
        .unwrap();

        let (stats, chunks) = loader.process(dir.path()).unwrap();
        assert_eq!(stats.total_files, 1);
        assert!(chunks.is_empty());
    }

    #[test]
    fn markdown_is_normalized_before_chunking() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "guide.md",
            b"# Guide\n\nRead [this](https://example.com).",
        );
        write(dir.path(), "notes.txt", b"# Not markdown");

        let (_, chunks) = loader(512).process(dir.path()).unwrap();
        assert_eq!(chunks[0].text, "Guide\nRead this.\n");
        assert_eq!(chunks[1].text, "# Not markdown");
    }

    #[test]
    fn markdown_extensions_match_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "NOTES.MD", b"# Title\n\n*body*");
        let loader = RepoLoader::new(
            TokenCodec::byte_level().unwrap(),
            LoaderConfig {
                text_extensions: vec![".MD".into()],
                markdown_extensions: vec![".MD".into()],
                ..LoaderConfig::default()
            },
        )
        .unwrap();

        let (stats, chunks) = loader.process(dir.path()).unwrap();
        assert_eq!(stats.file_types[".md"], 1);
        assert_eq!(chunks[0].text, "Title\nbody\n");
    }

    #[test]
    fn ignored_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "node_modules/x/index.js", b"x");
        write(dir.path(), "venv/lib/site.py", b"x");
        write(dir.path(), "main.go", b"package main");

        let (stats, chunks) = loader(512).process(dir.path()).unwrap();
        assert_eq!(stats.total_files, 1);
        assert_eq!(chunks[0].source, "main.go");
    }

    #[test]
    fn scan_yields_per_file_and_tracks_stats() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "a".repeat(10).as_bytes());
        write(dir.path(), "b.rs", "b".repeat(25).as_bytes());

        let mut scan = loader(10).scan(dir.path());
        let first = scan.next().unwrap().unwrap();
        assert_eq!(first.source, "a.rs");
        assert_eq!(first.len(), 1);
        assert_eq!(scan.stats().total_files, 1);
        assert_eq!(scan.stats().total_chunks, 1);

        let second = scan.next().unwrap().unwrap();
        assert_eq!(second.len(), 3);
        assert!(scan.next().is_none());
        let stats = scan.into_stats();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_chunks, 4);
    }

    #[test]
    fn process_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lib.rs", b"pub fn f() {}");
        let loader = loader(4);
        let first = loader.process(dir.path()).unwrap();
        let second = loader.process(dir.path()).unwrap();
        assert_eq!(first, second);
    }
}
