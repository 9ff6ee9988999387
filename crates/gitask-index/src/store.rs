use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::embedding::{EmbeddingFunction, cosine_similarity};
use crate::error::{IndexError, Result};
use crate::types::{CollectionStats, DocumentMetadata, QueryResult};

pub const DEFAULT_COLLECTION: &str = "docs_collection";

/// Suffix of the scratch collection a replacement is built in.
const STAGING_SUFFIX: &str = "#staging";

type DocumentRow = (String, String, String, String, i64, Vec<u8>);

/// One named collection in a `SQLite` database, bound to one embedding
/// function.
#[derive(Debug, Clone)]
pub struct VectorIndex<E> {
    pool: SqlitePool,
    name: String,
    embedder: E,
    write_lock: Arc<Mutex<()>>,
}

impl<E: EmbeddingFunction> VectorIndex<E> {
    /// Open (or create) the database at `path` and the collection `name`.
    ///
    /// `":memory:"` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, migrations fail, or
    /// the collection already exists with a different embedding function.
    pub async fn open(path: &str, name: &str, embedder: E) -> Result<Self> {
        if name.is_empty() {
            return Err(IndexError::Schema("collection name must not be empty".into()));
        }
        if name.ends_with(STAGING_SUFFIX) {
            return Err(IndexError::Schema(format!(
                "collection name must not end with {STAGING_SUFFIX}"
            )));
        }
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // Every connection to `sqlite::memory:` is a separate database.
        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_opts.connect_with(opts).await?;

        sqlx::migrate!().run(&pool).await?;

        let index = Self {
            pool,
            name: name.to_owned(),
            embedder,
            write_lock: Arc::new(Mutex::new(())),
        };
        index.ensure_collection().await?;
        tracing::debug!(path, collection = name, "vector index opened");
        Ok(index)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let function = self.embedder.name();
        sqlx::query(
            "INSERT INTO collections (name, embedding_function) VALUES (?, ?) \
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(&self.name)
        .bind(&function)
        .execute(&self.pool)
        .await?;

        let (stored,): (String,) =
            sqlx::query_as("SELECT embedding_function FROM collections WHERE name = ?")
                .bind(&self.name)
                .fetch_one(&self.pool)
                .await?;
        if stored != function {
            return Err(IndexError::Schema(format!(
                "collection {} uses embedding function {stored}, not {function}",
                self.name
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Serialize ingestion batches.
    ///
    /// Holding the guard across `reset` and the following inserts keeps
    /// concurrent ingestions from interleaving. Individual calls do not take
    /// it themselves.
    pub async fn lock_for_ingestion(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.write_lock).lock_owned().await
    }

    /// Embed and insert documents as one all-or-nothing batch.
    ///
    /// Every check that can fail without the model runs before the first
    /// embedding call.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Schema`] if the three slices differ in length, an
    /// id repeats within the call or already exists in the collection, or the
    /// embedding dimension differs from stored vectors. Embedding and
    /// database failures propagate; nothing is inserted in either case.
    pub async fn add_documents(
        &self,
        texts: &[String],
        metadatas: &[DocumentMetadata],
        ids: &[String],
    ) -> Result<usize> {
        if texts.len() != metadatas.len() || texts.len() != ids.len() {
            return Err(IndexError::Schema(format!(
                "texts, metadatas and ids differ in length ({}, {}, {})",
                texts.len(),
                metadatas.len(),
                ids.len()
            )));
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(IndexError::Schema(format!("duplicate id in batch: {id}")));
            }
        }
        for id in ids {
            let existing: Option<(i64,)> =
                sqlx::query_as("SELECT seq FROM documents WHERE collection = ? AND id = ?")
                    .bind(&self.name)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
            if existing.is_some() {
                return Err(IndexError::Schema(format!(
                    "id {id} already exists in collection {}",
                    self.name
                )));
            }
        }

        let mut dimension = self.stored_dimension().await?;
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let vector = self.embedder.embed(text).await?;
            match dimension {
                Some(d) if d != vector.len() => {
                    return Err(IndexError::Schema(format!(
                        "embedding dimension {} does not match collection dimension {d}",
                        vector.len()
                    )));
                }
                Some(_) => {}
                None => dimension = Some(vector.len()),
            }
            vectors.push(vector);
        }

        let mut tx = self.pool.begin().await?;
        for (((id, text), meta), vector) in ids.iter().zip(texts).zip(metadatas).zip(&vectors) {
            let chunk_index = i64::try_from(meta.chunk_index)?;
            let result = sqlx::query(
                "INSERT INTO documents \
                 (collection, id, text, source, file_type, chunk_index, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&self.name)
            .bind(id)
            .bind(text)
            .bind(&meta.source)
            .bind(&meta.file_type)
            .bind(chunk_index)
            .bind(encode_vector(vector))
            .execute(&mut *tx)
            .await;
            if let Err(sqlx::Error::Database(e)) = &result
                && e.is_unique_violation()
            {
                return Err(IndexError::Schema(format!(
                    "id {id} already exists in collection {}",
                    self.name
                )));
            }
            result?;
        }
        tx.commit().await?;

        tracing::debug!(collection = %self.name, count = ids.len(), "documents added");
        Ok(ids.len())
    }

    /// Up to `top_k` documents nearest to `text` by cosine distance.
    ///
    /// An empty collection or `top_k == 0` returns an empty result without
    /// calling the embedding function. Equal distances keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or reading the collection fails, or the
    /// query vector's dimension differs from the stored vectors.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<QueryResult> {
        if top_k == 0 || self.count().await? == 0 {
            return Ok(QueryResult::default());
        }

        let query = self.embedder.embed(text).await?;
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, text, source, file_type, chunk_index, embedding FROM documents \
             WHERE collection = ? ORDER BY seq ASC",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            let vector = decode_vector(&row.5);
            if vector.len() != query.len() {
                return Err(IndexError::Schema(format!(
                    "query dimension {} does not match stored dimension {}",
                    query.len(),
                    vector.len()
                )));
            }
            scored.push((1.0 - cosine_similarity(&query, &vector), position));
        }
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(top_k);

        let mut result = QueryResult::default();
        for (distance, position) in scored {
            let (id, text, source, file_type, chunk_index, _) = &rows[position];
            result.push(
                id.clone(),
                text.clone(),
                DocumentMetadata {
                    source: source.clone(),
                    file_type: file_type.clone(),
                    chunk_index: usize::try_from(*chunk_index)?,
                },
                distance,
            );
        }
        Ok(result)
    }

    /// Drop every document and recreate the collection under the same name
    /// and embedding function, atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; the collection is unchanged.
    pub async fn reset(&self) -> Result<()> {
        self.clear().await?;
        tracing::info!(collection = %self.name, "collection reset");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM documents WHERE collection = ?")
            .bind(&self.name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(&self.name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO collections (name, embedding_function) VALUES (?, ?)")
            .bind(&self.name)
            .bind(self.embedder.name())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Start building a replacement for this collection.
    ///
    /// Documents added to the returned index stay invisible to this one until
    /// [`VectorIndex::commit_replacement`]. Leftovers of an interrupted
    /// replacement are cleared first.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch collection cannot be created.
    pub async fn begin_replacement(&self) -> Result<Self>
    where
        E: Clone,
    {
        let staging = Self {
            pool: self.pool.clone(),
            name: format!("{}{STAGING_SUFFIX}", self.name),
            embedder: self.embedder.clone(),
            write_lock: Arc::clone(&self.write_lock),
        };
        staging.clear().await?;
        Ok(staging)
    }

    /// Swap in the documents of `staging` in one transaction, dropping the
    /// current ones. Returns the number of documents now in the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; both collections are then
    /// unchanged.
    pub async fn commit_replacement(&self, staging: &Self) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM documents WHERE collection = ?")
            .bind(&self.name)
            .execute(&mut *tx)
            .await?;
        let moved = sqlx::query("UPDATE documents SET collection = ? WHERE collection = ?")
            .bind(&self.name)
            .bind(&staging.name)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(&staging.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(collection = %self.name, documents = moved, "collection replaced");
        Ok(usize::try_from(moved)?)
    }

    /// Drop a replacement started with [`VectorIndex::begin_replacement`].
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch collection cannot be deleted.
    pub async fn discard(self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM documents WHERE collection = ?")
            .bind(&self.name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(&self.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::debug!(collection = %self.name, "replacement discarded");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub async fn stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            count: self.count().await?,
            name: self.name.clone(),
        })
    }

    async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count)?)
    }

    async fn stored_dimension(&self) -> Result<Option<usize>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT length(embedding) FROM documents WHERE collection = ? LIMIT 1",
        )
        .bind(&self.name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(bytes,)| usize::try_from(bytes).map(|b| b / 4))
            .transpose()
            .map_err(IndexError::from)
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
