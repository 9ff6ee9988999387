use serde::{Deserialize, Serialize};

/// Provenance stored beside each document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    pub file_type: String,
    pub chunk_index: usize,
}

/// Ranked hits as parallel sequences of equal length, nearest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<DocumentMetadata>,
    /// Cosine distance (`1 - cosine similarity`), ascending.
    pub distances: Vec<f32>,
}

impl QueryResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub(crate) fn push(
        &mut self,
        id: String,
        document: String,
        metadata: DocumentMetadata,
        distance: f32,
    ) {
        self.ids.push(id);
        self.documents.push(document);
        self.metadatas.push(metadata);
        self.distances.push(distance);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub count: usize,
    pub name: String,
}
