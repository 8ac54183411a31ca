use crate::error::StoreError;
use crate::models::{QueryResponse, SentenceMetadata};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredSentence {
    id: String,
    embedding: Vec<f32>,
    metadata: SentenceMetadata,
    document: String,
}

/// In-process vector store with exact cosine search. Plays the role the
/// ephemeral Chroma client plays in a server-less deployment; nothing
/// persists past the process.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<StoredSentence>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|collections| {
                collections
                    .get(collection)
                    .map(|entries| entries.len())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denominator = norm_a * norm_b;
    if denominator == 0.0 {
        return 0.0;
    }
    dot / denominator
}

#[async_trait]
impl VectorIndex for MemoryStore {
    async fn ensure_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::Request("memory store lock poisoned".to_string()))?;
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn add(
        &self,
        collection: &str,
        ids: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[SentenceMetadata],
        documents: &[String],
    ) -> Result<(), StoreError> {
        if ids.len() != embeddings.len()
            || ids.len() != metadatas.len()
            || ids.len() != documents.len()
        {
            return Err(StoreError::Request(format!(
                "misaligned add: {} ids, {} embeddings, {} metadatas, {} documents",
                ids.len(),
                embeddings.len(),
                metadatas.len(),
                documents.len()
            )));
        }

        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::Request("memory store lock poisoned".to_string()))?;
        let entries = collections.entry(collection.to_string()).or_default();

        for index in 0..ids.len() {
            let sentence = StoredSentence {
                id: ids[index].clone(),
                embedding: embeddings[index].clone(),
                metadata: metadatas[index].clone(),
                document: documents[index].clone(),
            };
            // Re-adding an id replaces the point, as a server-side store would.
            match entries.iter_mut().find(|entry| entry.id == sentence.id) {
                Some(existing) => *existing = sentence,
                None => entries.push(sentence),
            }
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_embedding: &[f32],
        n_results: usize,
    ) -> Result<QueryResponse, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::Request("memory store lock poisoned".to_string()))?;
        let entries = match collections.get(collection) {
            Some(entries) => entries,
            None => return Ok(QueryResponse::default()),
        };

        let mut scored: Vec<(f32, &StoredSentence)> = entries
            .iter()
            .map(|entry| (1.0 - cosine_similarity(query_embedding, &entry.embedding), entry))
            .collect();
        scored.sort_by(|left, right| left.0.total_cmp(&right.0));
        scored.truncate(n_results);

        let mut response = QueryResponse::default();
        for (distance, entry) in scored {
            response.documents.push(entry.document.clone());
            response.metadatas.push(entry.metadata.clone());
            response.distances.push(distance);
        }

        Ok(response)
    }
}
