use crate::error::StoreError;
use crate::models::{QueryResponse, SentenceMetadata};
use async_trait::async_trait;

/// Nearest-neighbor store keyed by sentence id, queried by embedding.
///
/// `ensure_collection` is idempotent. `add` takes position-aligned lists and
/// gives no partial-add guarantee; callers buffer a whole build into one call.
/// Query distances live in cosine space, 0 meaning identical.
#[async_trait]
pub trait VectorIndex {
    async fn ensure_collection(&self, name: &str) -> Result<(), StoreError>;

    async fn add(
        &self,
        collection: &str,
        ids: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[SentenceMetadata],
        documents: &[String],
    ) -> Result<(), StoreError>;

    async fn query(
        &self,
        collection: &str,
        query_embedding: &[f32],
        n_results: usize,
    ) -> Result<QueryResponse, StoreError>;
}

#[async_trait]
impl<T: VectorIndex + Send + Sync + ?Sized> VectorIndex for &T {
    async fn ensure_collection(&self, name: &str) -> Result<(), StoreError> {
        (**self).ensure_collection(name).await
    }

    async fn add(
        &self,
        collection: &str,
        ids: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[SentenceMetadata],
        documents: &[String],
    ) -> Result<(), StoreError> {
        (**self)
            .add(collection, ids, embeddings, metadatas, documents)
            .await
    }

    async fn query(
        &self,
        collection: &str,
        query_embedding: &[f32],
        n_results: usize,
    ) -> Result<QueryResponse, StoreError> {
        (**self).query(collection, query_embedding, n_results).await
    }
}

#[async_trait]
impl<T: VectorIndex + Send + Sync + ?Sized> VectorIndex for Box<T> {
    async fn ensure_collection(&self, name: &str) -> Result<(), StoreError> {
        (**self).ensure_collection(name).await
    }

    async fn add(
        &self,
        collection: &str,
        ids: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[SentenceMetadata],
        documents: &[String],
    ) -> Result<(), StoreError> {
        (**self)
            .add(collection, ids, embeddings, metadatas, documents)
            .await
    }

    async fn query(
        &self,
        collection: &str,
        query_embedding: &[f32],
        n_results: usize,
    ) -> Result<QueryResponse, StoreError> {
        (**self).query(collection, query_embedding, n_results).await
    }
}
