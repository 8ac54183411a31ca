use crate::error::StoreError;
use crate::models::{QueryResponse, SentenceMetadata};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// Chroma REST backend. Collections are created on first use with cosine
/// distance, matching the similarity math downstream (`score = 1 - distance`).
pub struct ChromaStore {
    endpoint: String,
    client: Client,
    collection_ids: RwLock<HashMap<String, String>>,
}

impl ChromaStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::new(),
            collection_ids: RwLock::new(HashMap::new()),
        }
    }

    fn cached_collection_id(&self, name: &str) -> Option<String> {
        self.collection_ids
            .read()
            .ok()
            .and_then(|ids| ids.get(name).cloned())
    }

    async fn collection_id(&self, name: &str) -> Result<String, StoreError> {
        if let Some(id) = self.cached_collection_id(name) {
            return Ok(id);
        }

        let response = self
            .client
            .post(format!("{}/api/v1/collections", self.endpoint))
            .json(&json!({
                "name": name,
                "get_or_create": true,
                "metadata": { "hnsw:space": "cosine" },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let id = parsed
            .pointer("/id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: "collection response has no id".to_string(),
            })?
            .to_string();

        if let Ok(mut ids) = self.collection_ids.write() {
            ids.insert(name.to_string(), id.clone());
        }
        Ok(id)
    }
}

#[async_trait]
impl VectorIndex for ChromaStore {
    async fn ensure_collection(&self, name: &str) -> Result<(), StoreError> {
        self.collection_id(name).await.map(|_| ())
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

        if ids.is_empty() {
            return Ok(());
        }

        let collection_id = self.collection_id(collection).await?;
        let metadatas = metadatas
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        let response = self
            .client
            .post(format!(
                "{}/api/v1/collections/{}/add",
                self.endpoint, collection_id
            ))
            .json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "metadatas": metadatas,
                "documents": documents,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_embedding: &[f32],
        n_results: usize,
    ) -> Result<QueryResponse, StoreError> {
        let collection_id = self.collection_id(collection).await?;

        let response = self
            .client
            .post(format!(
                "{}/api/v1/collections/{}/query",
                self.endpoint, collection_id
            ))
            .json(&json!({
                "query_embeddings": [query_embedding],
                "n_results": n_results,
                "include": ["metadatas", "documents", "distances"],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_query_response(&parsed)
    }
}

fn first_row<'a>(parsed: &'a Value, field: &str) -> Vec<&'a Value> {
    parsed
        .pointer(&format!("/{field}/0"))
        .and_then(Value::as_array)
        .map(|row| row.iter().collect())
        .unwrap_or_default()
}

fn parse_query_response(parsed: &Value) -> Result<QueryResponse, StoreError> {
    let documents = first_row(parsed, "documents");
    let metadatas = first_row(parsed, "metadatas");
    let distances = first_row(parsed, "distances");

    if documents.len() != metadatas.len() || documents.len() != distances.len() {
        return Err(StoreError::BackendResponse {
            backend: "chroma".to_string(),
            details: format!(
                "misaligned query response: {} documents, {} metadatas, {} distances",
                documents.len(),
                metadatas.len(),
                distances.len()
            ),
        });
    }

    let mut response = QueryResponse::default();
    for index in 0..documents.len() {
        let document = documents[index]
            .as_str()
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: "document is not a string".to_string(),
            })?
            .to_string();
        let metadata: SentenceMetadata = serde_json::from_value(metadatas[index].clone())?;
        let distance = distances[index]
            .as_f64()
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: "distance is not a number".to_string(),
            })? as f32;

        response.documents.push(document);
        response.metadatas.push(metadata);
        response.distances.push(distance);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_response_rows_are_position_aligned() {
        let raw = json!({
            "ids": [["book.pdf-sent-3"]],
            "documents": [["Deep focus enables meaningful work."]],
            "metadatas": [[{
                "book": "book.pdf",
                "chapter": "Unknown",
                "page": 2,
                "paragraph_id": 1,
                "sentence_id": 3,
                "prev_sentence_id": "null",
                "next_sentence_id": 4
            }]],
            "distances": [[0.25]]
        });

        let response = parse_query_response(&raw).unwrap();
        assert_eq!(response.documents.len(), 1);
        assert_eq!(response.metadatas[0].sentence_id, 3);
        assert_eq!(response.metadatas[0].prev_sentence_id, None);
        assert_eq!(response.metadatas[0].next_sentence_id, Some(4));
        assert!((response.distances[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn misaligned_query_response_is_rejected() {
        let raw = json!({
            "documents": [["one", "two"]],
            "metadatas": [[]],
            "distances": [[0.1, 0.2]]
        });
        assert!(matches!(
            parse_query_response(&raw),
            Err(StoreError::BackendResponse { .. })
        ));
    }
}
