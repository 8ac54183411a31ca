use crate::classify::PageLabel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-sentence metadata stored alongside the embedding.
///
/// `prev_sentence_id`/`next_sentence_id` are paragraph-local: a sentence at a
/// paragraph boundary has no neighbor on that side. On the wire they are
/// encoded as the string `"null"` when absent, because vector-store metadata
/// values must be scalars.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentenceMetadata {
    pub book: String,
    pub chapter: String,
    pub page: u32,
    pub paragraph_id: u64,
    pub sentence_id: u64,
    #[serde(with = "nullable_id")]
    pub prev_sentence_id: Option<u64>,
    #[serde(with = "nullable_id")]
    pub next_sentence_id: Option<u64>,
}

/// One raw hit from a single index query, before fusion.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    pub metadata: SentenceMetadata,
    pub distance: f32,
}

/// A retrieved evidence sentence with its surrounding context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub sentence: String,
    pub score: f32,
    pub context: Option<String>,
    pub chapter: Option<String>,
    pub page: Option<u32>,
}

/// A sentence kept out of the index, retained for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedSentence {
    pub page: u32,
    pub label: PageLabel,
    pub confidence: f32,
    pub sentence: String,
}

/// Summary of one index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub book: String,
    pub indexed_sentences: usize,
    pub excluded: Vec<ExcludedSentence>,
    pub unmatched_chapter_sentences: u64,
    pub built_at: DateTime<Utc>,
}

/// Position-aligned response of one nearest-neighbor query.
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub documents: Vec<String>,
    pub metadatas: Vec<SentenceMetadata>,
    pub distances: Vec<f32>,
}

mod nullable_id {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => serializer.serialize_u64(*id),
            None => serializer.serialize_str("null"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(number) => number
                .as_u64()
                .map(Some)
                .ok_or_else(|| D::Error::custom("sentence id is not a non-negative integer")),
            Value::String(text) if text == "null" => Ok(None),
            Value::Null => Ok(None),
            other => Err(D::Error::custom(format!(
                "unexpected sentence id value: {other}"
            ))),
        }
    }
}
