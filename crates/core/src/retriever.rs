use crate::claims::extract_key_claims;
use crate::embeddings::Embedder;
use crate::error::{IngestError, RetrieveError};
use crate::extractor::{extract_page_texts, PageText};
use crate::indexer::DEFAULT_COLLECTION;
use crate::models::{Candidate, RetrievalResult, SentenceMetadata};
use crate::segment::{build_sentence_id_map, Segmenter};
use crate::traits::VectorIndex;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::debug;

const RESULTS_PER_QUERY: usize = 2;
const MAX_TOP_K: usize = 10;
const DIVERSITY_JACCARD_CEILING: f32 = 0.9;

/// Retrieves indexed sentences relevant to a student essay.
///
/// Two-state lifecycle: uninitialized until the first `ainit` (or first
/// `retrieve`) builds the full id-to-sentence map, initialized and read-only
/// afterwards. Initialization is idempotent; concurrent `retrieve` calls are
/// safe once the map exists.
pub struct SentenceRetriever<E, S> {
    book_path: PathBuf,
    embedder: E,
    store: S,
    collection: String,
    id_map: OnceCell<HashMap<u64, String>>,
}

struct FusedHit {
    text: String,
    metadata: SentenceMetadata,
    similarity: f32,
}

impl<E, S> SentenceRetriever<E, S>
where
    E: Embedder + Send + Sync,
    S: VectorIndex + Send + Sync,
{
    pub fn new(book_path: impl Into<PathBuf>, embedder: E, store: S) -> Self {
        Self::with_collection(book_path, embedder, store, DEFAULT_COLLECTION)
    }

    pub fn with_collection(
        book_path: impl Into<PathBuf>,
        embedder: E,
        store: S,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            book_path: book_path.into(),
            embedder,
            store,
            collection: collection.into(),
            id_map: OnceCell::new(),
        }
    }

    /// Builds the id map by re-extracting and re-segmenting the book with no
    /// filtering, so ids line up with the indexing pass and context can reach
    /// sentences the index excluded. Idempotent.
    pub async fn ainit(&self) -> Result<(), RetrieveError> {
        self.initialized_id_map().await.map(|_| ())
    }

    /// Seeds initialization from already-extracted pages. A no-op when the
    /// map is already built.
    pub async fn ainit_with_pages(&self, pages: &[PageText]) -> Result<(), RetrieveError> {
        self.id_map
            .get_or_try_init(|| async {
                build_sentence_id_map(pages).map_err(|error| IngestError::from(error).into())
            })
            .await
            .map(|_| ())
    }

    async fn initialized_id_map(&self) -> Result<&HashMap<u64, String>, RetrieveError> {
        self.id_map
            .get_or_try_init(|| async {
                let path = self.book_path.clone();
                let pages = tokio::task::spawn_blocking(move || extract_page_texts(&path))
                    .await
                    .map_err(|join_error| IngestError::Task(join_error.to_string()))??;
                let id_map =
                    build_sentence_id_map(&pages).map_err(IngestError::from)?;
                Ok::<_, RetrieveError>(id_map)
            })
            .await
    }

    pub async fn retrieve(
        &self,
        student_essay: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrieveError> {
        if student_essay.is_empty() {
            return Err(RetrieveError::InvalidInput(
                "student essay must not be empty".to_string(),
            ));
        }
        if top_k < 1 || top_k > MAX_TOP_K {
            return Err(RetrieveError::InvalidInput(format!(
                "top_k must be between 1 and {MAX_TOP_K}, got {top_k}"
            )));
        }

        let id_map = self.initialized_id_map().await?;

        let segmenter = Segmenter::new().map_err(IngestError::from)?;
        let paragraphs = segmenter.split_into_paragraphs(student_essay);
        let key_claims = extract_key_claims(&segmenter, student_essay, paragraphs.len().max(1))
            .map_err(IngestError::from)?;

        let mut queries = paragraphs;
        queries.extend(key_claims);
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vectors = self.embedder.embed(&queries).await?;

        let mut candidates = Vec::new();
        for vector in &query_vectors {
            let response = self
                .store
                .query(&self.collection, vector, RESULTS_PER_QUERY)
                .await?;
            for index in 0..response.documents.len() {
                candidates.push(Candidate {
                    text: response.documents[index].clone(),
                    metadata: response.metadatas[index].clone(),
                    distance: response.distances[index],
                });
            }
        }
        debug!(queries = queries.len(), candidates = candidates.len(), "collected candidates");

        let fused = fuse_by_best_score(candidates);
        let diverse = diversity_filter(fused).map_err(IngestError::from)?;
        debug!(fused_and_diverse = diverse.len(), "after fusion and diversity filtering");

        let mut results = Vec::with_capacity(top_k.min(diverse.len()));
        for hit in diverse.into_iter().take(top_k) {
            let neighbor = |id: Option<u64>| {
                id.and_then(|id| id_map.get(&id))
                    .cloned()
                    .unwrap_or_default()
            };
            let previous = neighbor(hit.metadata.prev_sentence_id);
            let next = neighbor(hit.metadata.next_sentence_id);

            results.push(RetrievalResult {
                context: Some(format!("{previous} --{}-- {next}", hit.text)),
                sentence: hit.text,
                score: round_score(hit.similarity),
                chapter: Some(hit.metadata.chapter),
                page: Some(hit.metadata.page),
            });
        }

        Ok(results)
    }
}

/// Groups candidates by exact sentence text, keeping the best similarity
/// (`1 - distance`) per sentence, then ranks by similarity descending.
fn fuse_by_best_score(candidates: Vec<Candidate>) -> Vec<FusedHit> {
    let mut best: HashMap<String, FusedHit> = HashMap::new();

    for candidate in candidates {
        let similarity = 1.0 - candidate.distance;
        match best.get_mut(&candidate.text) {
            Some(existing) if existing.similarity >= similarity => {}
            Some(existing) => {
                existing.metadata = candidate.metadata;
                existing.similarity = similarity;
            }
            None => {
                best.insert(
                    candidate.text.clone(),
                    FusedHit {
                        text: candidate.text,
                        metadata: candidate.metadata,
                        similarity,
                    },
                );
            }
        }
    }

    let mut fused: Vec<FusedHit> = best.into_values().collect();
    fused.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
    fused
}

/// Greedy near-duplicate suppression over the ranked list: a hit survives only
/// if its token set stays at or below the Jaccard ceiling against every
/// already-accepted hit, so each near-duplicate cluster keeps its best-scoring
/// representative.
fn diversity_filter(fused: Vec<FusedHit>) -> Result<Vec<FusedHit>, regex::Error> {
    let token_pattern = Regex::new(r"[a-zA-Z]{4,}")?;
    let mut accepted_token_sets: Vec<HashSet<String>> = Vec::new();
    let mut accepted = Vec::new();

    for hit in fused {
        let tokens: HashSet<String> = token_pattern
            .find_iter(&hit.text.to_lowercase())
            .map(|word| word.as_str().to_string())
            .collect();

        let too_similar = accepted_token_sets
            .iter()
            .any(|seen| jaccard(&tokens, seen) > DIVERSITY_JACCARD_CEILING);
        if too_similar {
            continue;
        }

        accepted_token_sets.push(tokens);
        accepted.push(hit);
    }

    Ok(accepted)
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f32 / union.max(1) as f32
}

fn round_score(similarity: f32) -> f32 {
    (similarity.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

impl<E, S> SentenceRetriever<E, S> {
    pub fn book_path(&self) -> &Path {
        &self.book_path
    }

    pub fn is_initialized(&self) -> bool {
        self.id_map.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use crate::error::EmbeddingError;
    use crate::indexer::OfflineIndexer;
    use crate::stores::MemoryStore;
    use async_trait::async_trait;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    fn content_page(number: u32, lead: &str) -> PageText {
        page(
            number,
            &format!(
                "{lead}\n\n{}",
                "The surrounding prose keeps this page firmly in narrative territory. "
                    .repeat(4)
            ),
        )
    }

    async fn indexed_store(pages: &[PageText]) -> MemoryStore {
        let store = MemoryStore::new();
        OfflineIndexer::new(HashedNgramEmbedder::default(), &store)
            .build_from_pages("book.pdf", pages)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn validation_errors_precede_any_initialization() {
        let store = MemoryStore::new();
        let retriever = SentenceRetriever::new(
            "/nonexistent/book.pdf",
            HashedNgramEmbedder::default(),
            &store,
        );

        let empty = retriever.retrieve("", 5).await;
        assert!(matches!(empty, Err(RetrieveError::InvalidInput(_))));

        let out_of_range = retriever.retrieve("A fine essay.", 11).await;
        assert!(matches!(out_of_range, Err(RetrieveError::InvalidInput(_))));

        let zero = retriever.retrieve("A fine essay.", 0).await;
        assert!(matches!(zero, Err(RetrieveError::InvalidInput(_))));

        // The bogus path was never touched.
        assert!(!retriever.is_initialized());
    }

    #[tokio::test]
    async fn metadata_pages_are_invisible_to_retrieval() {
        let pages = vec![
            page(1, "Digital Minimalism\nBy Cal Newport"),
            content_page(2, "Deep focus enables meaningful work."),
        ];
        let store = indexed_store(&pages).await;

        let retriever =
            SentenceRetriever::new("book.pdf", HashedNgramEmbedder::default(), &store);
        retriever.ainit_with_pages(&pages).await.unwrap();

        let results = retriever
            .retrieve("Deep work requires sustained focus.", 5)
            .await
            .unwrap();

        let hit = results
            .iter()
            .find(|result| result.sentence == "Deep focus enables meaningful work.")
            .expect("the content-page sentence should be retrieved");
        assert_eq!(hit.page, Some(2));
        assert_eq!(hit.chapter.as_deref(), Some("Unknown"));
        assert!(results
            .iter()
            .all(|result| result.page != Some(1)));
    }

    #[tokio::test]
    async fn context_spans_paragraph_neighbors() {
        let pages = vec![content_page(
            1,
            "Alpine rivers run cold through the valley all year. \
             Glacier melt feeds them from the high slopes above. \
             Trout thrive in that clear icy water nonetheless.",
        )];
        let store = indexed_store(&pages).await;

        let retriever =
            SentenceRetriever::new("book.pdf", HashedNgramEmbedder::default(), &store);
        retriever.ainit_with_pages(&pages).await.unwrap();

        let results = retriever
            .retrieve("Glacier melt feeds them from the high slopes above.", 5)
            .await
            .unwrap();

        let middle = results
            .iter()
            .find(|result| {
                result.sentence == "Glacier melt feeds them from the high slopes above."
            })
            .expect("middle sentence should be retrieved");
        assert_eq!(
            middle.context.as_deref(),
            Some(
                "Alpine rivers run cold through the valley all year. \
                 --Glacier melt feeds them from the high slopes above.-- \
                 Trout thrive in that clear icy water nonetheless."
            )
        );
    }

    struct ScriptedEmbedder;

    #[async_trait]
    impl Embedder for ScriptedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|text| {
                    if text.contains("aligned") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.6, 0.8]
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn fusion_keeps_the_best_score_per_sentence() {
        let store = MemoryStore::new();
        store
            .add(
                "sentences",
                &["book.pdf-sent-0".to_string()],
                &[vec![1.0, 0.0]],
                &[SentenceMetadata {
                    book: "book.pdf".to_string(),
                    chapter: "Unknown".to_string(),
                    page: 1,
                    paragraph_id: 0,
                    sentence_id: 0,
                    prev_sentence_id: None,
                    next_sentence_id: None,
                }],
                &["The indexed sentence.".to_string()],
            )
            .await
            .unwrap();

        let retriever = SentenceRetriever::new("book.pdf", ScriptedEmbedder, &store);
        retriever
            .ainit_with_pages(&[page(1, "The indexed sentence.")])
            .await
            .unwrap();

        // Two paragraphs produce an aligned query (similarity 1.0) and an
        // off-axis query (similarity 0.6) hitting the same sentence.
        let results = retriever
            .retrieve("An aligned paragraph.\n\nSome other paragraph.", 5)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn near_duplicates_are_suppressed_and_top_k_is_honored() {
        let pages = vec![content_page(
            1,
            "Deep practice builds lasting skill over the years. \
             Lasting skill builds deep practice over the years.",
        )];
        let store = indexed_store(&pages).await;

        let retriever =
            SentenceRetriever::new("book.pdf", HashedNgramEmbedder::default(), &store);
        retriever.ainit_with_pages(&pages).await.unwrap();

        let results = retriever
            .retrieve("Deep practice builds lasting skill over the years.", 1)
            .await
            .unwrap();

        // The token-identical twin is dropped; top_k caps the rest.
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].sentence,
            "Deep practice builds lasting skill over the years."
        );
    }
}
