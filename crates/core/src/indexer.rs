use crate::chapters::{AlignmentCursor, ChapterScanner};
use crate::classify::{PageClassifier, PageLabel};
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IngestError};
use crate::extractor::{extract_page_texts, PageText};
use crate::filter::SentenceFilter;
use crate::models::{ExcludedSentence, IndexReport, SentenceMetadata};
use crate::segment::{SegmentCounters, Segmenter};
use crate::traits::VectorIndex;
use chrono::Utc;
use std::path::Path;
use tracing::{error, info};

pub const DEFAULT_COLLECTION: &str = "sentences";

/// Builds the sentence index for one book: segment, classify, align chapters,
/// filter, embed once, store once.
///
/// The whole build is buffered before the single store call, so a failure
/// anywhere leaves the collection without a partial write. At most one build
/// per collection at a time; callers serialize writers.
pub struct OfflineIndexer<E, S> {
    embedder: E,
    store: S,
    collection: String,
}

impl<E, S> OfflineIndexer<E, S>
where
    E: Embedder + Send + Sync,
    S: VectorIndex + Send + Sync,
{
    pub fn new(embedder: E, store: S) -> Self {
        Self::with_collection(embedder, store, DEFAULT_COLLECTION)
    }

    pub fn with_collection(embedder: E, store: S, collection: impl Into<String>) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    pub async fn build_index(&self, pdf_path: &Path) -> Result<IndexReport, IngestError> {
        let book = pdf_path.to_string_lossy().to_string();
        let extraction_path = pdf_path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || extract_page_texts(&extraction_path))
            .await
            .map_err(|join_error| IngestError::Task(join_error.to_string()))?;

        let result = match pages {
            Ok(pages) => self.build_from_pages(&book, &pages).await,
            Err(extraction_error) => Err(extraction_error),
        };

        if let Err(build_error) = &result {
            error!(book = %book, error = %build_error, "index build failed");
        }
        result
    }

    /// The extraction-free pipeline; `build_index` feeds it PDF pages.
    pub async fn build_from_pages(
        &self,
        book: &str,
        pages: &[PageText],
    ) -> Result<IndexReport, IngestError> {
        let segmenter = Segmenter::new()?;
        let classifier = PageClassifier::new()?;
        let filter = SentenceFilter::new()?;
        let scanner = ChapterScanner::new()?;

        let flat_pages = scanner.scan(pages, &segmenter);

        let mut counters = SegmentCounters::default();
        let mut documents = Vec::new();
        let mut metadatas: Vec<SentenceMetadata> = Vec::new();
        let mut ids = Vec::new();
        let mut excluded = Vec::new();
        let mut unmatched_chapter_sentences = 0u64;

        for (page, flat) in pages.iter().zip(&flat_pages) {
            let classification = classifier.classify(&page.text);
            let mut cursor = AlignmentCursor::new(flat);

            for paragraph in segmenter.segment_page(&page.text, &mut counters) {
                for sentence in paragraph.sentences {
                    let chapter = cursor.chapter_for(&sentence.text);
                    let metadata = SentenceMetadata {
                        book: book.to_string(),
                        chapter,
                        page: page.number,
                        paragraph_id: paragraph.paragraph_id,
                        sentence_id: sentence.sentence_id,
                        prev_sentence_id: sentence.prev_sentence_id,
                        next_sentence_id: sentence.next_sentence_id,
                    };

                    if classification.label != PageLabel::Content
                        || !filter.is_content(&sentence.text)
                    {
                        excluded.push(ExcludedSentence {
                            page: page.number,
                            label: classification.label,
                            confidence: classification.confidence,
                            sentence: sentence.text.chars().take(200).collect(),
                        });
                    } else {
                        ids.push(format!("{book}-sent-{}", sentence.sentence_id));
                        documents.push(sentence.text);
                        metadatas.push(metadata);
                    }
                }
            }

            unmatched_chapter_sentences += cursor.unmatched();
        }

        let embeddings = self.embedder.embed(&documents).await?;
        if embeddings.len() != documents.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: documents.len(),
                actual: embeddings.len(),
            }
            .into());
        }

        self.store.ensure_collection(&self.collection).await?;
        self.store
            .add(&self.collection, &ids, &embeddings, &metadatas, &documents)
            .await?;

        info!(
            book = %book,
            indexed = documents.len(),
            excluded = excluded.len(),
            unmatched_chapter_sentences,
            "index built"
        );

        Ok(IndexReport {
            book: book.to_string(),
            indexed_sentences: documents.len(),
            excluded,
            unmatched_chapter_sentences,
            built_at: Utc::now(),
        })
    }
}
