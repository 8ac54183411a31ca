pub mod chapters;
pub mod claims;
pub mod classify;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod indexer;
pub mod models;
pub mod retriever;
pub mod segment;
pub mod stores;
pub mod traits;

pub use chapters::{AlignmentCursor, ChapterScanner, FlatSentence};
pub use claims::extract_key_claims;
pub use classify::{PageClassification, PageClassifier, PageLabel};
pub use embeddings::{
    Embedder, EmbeddingClient, HashedNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_ENDPOINT, DEFAULT_EMBEDDING_MODEL,
};
pub use error::{EmbeddingError, IngestError, RetrieveError, StoreError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use filter::SentenceFilter;
pub use indexer::{OfflineIndexer, DEFAULT_COLLECTION};
pub use models::{
    Candidate, ExcludedSentence, IndexReport, QueryResponse, RetrievalResult, SentenceMetadata,
};
pub use retriever::SentenceRetriever;
pub use segment::{
    build_sentence_id_map, normalize_whitespace, ParagraphSegment, SegmentCounters, Segmenter,
    SentenceSegment,
};
pub use stores::{ChromaStore, MemoryStore};
pub use traits::VectorIndex;
