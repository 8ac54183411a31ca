use clap::{Parser, Subcommand};
use essay_evidence_core::{
    ChromaStore, Embedder, EmbeddingClient, HashedNgramEmbedder, MemoryStore, OfflineIndexer,
    SentenceRetriever, VectorIndex, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_ENDPOINT,
    DEFAULT_EMBEDDING_MODEL,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "essay-evidence", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenAI-compatible embeddings endpoint (e.g. vLLM).
    #[arg(long, env = "EMBEDDING_ENDPOINT", default_value = DEFAULT_EMBEDDING_ENDPOINT)]
    embedding_url: String,

    /// Embedding model name passed to the endpoint.
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Use the offline hashing embedder instead of the HTTP endpoint.
    #[arg(long, default_value_t = false)]
    local_embedder: bool,

    /// Chroma base URL. Without it, an in-process store is used and the index
    /// lives only for the duration of the command.
    #[arg(long, env = "CHROMA_URL")]
    chroma_url: Option<String>,

    /// Vector collection name.
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    collection: String,
}

#[derive(Subcommand)]
enum Command {
    /// Segment a PDF book and index its content sentences.
    Index {
        /// Path to the PDF book.
        #[arg(long)]
        book: PathBuf,
    },
    /// Retrieve book sentences supporting a student essay.
    Retrieve {
        /// Path to the PDF book (used to rebuild the sentence id map).
        #[arg(long)]
        book: PathBuf,
        /// Essay text, inline.
        #[arg(long, conflicts_with = "essay_file")]
        essay: Option<String>,
        /// Essay text, from a file.
        #[arg(long)]
        essay_file: Option<PathBuf>,
        /// Number of results to return (1-10).
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Skip rebuilding the index first. Only useful with a Chroma server
        /// that already holds this book's collection.
        #[arg(long, default_value_t = false)]
        reuse_index: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder: Box<dyn Embedder + Send + Sync> = if cli.local_embedder {
        Box::new(HashedNgramEmbedder::default())
    } else {
        Box::new(EmbeddingClient::new(
            cli.embedding_url.as_str(),
            cli.embedding_model.as_str(),
        )?)
    };

    let store: Box<dyn VectorIndex + Send + Sync> = match &cli.chroma_url {
        Some(url) => Box::new(ChromaStore::new(url.as_str())),
        None => {
            if matches!(cli.command, Command::Index { .. }) {
                warn!("no --chroma-url given; the in-process index is discarded on exit");
            }
            Box::new(MemoryStore::new())
        }
    };

    match cli.command {
        Command::Index { book } => {
            let indexer =
                OfflineIndexer::with_collection(&embedder, &store, cli.collection.as_str());
            let report = indexer.build_index(&book).await?;

            println!(
                "{} sentences indexed ({} excluded) at {}",
                report.indexed_sentences,
                report.excluded.len(),
                report.built_at.to_rfc3339()
            );
        }
        Command::Retrieve {
            book,
            essay,
            essay_file,
            top_k,
            reuse_index,
        } => {
            let essay = match (essay, essay_file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path).await?,
                (None, None) => anyhow::bail!("provide --essay or --essay-file"),
            };

            if !reuse_index {
                let indexer =
                    OfflineIndexer::with_collection(&embedder, &store, cli.collection.as_str());
                let report = indexer.build_index(&book).await?;
                info!(indexed = report.indexed_sentences, "index built before retrieval");
            }

            let retriever = SentenceRetriever::with_collection(
                &book,
                &embedder,
                &store,
                cli.collection.as_str(),
            );
            let results = retriever.retrieve(&essay, top_k).await?;

            if results.is_empty() {
                println!("no matching sentences");
            }
            for result in results {
                println!("Sentence: {}", result.sentence);
                println!("Score: {}", result.score);
                if let Some(context) = &result.context {
                    println!("Context: {context}");
                }
                println!(
                    "Location: Chapter {}, Page {}",
                    result.chapter.as_deref().unwrap_or("Unknown"),
                    result
                        .page
                        .map(|page| page.to_string())
                        .unwrap_or_else(|| "?".to_string())
                );
                println!("---");
            }
        }
    }

    Ok(())
}
