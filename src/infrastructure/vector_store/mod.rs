mod in_memory;
mod qdrant;

pub use in_memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;

use std::sync::Arc;
use tracing::info;

use crate::domain::{
    ports::{EmbeddingService, VectorStore},
    DomainError,
};
use crate::infrastructure::config::{RagConfig, VectorBackend, VectorStoreConfig};

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.35;

const FALLBACK_MAX_RESULTS: usize = 5;

/// Result count for a query: explicit limit, else the configured maximum,
/// with 0 treated as unset.
pub(crate) fn effective_limit(requested: Option<usize>, configured: usize) -> usize {
    match requested.filter(|n| *n > 0) {
        Some(n) => n,
        None if configured > 0 => configured,
        None => FALLBACK_MAX_RESULTS,
    }
}

/// A provider that returns fewer vectors than texts would otherwise leave
/// chunks silently unindexed once zipped.
pub(crate) fn check_embedding_count(expected: usize, got: usize) -> Result<(), DomainError> {
    if got == expected {
        Ok(())
    } else {
        Err(DomainError::external(format!(
            "expected {expected} embeddings, got {got}"
        )))
    }
}

pub async fn build_vector_store(
    store: &VectorStoreConfig,
    rag: &RagConfig,
    embedding: Arc<dyn EmbeddingService>,
) -> Result<Arc<dyn VectorStore>, DomainError> {
    match store.backend {
        VectorBackend::Local => {
            let local = InMemoryVectorStore::open(embedding, &store.path)
                .await?
                .with_max_results(rag.max_results)
                .with_match_threshold(rag.course_match_threshold);
            Ok(Arc::new(local))
        }
        VectorBackend::Qdrant => {
            info!(url = %store.qdrant_url, "connecting to qdrant");
            let qdrant = QdrantVectorStore::new(&store.qdrant_url, embedding)
                .await?
                .with_max_results(rag.max_results)
                .with_match_threshold(rag.course_match_threshold);
            Ok(Arc::new(qdrant))
        }
    }
}
