use async_trait::async_trait;
use rig::client::EmbeddingsClient;
use rig::embeddings::EmbeddingModel;
use rig::providers::openai;
use tracing::debug;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::EmbeddingConfig;

/// Embeddings through any OpenAI-compatible endpoint.
pub struct TextEmbedding {
    client: openai::Client,
    model: String,
    dimension: usize,
}

impl TextEmbedding {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, DomainError> {
        let builder = openai::Client::builder().api_key(&config.api_key);
        let builder = match &config.base_url {
            Some(url) => builder.base_url(&normalize_base_url(url)),
            None => builder,
        };
        let client = builder
            .build()
            .map_err(|e| DomainError::external(format!("Failed to create embedding client: {e}")))?;

        Ok(Self {
            client,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    /// Embeds `texts` in provider-sized batches. The result is index-aligned
    /// with the input.
    async fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        let model = self.client.embedding_model(&self.model);

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size(&model)) {
            let vectors = model
                .embed_texts(batch.iter().map(|t| t.to_string()))
                .await
                .map_err(|e| DomainError::external(e.to_string()))?;
            embeddings.extend(vectors.into_iter().map(|e| Embedding::from(e.vec)));
        }
        debug!(count = embeddings.len(), model = %self.model, "embedded texts");

        Ok(embeddings)
    }
}

fn batch_size<M: EmbeddingModel>(_model: &M) -> usize {
    M::MAX_DOCUMENTS.max(1)
}

/// rig routes requests relative to a base URL ending in `/v1`.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if url.ends_with("/v1") {
        url.to_string()
    } else {
        format!("{url}/v1")
    }
}

#[async_trait]
impl EmbeddingService for TextEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.embed_texts(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::internal("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_texts(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
