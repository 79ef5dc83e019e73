pub mod config;
pub mod embedding;
pub mod llm;
pub mod vector_store;

pub use config::{Config, ConfigError, LogFormat, VectorBackend};
pub use embedding::TextEmbedding;
pub use llm::AnthropicGenerator;
pub use vector_store::{build_vector_store, InMemoryVectorStore, QdrantVectorStore};
