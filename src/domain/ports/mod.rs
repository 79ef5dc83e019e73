mod embedding;
mod generator;
mod tools;
mod vector_store;

pub use embedding::EmbeddingService;
pub use generator::{AnswerGenerator, GenerationRequest};
pub use tools::ToolExecutor;
pub use vector_store::VectorStore;
