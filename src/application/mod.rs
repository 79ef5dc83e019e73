//! Application layer - Use cases and orchestration.
//!
//! Services here compose the domain ports (vector store, embeddings, answer
//! generation) without knowing which concrete adapters back them.

pub mod services;
pub mod tools;

pub use services::{
    DocumentProcessor, IngestFailure, IngestOutcome, IngestReport, RagSystem, SessionManager,
};
pub use tools::ToolRegistry;
