mod document;
mod rag;
mod session;

pub use document::DocumentProcessor;
pub use rag::{IngestFailure, IngestOutcome, IngestReport, RagSystem};
pub use session::SessionManager;
