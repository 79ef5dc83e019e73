mod course;
mod embedding;
mod session;

pub use course::{
    Course, CourseAnalytics, CourseChunk, Lesson, SearchQuery, SearchResult, Source,
};
pub use embedding::Embedding;
pub use session::{Exchange, MessageRole, Session};
