use crate::domain::{errors::DomainError, Course, CourseChunk, SearchQuery, SearchResult};
use async_trait::async_trait;

/// Two logical collections: one metadata record per course (used to resolve
/// course names) and every content chunk (used for semantic search).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upserts the course record keyed by title.
    async fn add_course_metadata(&self, course: &Course) -> Result<(), DomainError>;

    /// Upserts chunks keyed by `(course_title, chunk_index)`.
    async fn add_course_chunks(&self, chunks: &[CourseChunk]) -> Result<(), DomainError>;

    /// Ranked content search. A course filter that matches no indexed course
    /// yields an empty result rather than an error.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, DomainError>;

    async fn existing_course_titles(&self) -> Result<Vec<String>, DomainError>;

    async fn course_count(&self) -> Result<usize, DomainError> {
        Ok(self.existing_course_titles().await?.len())
    }

    /// Resolves a possibly partial course name to the indexed course record.
    async fn course_outline(&self, course_name: &str) -> Result<Option<Course>, DomainError>;

    /// Exact-title lookup of a course record, without name resolution.
    async fn course_by_title(&self, title: &str) -> Result<Option<Course>, DomainError>;

    /// Drops both collections' contents.
    async fn clear_all(&self) -> Result<(), DomainError>;
}
