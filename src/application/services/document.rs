use std::path::Path;
use tracing::instrument;

use crate::domain::{chunk_text, parse_course, Course, CourseChunk, DomainError};

/// Parses course files and splits their lessons into indexed chunks.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    #[instrument(skip(self))]
    pub async fn process_file(&self, path: &Path) -> Result<(Course, Vec<CourseChunk>), DomainError> {
        let text = tokio::fs::read_to_string(path).await?;
        self.process_text(&text)
    }

    pub fn process_text(&self, text: &str) -> Result<(Course, Vec<CourseChunk>), DomainError> {
        let parsed = parse_course(text)?;
        let title = parsed.course.title.clone();

        let mut chunks = Vec::new();
        for section in &parsed.sections {
            for piece in chunk_text(&section.text, self.chunk_size, self.chunk_overlap) {
                let content = match section.lesson_number {
                    Some(n) => format!("Course {title} Lesson {n} content: {piece}"),
                    None => format!("Course {title} content: {piece}"),
                };
                chunks.push(CourseChunk::new(
                    &title,
                    section.lesson_number,
                    chunks.len(),
                    content,
                ));
            }
        }

        Ok((parsed.course, chunks))
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(800, 100)
    }
}
