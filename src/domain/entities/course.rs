use serde::{Deserialize, Serialize};
use std::fmt;

/// A course parsed from one transcript file. The title doubles as the
/// primary key of the metadata collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            course_link: None,
            instructor: None,
            lessons: Vec::new(),
        }
    }

    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons
            .iter()
            .find(|l| l.lesson_number == lesson_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: u32,
    pub title: String,
    pub lesson_link: Option<String>,
}

impl Lesson {
    pub fn new(lesson_number: u32, title: impl Into<String>) -> Self {
        Self {
            lesson_number,
            title: title.into(),
            lesson_link: None,
        }
    }
}

/// A span of lesson text indexed for semantic search.
///
/// `chunk_index` runs course-wide so neighbouring chunks (N-1, N+1) can be
/// looked up from any hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: usize,
}

impl CourseChunk {
    pub fn new(
        course_title: impl Into<String>,
        lesson_number: Option<u32>,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            course_title: course_title.into(),
            lesson_number,
            chunk_index,
        }
    }

    /// Upsert key for the content collection.
    pub fn key(&self) -> String {
        format!("{}::{}", self.course_title, self.chunk_index)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: CourseChunk,
    pub score: f32,
}

/// Parameters for a content search. `course_name` may be partial; the store
/// resolves it to an exact title before filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub course_name: Option<String>,
    pub lesson_number: Option<u32>,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_course(mut self, course_name: impl Into<String>) -> Self {
        self.course_name = Some(course_name.into());
        self
    }

    pub fn with_lesson(mut self, lesson_number: u32) -> Self {
        self.lesson_number = Some(lesson_number);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Pointer to the course material behind an answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub course: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Source {
    pub fn new(course: impl Into<String>, lesson: Option<u32>) -> Self {
        Self {
            course: course.into(),
            lesson,
            link: None,
        }
    }

    pub fn with_link(mut self, link: Option<String>) -> Self {
        self.link = link;
        self
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lesson {
            Some(n) => write!(f, "{} - Lesson {}", self.course, n),
            None => f.write_str(&self.course),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}
