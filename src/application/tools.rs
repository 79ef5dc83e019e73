//! Per-query tool execution context.
//!
//! A fresh [`ToolRegistry`] is created for every query, so the sources it
//! records can only ever describe that query's tool calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, instrument, warn};

use crate::domain::{
    ports::{ToolExecutor, VectorStore},
    Course, DomainError, OutlineArgs, SearchArgs, SearchQuery, SearchResult, Source, ToolCall, ToolSpec,
};

pub struct ToolRegistry {
    store: Arc<dyn VectorStore>,
    last_sources: Mutex<Vec<Source>>,
    retrieval_failure: Mutex<Option<DomainError>>,
}

impl ToolRegistry {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            last_sources: Mutex::new(Vec::new()),
            retrieval_failure: Mutex::new(None),
        }
    }

    /// The first vector store error hit by a tool call, if any. The model
    /// still sees the error text, but the caller must not trust its answer.
    pub fn take_retrieval_failure(&self) -> Option<DomainError> {
        self.retrieval_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn record_failure(&self, error: DomainError) -> String {
        let message = format!("Search error: {error}");
        self.retrieval_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(error);
        message
    }

    /// Returns the sources recorded since the last pop and clears them.
    pub fn pop_last_sources(&self) -> Vec<Source> {
        std::mem::take(&mut *self.lock_sources())
    }

    #[instrument(skip(self))]
    async fn search_course_content(&self, args: SearchArgs) -> String {
        let mut query = SearchQuery::new(&args.query);
        query.course_name = args.course_name.clone();
        query.lesson_number = args.lesson_number;

        let results = match self.store.search(&query).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "course search failed");
                return self.record_failure(e);
            }
        };

        if results.is_empty() {
            return no_results_message(&args);
        }

        let sources = self.sources_for(&results).await;
        self.record_sources(sources);

        results
            .iter()
            .map(|r| format!("[{}]\n{}", header(r), r.chunk.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[instrument(skip(self))]
    async fn get_course_outline(&self, args: OutlineArgs) -> String {
        let course = match self.store.course_outline(&args.course_name).await {
            Ok(Some(course)) => course,
            Ok(None) => return format!("No course found matching '{}'.", args.course_name),
            Err(e) => {
                warn!(error = %e, "course outline lookup failed");
                return self.record_failure(e);
            }
        };

        let mut lines = vec![format!("Course: {}", course.title)];
        if let Some(link) = &course.course_link {
            lines.push(format!("Course Link: {link}"));
        }
        if let Some(instructor) = &course.instructor {
            lines.push(format!("Instructor: {instructor}"));
        }
        lines.push(format!("Lessons ({}):", course.lessons.len()));
        for lesson in &course.lessons {
            lines.push(format!("  Lesson {}: {}", lesson.lesson_number, lesson.title));
        }

        self.record_sources(vec![
            Source::new(&course.title, None).with_link(course.course_link.clone())
        ]);

        lines.join("\n")
    }

    /// One source per `(course, lesson)`, with the lesson link when the
    /// course record has one. Each course record is fetched once.
    async fn sources_for(&self, results: &[SearchResult]) -> Vec<Source> {
        let mut courses: HashMap<&str, Option<Course>> = HashMap::new();
        let mut sources: Vec<Source> = Vec::new();

        for result in results {
            let chunk = &result.chunk;
            if sources
                .iter()
                .any(|s| s.course == chunk.course_title && s.lesson == chunk.lesson_number)
            {
                continue;
            }

            let link = match chunk.lesson_number {
                Some(n) => {
                    if !courses.contains_key(chunk.course_title.as_str()) {
                        let course = self
                            .store
                            .course_by_title(&chunk.course_title)
                            .await
                            .unwrap_or_else(|e| {
                                debug!(error = %e, "course lookup for sources failed");
                                None
                            });
                        courses.insert(&chunk.course_title, course);
                    }
                    courses
                        .get(chunk.course_title.as_str())
                        .and_then(Option::as_ref)
                        .and_then(|c| c.lesson(n))
                        .and_then(|l| l.lesson_link.clone())
                }
                None => None,
            };
            sources.push(Source::new(&chunk.course_title, chunk.lesson_number).with_link(link));
        }
        sources
    }

    fn record_sources(&self, sources: Vec<Source>) {
        let mut recorded = self.lock_sources();
        for source in sources {
            if !recorded.contains(&source) {
                recorded.push(source);
            }
        }
    }

    fn lock_sources(&self) -> std::sync::MutexGuard<'_, Vec<Source>> {
        self.last_sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<ToolSpec> {
        ToolCall::specs()
    }

    async fn execute(&self, call: ToolCall) -> String {
        debug!(tool = call.name(), "executing tool");
        match call {
            ToolCall::SearchCourseContent(args) => self.search_course_content(args).await,
            ToolCall::GetCourseOutline(args) => self.get_course_outline(args).await,
        }
    }
}

fn header(result: &SearchResult) -> String {
    match result.chunk.lesson_number {
        Some(n) => format!("{} - Lesson {}", result.chunk.course_title, n),
        None => result.chunk.course_title.clone(),
    }
}

fn no_results_message(args: &SearchArgs) -> String {
    let mut message = String::from("No relevant content found");
    if let Some(course) = &args.course_name {
        message.push_str(&format!(" in course '{course}'"));
    }
    if let Some(lesson) = args.lesson_number {
        message.push_str(&format!(" in lesson {lesson}"));
    }
    message.push('.');
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CourseChunk;
    use crate::testing::{failing_store, seeded_store, CountingStore};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    async fn registry() -> ToolRegistry {
        ToolRegistry::new(seeded_store().await)
    }

    #[tokio::test]
    async fn test_search_formats_results_and_records_sources() {
        let registry = registry().await;

        let output = registry
            .execute(ToolCall::SearchCourseContent(SearchArgs {
                query: "neural networks".into(),
                course_name: None,
                lesson_number: None,
            }))
            .await;

        assert!(output.contains("[Intro to X - Lesson 2]"));
        assert!(output.contains("neural networks"));
        let sources = registry.pop_last_sources();
        assert!(!sources.is_empty());
        assert!(sources.iter().all(|s| s.course == "Intro to X"));
    }

    #[tokio::test]
    async fn test_search_sources_carry_lesson_links() {
        let registry = registry().await;

        registry
            .execute_named(
                "search_course_content",
                json!({"query": "neural networks", "lesson_number": 2}),
            )
            .await;

        let sources = registry.pop_last_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].lesson, Some(2));
        assert_eq!(sources[0].link.as_deref(), Some("https://example.com/x/2"));
    }

    #[tokio::test]
    async fn test_sources_fetch_each_course_once() {
        let store = Arc::new(CountingStore::wrapping(seeded_store().await));
        let registry = ToolRegistry::new(store.clone());

        registry
            .execute_named("search_course_content", json!({"query": "lesson"}))
            .await;

        let sources = registry.pop_last_sources();
        assert_eq!(sources.len(), 3);
        assert!(sources.iter().all(|s| s.link.is_some()));
        assert_eq!(store.title_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(store.outline_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_empty_results_message() {
        let registry = registry().await;

        let output = registry
            .execute_named(
                "search_course_content",
                json!({"query": "anything", "course_name": "Nonexistent Course"}),
            )
            .await;

        assert_eq!(
            output,
            "No relevant content found in course 'Nonexistent Course'."
        );
        assert!(registry.pop_last_sources().is_empty());
    }

    #[tokio::test]
    async fn test_search_store_error_is_reported_as_text() {
        let registry = ToolRegistry::new(failing_store());

        let output = registry
            .execute_named("search_course_content", json!({"query": "x"}))
            .await;

        assert!(output.starts_with("Search error:"));
        assert!(registry.take_retrieval_failure().is_some());
        assert!(registry.take_retrieval_failure().is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = registry().await;
        let output = registry
            .execute_named("nonexistent_tool", json!({"query": "test"}))
            .await;
        assert!(output.contains("not found"));
    }

    #[tokio::test]
    async fn test_pop_last_sources_is_read_once() {
        let registry = registry().await;
        registry
            .execute_named("search_course_content", json!({"query": "basics"}))
            .await;

        assert!(!registry.pop_last_sources().is_empty());
        assert!(registry.pop_last_sources().is_empty());
    }

    #[tokio::test]
    async fn test_no_tool_call_no_sources() {
        let registry = registry().await;
        assert!(registry.pop_last_sources().is_empty());
    }

    #[tokio::test]
    async fn test_course_outline() {
        let registry = registry().await;

        let output = registry
            .execute_named("get_course_outline", json!({"course_name": "Intro to X"}))
            .await;

        assert!(output.contains("Course: Intro to X"));
        assert!(output.contains("Course Link: https://example.com/x"));
        assert!(output.contains("Lesson 3: Applications"));
        assert_eq!(
            registry.pop_last_sources(),
            vec![Source::new("Intro to X", None).with_link(Some("https://example.com/x".into()))]
        );
    }

    #[tokio::test]
    async fn test_course_outline_unknown_course() {
        let registry = registry().await;
        let output = registry
            .execute_named("get_course_outline", json!({"course_name": "Zzz"}))
            .await;
        assert_eq!(output, "No course found matching 'Zzz'.");
    }

    #[tokio::test]
    async fn test_definitions() {
        let registry = registry().await;
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert!(names.contains(&"search_course_content".to_string()));
    }

    #[test]
    fn test_header_without_lesson() {
        let result = SearchResult {
            chunk: CourseChunk::new("Notes", None, 0, "text"),
            score: 1.0,
        };
        assert_eq!(header(&result), "Notes");
    }
}
