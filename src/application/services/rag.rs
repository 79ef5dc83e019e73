use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::services::{DocumentProcessor, SessionManager};
use crate::application::tools::ToolRegistry;
use crate::domain::{
    ports::{AnswerGenerator, GenerationRequest, VectorStore},
    Course, CourseAnalytics, CourseChunk, DomainError, Source,
};

/// Outcome of loading a single course file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Added { title: String, chunks: usize },
    Skipped { title: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub courses_added: usize,
    pub chunks_added: usize,
    pub skipped: Vec<String>,
    pub failures: Vec<IngestFailure>,
}

/// Ties ingestion, retrieval, generation and session history together.
pub struct RagSystem {
    processor: DocumentProcessor,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn AnswerGenerator>,
    sessions: SessionManager,
}

impl RagSystem {
    pub fn new(
        processor: DocumentProcessor,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn AnswerGenerator>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            processor,
            store,
            generator,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Parses and indexes one course file unless its title is already indexed.
    #[instrument(skip(self))]
    pub async fn add_course_document(&self, path: &Path) -> Result<IngestOutcome, DomainError> {
        let existing: HashSet<String> = self.store.existing_course_titles().await?.into_iter().collect();
        let (course, chunks) = self.processor.process_file(path).await?;
        self.index_course(course, chunks, &existing).await
    }

    /// Loads every `.txt` course file in `dir`.
    ///
    /// Files that fail to read or parse are reported in the returned
    /// [`IngestReport`] without stopping the batch. Vector store failures
    /// abort the load.
    #[instrument(skip(self))]
    pub async fn add_course_folder(
        &self,
        dir: &Path,
        clear_existing: bool,
    ) -> Result<IngestReport, DomainError> {
        if clear_existing {
            info!("clearing existing course data");
            self.store.clear_all().await?;
        }

        let mut report = IngestReport::default();
        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            warn!(dir = %dir.display(), "course folder does not exist");
            return Ok(report);
        }

        let mut existing: HashSet<String> =
            self.store.existing_course_titles().await?.into_iter().collect();

        for path in course_files(dir).await? {
            let (course, chunks) = match self.processor.process_file(&path).await {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping course file");
                    report.failures.push(IngestFailure {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match self.index_course(course, chunks, &existing).await? {
                IngestOutcome::Added { title, chunks } => {
                    report.courses_added += 1;
                    report.chunks_added += chunks;
                    existing.insert(title);
                }
                IngestOutcome::Skipped { title } => report.skipped.push(title),
            }
        }

        info!(
            courses = report.courses_added,
            chunks = report.chunks_added,
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "course folder loaded"
        );
        Ok(report)
    }

    async fn index_course(
        &self,
        course: Course,
        chunks: Vec<CourseChunk>,
        existing: &HashSet<String>,
    ) -> Result<IngestOutcome, DomainError> {
        if existing.contains(&course.title) {
            info!(title = %course.title, "course already indexed");
            return Ok(IngestOutcome::Skipped {
                title: course.title,
            });
        }

        // The catalog record marks a course as indexed, so it goes in last.
        self.store.add_course_chunks(&chunks).await?;
        self.store.add_course_metadata(&course).await?;
        info!(title = %course.title, chunks = chunks.len(), "course indexed");

        Ok(IngestOutcome::Added {
            title: course.title,
            chunks: chunks.len(),
        })
    }

    /// Answers a query, returning the answer and the sources the tools used.
    #[instrument(skip(self))]
    pub async fn query(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<(String, Vec<Source>), DomainError> {
        let history = session_id.and_then(|id| self.sessions.get_history(id));
        let request =
            GenerationRequest::new(format!("Answer this question about course materials: {query}"))
                .with_history(history);

        let tools = Arc::new(ToolRegistry::new(self.store.clone()));
        let answer = self.generator.generate(request, tools.clone()).await?;
        if let Some(failure) = tools.take_retrieval_failure() {
            return Err(failure);
        }
        let sources = tools.pop_last_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &answer);
        }

        Ok((answer, sources))
    }

    /// Course count and titles, read live from the store.
    pub async fn course_analytics(&self) -> Result<CourseAnalytics, DomainError> {
        let mut course_titles = self.store.existing_course_titles().await?;
        course_titles.sort();
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}

async fn course_files(dir: &Path) -> Result<Vec<PathBuf>, DomainError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_txt = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if is_txt && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SearchArgs, ToolCall};
    use crate::domain::SearchQuery;
    use crate::infrastructure::InMemoryVectorStore;
    use crate::testing::{
        empty_store, failing_store, rag_system, seeded_store, FlakyEmbedding, ScriptedGenerator,
        INTRO_TO_X,
    };

    const SECOND_COURSE: &str = "Course Title: Data Pipelines
Lesson 1: Ingest
Pipelines ingest data. They move it around.
";

    #[tokio::test]
    async fn test_query_returns_answer_and_lesson_source() {
        let generator = Arc::new(ScriptedGenerator::answering("Lesson 2 covers neural networks.").with_call(
            ToolCall::SearchCourseContent(SearchArgs {
                query: "What is covered in lesson 2?".into(),
                course_name: Some("Intro to X".into()),
                lesson_number: Some(2),
            }),
        ));
        let rag = rag_system(seeded_store().await, generator.clone());

        let (answer, sources) = rag.query("What is covered in lesson 2?", None).await.unwrap();

        assert_eq!(answer, "Lesson 2 covers neural networks.");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].course, "Intro to X");
        assert_eq!(sources[0].lesson, Some(2));
        assert!(generator.tool_outputs()[0].contains("[Intro to X - Lesson 2]"));
    }

    #[tokio::test]
    async fn test_query_without_tool_call_has_no_sources() {
        let generator = Arc::new(ScriptedGenerator::answering("4"));
        let rag = rag_system(seeded_store().await, generator);

        let (_, sources) = rag.query("What is 2+2?", None).await.unwrap();
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn test_sources_do_not_leak_between_queries() {
        let searching = Arc::new(ScriptedGenerator::answering("a").with_call(
            ToolCall::SearchCourseContent(SearchArgs {
                query: "basics".into(),
                course_name: None,
                lesson_number: None,
            }),
        ));
        let store = seeded_store().await;
        let rag = rag_system(store.clone(), searching);
        let (_, first) = rag.query("basics", None).await.unwrap();
        assert!(!first.is_empty());

        let (_, second) = rag_system(store, Arc::new(ScriptedGenerator::answering("b")))
            .query("hello", None)
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_query_wraps_prompt_and_records_history() {
        let generator = Arc::new(ScriptedGenerator::answering("AI response"));
        let rag = rag_system(empty_store(), generator.clone());

        rag.query("What is AI?", Some("session_1")).await.unwrap();
        rag.query("Tell me more", Some("session_1")).await.unwrap();

        let requests = generator.requests();
        assert_eq!(
            requests[0].query,
            "Answer this question about course materials: What is AI?"
        );
        assert!(requests[0].history.is_none());
        assert_eq!(
            requests[1].history.as_deref(),
            Some("User: What is AI?\nAssistant: AI response")
        );
    }

    #[tokio::test]
    async fn test_query_without_session_records_nothing() {
        let generator = Arc::new(ScriptedGenerator::answering("AI response"));
        let rag = rag_system(empty_store(), generator);

        let (answer, _) = rag.query("What is AI?", None).await.unwrap();
        assert_eq!(answer, "AI response");
        assert_eq!(rag.sessions().session_count(), 0);
    }

    #[tokio::test]
    async fn test_generation_error_propagates() {
        let rag = rag_system(empty_store(), Arc::new(ScriptedGenerator::failing()));
        let err = rag.query("q", Some("s")).await.unwrap_err();

        assert!(matches!(err, DomainError::ExternalService(_)));
        assert!(rag.sessions().get_history("s").is_none());
    }

    #[tokio::test]
    async fn test_retrieval_error_fails_the_query() {
        let generator = Arc::new(ScriptedGenerator::answering("made up").with_call(
            ToolCall::SearchCourseContent(SearchArgs {
                query: "basics".into(),
                course_name: None,
                lesson_number: None,
            }),
        ));
        let rag = rag_system(failing_store(), generator);

        let err = rag.query("basics", Some("s")).await.unwrap_err();
        assert!(matches!(err, DomainError::ExternalService(_)));
        assert!(rag.sessions().get_history("s").is_none());
    }

    #[tokio::test]
    async fn test_folder_load_skips_existing_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), INTRO_TO_X).unwrap();
        std::fs::write(dir.path().join("b.txt"), SECOND_COURSE).unwrap();
        std::fs::write(dir.path().join("broken.txt"), "no header here").unwrap();
        std::fs::write(dir.path().join("ignored.md"), SECOND_COURSE).unwrap();

        let rag = rag_system(empty_store(), Arc::new(ScriptedGenerator::answering("")));

        let report = rag.add_course_folder(dir.path(), false).await.unwrap();
        assert_eq!(report.courses_added, 2);
        assert!(report.chunks_added >= 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken.txt"));

        let analytics = rag.course_analytics().await.unwrap();
        assert_eq!(analytics.total_courses, 2);
        assert!(analytics.course_titles.contains(&"Intro to X".to_string()));
        assert!(analytics.course_titles.contains(&"Data Pipelines".to_string()));

        let again = rag.add_course_folder(dir.path(), false).await.unwrap();
        assert_eq!(again.courses_added, 0);
        assert_eq!(again.skipped.len(), 2);
        assert_eq!(rag.course_analytics().await.unwrap().total_courses, 2);
    }

    #[tokio::test]
    async fn test_add_course_document_twice_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("course.txt");
        std::fs::write(&path, SECOND_COURSE).unwrap();
        let rag = rag_system(empty_store(), Arc::new(ScriptedGenerator::answering("")));

        let first = rag.add_course_document(&path).await.unwrap();
        assert!(matches!(first, IngestOutcome::Added { chunks: 1, .. }));

        let second = rag.add_course_document(&path).await.unwrap();
        assert_eq!(
            second,
            IngestOutcome::Skipped {
                title: "Data Pipelines".into()
            }
        );
        assert_eq!(rag.course_analytics().await.unwrap().total_courses, 1);
    }

    #[tokio::test]
    async fn test_clear_existing_reindexes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), SECOND_COURSE).unwrap();
        let rag = rag_system(seeded_store().await, Arc::new(ScriptedGenerator::answering("")));

        let report = rag.add_course_folder(dir.path(), true).await.unwrap();
        assert_eq!(report.courses_added, 1);

        let analytics = rag.course_analytics().await.unwrap();
        assert_eq!(analytics.course_titles, vec!["Data Pipelines".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_chunk_write_is_retried_on_next_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), INTRO_TO_X).unwrap();
        let store = Arc::new(InMemoryVectorStore::new(Arc::new(
            FlakyEmbedding::failing_batches(1),
        )));
        let rag = rag_system(store.clone(), Arc::new(ScriptedGenerator::answering("")));

        let err = rag.add_course_folder(dir.path(), false).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(store.course_count().await.unwrap(), 0);

        let report = rag.add_course_folder(dir.path(), false).await.unwrap();
        assert_eq!(report.courses_added, 1);
        assert!(report.skipped.is_empty());
        let hits = store.search(&SearchQuery::new("neural networks")).await.unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_missing_folder_is_empty_report() {
        let rag = rag_system(empty_store(), Arc::new(ScriptedGenerator::answering("")));
        let report = rag
            .add_course_folder(Path::new("/definitely/not/here"), false)
            .await
            .unwrap();
        assert_eq!(report, IngestReport::default());
    }
}
