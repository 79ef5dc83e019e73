//! Deterministic fakes shared by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::application::services::{DocumentProcessor, RagSystem, SessionManager};
use crate::domain::{
    ports::{AnswerGenerator, EmbeddingService, GenerationRequest, ToolExecutor, VectorStore},
    Course, CourseChunk, DomainError, Embedding, SearchQuery, SearchResult, ToolCall,
};
use crate::infrastructure::vector_store::InMemoryVectorStore;

pub const INTRO_TO_X: &str = "Course Title: Intro to X
Course Link: https://example.com/x
Course Instructor: Ada Lovelace

Lesson 1: Basics
Lesson Link: https://example.com/x/1
The basics of X start with simple building blocks. Every learner begins with the basics.

Lesson 2: Neural Networks
Lesson Link: https://example.com/x/2
This lesson covers neural networks. Neural networks learn weights from data.

Lesson 3: Applications
Lesson Link: https://example.com/x/3
Applications of X include search and recommendation systems.
";

const VOCAB_DIMENSION: usize = 512;

/// Bag-of-words embedder: every distinct lowercase word gets its own axis.
#[derive(Default)]
pub struct VocabEmbedding {
    vocab: Mutex<HashMap<String, usize>>,
}

impl VocabEmbedding {
    fn vectorize(&self, text: &str) -> Embedding {
        let mut vocab = self.vocab.lock().unwrap();
        let mut vector = vec![0.0f32; VOCAB_DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let next = vocab.len();
            let index = *vocab.entry(word.to_lowercase()).or_insert(next);
            vector[index % VOCAB_DIMENSION] += 1.0;
        }
        Embedding::new(vector)
    }
}

#[async_trait]
impl EmbeddingService for VocabEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimension(&self) -> usize {
        VOCAB_DIMENSION
    }
}

/// Returns one vector fewer than requested for every batch.
pub struct ShortBatchEmbedding;

#[async_trait]
impl EmbeddingService for ShortBatchEmbedding {
    async fn embed(&self, _text: &str) -> Result<Embedding, DomainError> {
        Ok(Embedding::new(vec![1.0; 4]))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        Ok(vec![Embedding::new(vec![1.0; 4]); texts.len().saturating_sub(1)])
    }

    fn dimension(&self) -> usize {
        4
    }
}

/// Vocabulary embedder whose first `failures` batch calls are rate limited.
#[derive(Default)]
pub struct FlakyEmbedding {
    inner: VocabEmbedding,
    failures: AtomicUsize,
}

impl FlakyEmbedding {
    pub fn failing_batches(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Self::default()
        }
    }
}

#[async_trait]
impl EmbeddingService for FlakyEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DomainError::external("rate limited"));
        }
        self.inner.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        VOCAB_DIMENSION
    }
}

pub fn intro_to_x() -> (Course, Vec<CourseChunk>) {
    DocumentProcessor::default().process_text(INTRO_TO_X).unwrap()
}

pub fn empty_store() -> Arc<dyn VectorStore> {
    Arc::new(InMemoryVectorStore::new(Arc::new(VocabEmbedding::default())))
}

/// Store holding the "Intro to X" course.
pub async fn seeded_store() -> Arc<dyn VectorStore> {
    let store = empty_store();
    let (course, chunks) = intro_to_x();
    store.add_course_metadata(&course).await.unwrap();
    store.add_course_chunks(&chunks).await.unwrap();
    store
}

struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn add_course_metadata(&self, _course: &Course) -> Result<(), DomainError> {
        Err(DomainError::external("vector store offline"))
    }

    async fn add_course_chunks(&self, _chunks: &[CourseChunk]) -> Result<(), DomainError> {
        Err(DomainError::external("vector store offline"))
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<SearchResult>, DomainError> {
        Err(DomainError::external("vector store offline"))
    }

    async fn existing_course_titles(&self) -> Result<Vec<String>, DomainError> {
        Err(DomainError::external("vector store offline"))
    }

    async fn course_outline(&self, _course_name: &str) -> Result<Option<Course>, DomainError> {
        Err(DomainError::external("vector store offline"))
    }

    async fn course_by_title(&self, _title: &str) -> Result<Option<Course>, DomainError> {
        Err(DomainError::external("vector store offline"))
    }

    async fn clear_all(&self) -> Result<(), DomainError> {
        Err(DomainError::external("vector store offline"))
    }
}

pub fn failing_store() -> Arc<dyn VectorStore> {
    Arc::new(FailingStore)
}

/// Delegating store that counts catalog lookups.
pub struct CountingStore {
    inner: Arc<dyn VectorStore>,
    pub outline_lookups: AtomicUsize,
    pub title_lookups: AtomicUsize,
}

impl CountingStore {
    pub fn wrapping(inner: Arc<dyn VectorStore>) -> Self {
        Self {
            inner,
            outline_lookups: AtomicUsize::new(0),
            title_lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    async fn add_course_metadata(&self, course: &Course) -> Result<(), DomainError> {
        self.inner.add_course_metadata(course).await
    }

    async fn add_course_chunks(&self, chunks: &[CourseChunk]) -> Result<(), DomainError> {
        self.inner.add_course_chunks(chunks).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, DomainError> {
        self.inner.search(query).await
    }

    async fn existing_course_titles(&self) -> Result<Vec<String>, DomainError> {
        self.inner.existing_course_titles().await
    }

    async fn course_outline(&self, course_name: &str) -> Result<Option<Course>, DomainError> {
        self.outline_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.course_outline(course_name).await
    }

    async fn course_by_title(&self, title: &str) -> Result<Option<Course>, DomainError> {
        self.title_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.course_by_title(title).await
    }

    async fn clear_all(&self) -> Result<(), DomainError> {
        self.inner.clear_all().await
    }
}

/// Generator that replays a fixed script: optionally issues tool calls, then
/// answers with canned text. Every request and tool output is recorded.
#[derive(Default)]
pub struct ScriptedGenerator {
    answer: String,
    calls: Vec<ToolCall>,
    fail: bool,
    requests: Mutex<Vec<GenerationRequest>>,
    tool_outputs: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_call(mut self, call: ToolCall) -> Self {
        self.calls.push(call);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn tool_outputs(&self) -> Vec<String> {
        self.tool_outputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        tools: Arc<dyn ToolExecutor>,
    ) -> Result<String, DomainError> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(DomainError::external("Model API unavailable"));
        }

        for call in &self.calls {
            let output = tools.execute(call.clone()).await;
            self.tool_outputs.lock().unwrap().push(output);
        }
        Ok(self.answer.clone())
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
}

pub fn rag_system(store: Arc<dyn VectorStore>, generator: Arc<dyn AnswerGenerator>) -> RagSystem {
    RagSystem::new(
        DocumentProcessor::default(),
        store,
        generator,
        SessionManager::default(),
    )
}
