use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument};

use crate::domain::{
    ports::{EmbeddingService, VectorStore},
    Course, CourseChunk, DomainError, Embedding, SearchQuery, SearchResult,
};
use crate::infrastructure::vector_store::{
    check_embedding_count, effective_limit, DEFAULT_MATCH_THRESHOLD,
};

const SNAPSHOT_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogEntry {
    course: Course,
    embedding: Embedding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContentEntry {
    chunk: CourseChunk,
    embedding: Embedding,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collections {
    catalog: BTreeMap<String, CatalogEntry>,
    content: BTreeMap<String, ContentEntry>,
}

/// Brute-force cosine search over both collections, optionally persisted as
/// a JSON snapshot so the index survives restarts.
pub struct InMemoryVectorStore {
    embedding: Arc<dyn EmbeddingService>,
    collections: RwLock<Collections>,
    snapshot: Option<PathBuf>,
    max_results: usize,
    match_threshold: f32,
}

impl InMemoryVectorStore {
    pub fn new(embedding: Arc<dyn EmbeddingService>) -> Self {
        Self {
            embedding,
            collections: RwLock::new(Collections::default()),
            snapshot: None,
            max_results: 5,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    /// Opens (or creates) a store persisted under `dir`.
    pub async fn open(
        embedding: Arc<dyn EmbeddingService>,
        dir: impl AsRef<Path>,
    ) -> Result<Self, DomainError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let snapshot = dir.join(SNAPSHOT_FILE);

        let collections = if tokio::fs::try_exists(&snapshot).await? {
            let bytes = tokio::fs::read(&snapshot).await?;
            serde_json::from_slice(&bytes)
                .map_err(|e| DomainError::internal(format!("corrupt index snapshot: {e}")))?
        } else {
            Collections::default()
        };

        info!(
            path = %snapshot.display(),
            courses = collections.catalog.len(),
            chunks = collections.content.len(),
            "local vector store opened"
        );

        Ok(Self {
            collections: RwLock::new(collections),
            snapshot: Some(snapshot),
            ..Self::new(embedding)
        })
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, DomainError> {
        self.collections
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, DomainError> {
        self.collections
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))
    }

    async fn persist(&self) -> Result<(), DomainError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let bytes = {
            let collections = self.read()?;
            serde_json::to_vec(&*collections).map_err(|e| DomainError::internal(e.to_string()))?
        };

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "index snapshot written");
        Ok(())
    }

    /// Maps a possibly partial course name to an indexed title: exact
    /// case-insensitive match first, then the nearest catalog entry if it is
    /// similar enough.
    async fn resolve_course_name(&self, name: &str) -> Result<Option<String>, DomainError> {
        {
            let collections = self.read()?;
            if collections.catalog.is_empty() {
                return Ok(None);
            }
            if let Some(title) = collections
                .catalog
                .keys()
                .find(|t| t.eq_ignore_ascii_case(name.trim()))
            {
                return Ok(Some(title.clone()));
            }
        }

        let query = self.embedding.embed(name).await?;
        let collections = self.read()?;

        let best = collections
            .catalog
            .values()
            .map(|entry| (entry, query.cosine_similarity(&entry.embedding)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        Ok(best
            .filter(|(_, score)| *score >= self.match_threshold)
            .map(|(entry, _)| entry.course.title.clone()))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    #[instrument(skip(self, course), fields(title = %course.title))]
    async fn add_course_metadata(&self, course: &Course) -> Result<(), DomainError> {
        let embedding = self.embedding.embed(&course.title).await?;
        self.write()?.catalog.insert(
            course.title.clone(),
            CatalogEntry {
                course: course.clone(),
                embedding,
            },
        );
        self.persist().await
    }

    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn add_course_chunks(&self, chunks: &[CourseChunk]) -> Result<(), DomainError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedding.embed_batch(&texts).await?;
        check_embedding_count(chunks.len(), embeddings.len())?;

        {
            let mut collections = self.write()?;
            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                collections.content.insert(
                    chunk.key(),
                    ContentEntry {
                        chunk: chunk.clone(),
                        embedding,
                    },
                );
            }
        }
        self.persist().await
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, DomainError> {
        let course_title = match &query.course_name {
            Some(name) => match self.resolve_course_name(name).await? {
                Some(title) => Some(title),
                None => {
                    debug!(course = %name, "no course matches filter");
                    return Ok(Vec::new());
                }
            },
            None => None,
        };

        let query_embedding = self.embedding.embed(&query.query).await?;
        let collections = self.read()?;

        let mut results: Vec<SearchResult> = collections
            .content
            .values()
            .filter(|e| {
                course_title
                    .as_ref()
                    .is_none_or(|t| &e.chunk.course_title == t)
            })
            .filter(|e| {
                query
                    .lesson_number
                    .is_none_or(|n| e.chunk.lesson_number == Some(n))
            })
            .map(|e| SearchResult {
                chunk: e.chunk.clone(),
                score: query_embedding.cosine_similarity(&e.embedding),
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(effective_limit(query.limit, self.max_results));
        Ok(results)
    }

    async fn existing_course_titles(&self) -> Result<Vec<String>, DomainError> {
        Ok(self.read()?.catalog.keys().cloned().collect())
    }

    async fn course_count(&self) -> Result<usize, DomainError> {
        Ok(self.read()?.catalog.len())
    }

    async fn course_outline(&self, course_name: &str) -> Result<Option<Course>, DomainError> {
        let Some(title) = self.resolve_course_name(course_name).await? else {
            return Ok(None);
        };
        self.course_by_title(&title).await
    }

    async fn course_by_title(&self, title: &str) -> Result<Option<Course>, DomainError> {
        Ok(self.read()?.catalog.get(title).map(|e| e.course.clone()))
    }

    async fn clear_all(&self) -> Result<(), DomainError> {
        {
            let mut collections = self.write()?;
            collections.catalog.clear();
            collections.content.clear();
        }
        self.persist().await
    }
}
