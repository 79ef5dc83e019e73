use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, Condition, CreateCollectionBuilder, Distance, Filter, PointId, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{
    ports::{EmbeddingService, VectorStore},
    Course, CourseChunk, DomainError, Lesson, SearchQuery, SearchResult,
};
use crate::infrastructure::vector_store::{
    check_embedding_count, effective_limit, DEFAULT_MATCH_THRESHOLD,
};

const CATALOG_COLLECTION: &str = "course_catalog";
const CONTENT_COLLECTION: &str = "course_content";
const SCROLL_PAGE: u32 = 256;

fn external(e: impl std::fmt::Display) -> DomainError {
    DomainError::external(e.to_string())
}

/// Qdrant-backed store with one collection for course metadata and one for
/// lesson chunks.
pub struct QdrantVectorStore {
    client: Qdrant,
    embedding: Arc<dyn EmbeddingService>,
    max_results: usize,
    match_threshold: f32,
}

impl QdrantVectorStore {
    pub async fn new(url: &str, embedding: Arc<dyn EmbeddingService>) -> Result<Self, DomainError> {
        let client = Qdrant::from_url(url).build().map_err(external)?;

        let store = Self {
            client,
            embedding,
            max_results: 5,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        };

        store.ensure_collections().await?;

        Ok(store)
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    async fn ensure_collections(&self) -> Result<(), DomainError> {
        for name in [CATALOG_COLLECTION, CONTENT_COLLECTION] {
            if self.client.collection_exists(name).await.map_err(external)? {
                continue;
            }

            self.client
                .create_collection(CreateCollectionBuilder::new(name).vectors_config(
                    VectorParamsBuilder::new(self.embedding.dimension() as u64, Distance::Cosine),
                ))
                .await
                .map_err(external)?;
            info!(collection = name, "created qdrant collection");
        }

        Ok(())
    }

    fn key_to_point_id(key: &str) -> u64 {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes());
        let bytes = id.as_bytes();
        u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])
    }

    async fn catalog(&self) -> Result<Vec<Course>, DomainError> {
        let mut courses = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut request = ScrollPointsBuilder::new(CATALOG_COLLECTION)
                .limit(SCROLL_PAGE)
                .with_payload(true);
            if let Some(offset) = offset.take() {
                request = request.offset(offset);
            }

            let page = self.client.scroll(request).await.map_err(external)?;
            courses.extend(page.result.iter().filter_map(|p| course_from_payload(&p.payload)));

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(courses)
    }

    /// Exact case-insensitive title first, then the nearest catalog entry
    /// above the match threshold.
    async fn resolve_course(&self, name: &str) -> Result<Option<Course>, DomainError> {
        if let Some(course) = self.course_by_title(name.trim()).await? {
            return Ok(Some(course));
        }

        let catalog = self.catalog().await?;
        if let Some(course) = catalog
            .iter()
            .find(|c| c.title.eq_ignore_ascii_case(name.trim()))
        {
            return Ok(Some(course.clone()));
        }
        if catalog.is_empty() {
            return Ok(None);
        }

        let query = self.embedding.embed(name).await?;
        let hits = self
            .client
            .search_points(
                SearchPointsBuilder::new(CATALOG_COLLECTION, query.as_slice().to_vec(), 1)
                    .with_payload(true)
                    .score_threshold(self.match_threshold),
            )
            .await
            .map_err(external)?;

        Ok(hits
            .result
            .first()
            .and_then(|p| course_from_payload(&p.payload)))
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_int(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(n) => Some(*n),
        _ => None,
    }
}

fn course_from_payload(payload: &HashMap<String, Value>) -> Option<Course> {
    let lessons: Vec<Lesson> = payload_str(payload, "lessons_json")
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();

    Some(Course {
        title: payload_str(payload, "title")?,
        course_link: payload_str(payload, "course_link"),
        instructor: payload_str(payload, "instructor"),
        lessons,
    })
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<CourseChunk> {
    Some(CourseChunk {
        content: payload_str(payload, "content")?,
        course_title: payload_str(payload, "course_title")?,
        lesson_number: payload_int(payload, "lesson_number").and_then(|n| u32::try_from(n).ok()),
        chunk_index: usize::try_from(payload_int(payload, "chunk_index")?).ok()?,
    })
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    #[instrument(skip(self, course), fields(title = %course.title))]
    async fn add_course_metadata(&self, course: &Course) -> Result<(), DomainError> {
        let embedding = self.embedding.embed(&course.title).await?;
        let lessons_json = serde_json::to_string(&course.lessons)
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let payload: Payload = json!({
            "title": course.title,
            "course_link": course.course_link,
            "instructor": course.instructor,
            "lessons_json": lessons_json,
        })
        .try_into()
        .map_err(|_| DomainError::internal("Failed to create payload"))?;

        let point = PointStruct::new(
            Self::key_to_point_id(&course.title),
            embedding.as_slice().to_vec(),
            payload,
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(CATALOG_COLLECTION, vec![point]).wait(true))
            .await
            .map_err(external)?;

        Ok(())
    }

    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn add_course_chunks(&self, chunks: &[CourseChunk]) -> Result<(), DomainError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedding.embed_batch(&texts).await?;
        check_embedding_count(chunks.len(), embeddings.len())?;

        let points = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let payload: Payload = json!({
                    "content": chunk.content,
                    "course_title": chunk.course_title,
                    "lesson_number": chunk.lesson_number,
                    "chunk_index": chunk.chunk_index,
                })
                .try_into()
                .map_err(|_| DomainError::internal("Failed to create payload"))?;

                Ok(PointStruct::new(
                    Self::key_to_point_id(&chunk.key()),
                    embedding.as_slice().to_vec(),
                    payload,
                ))
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(CONTENT_COLLECTION, points).wait(true))
            .await
            .map_err(external)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, DomainError> {
        let mut conditions = Vec::new();

        if let Some(name) = &query.course_name {
            match self.resolve_course(name).await? {
                Some(course) => conditions.push(Condition::matches("course_title", course.title)),
                None => {
                    debug!(course = %name, "no course matches filter");
                    return Ok(Vec::new());
                }
            }
        }
        if let Some(lesson) = query.lesson_number {
            conditions.push(Condition::matches("lesson_number", i64::from(lesson)));
        }

        let embedding = self.embedding.embed(&query.query).await?;
        let limit = effective_limit(query.limit, self.max_results) as u64;

        let mut request =
            SearchPointsBuilder::new(CONTENT_COLLECTION, embedding.as_slice().to_vec(), limit)
                .with_payload(true);
        if !conditions.is_empty() {
            request = request.filter(Filter::must(conditions));
        }

        let results = self.client.search_points(request).await.map_err(external)?;

        Ok(results
            .result
            .into_iter()
            .filter_map(|point| {
                Some(SearchResult {
                    chunk: chunk_from_payload(&point.payload)?,
                    score: point.score,
                })
            })
            .collect())
    }

    async fn existing_course_titles(&self) -> Result<Vec<String>, DomainError> {
        Ok(self.catalog().await?.into_iter().map(|c| c.title).collect())
    }

    async fn course_outline(&self, course_name: &str) -> Result<Option<Course>, DomainError> {
        self.resolve_course(course_name).await
    }

    async fn course_by_title(&self, title: &str) -> Result<Option<Course>, DomainError> {
        let page = self
            .client
            .scroll(
                ScrollPointsBuilder::new(CATALOG_COLLECTION)
                    .filter(Filter::must([Condition::matches("title", title.to_string())]))
                    .limit(1)
                    .with_payload(true),
            )
            .await
            .map_err(external)?;

        Ok(page
            .result
            .first()
            .and_then(|p| course_from_payload(&p.payload)))
    }

    async fn clear_all(&self) -> Result<(), DomainError> {
        for name in [CATALOG_COLLECTION, CONTENT_COLLECTION] {
            self.client.delete_collection(name).await.map_err(external)?;
        }
        self.ensure_collections().await
    }
}
