// ./infrastructure/src/persistence/in_memory_repository.rs
use crate::clock::SystemClock;
use crate::id_generator::UuidIdGenerator;
use application::{
    ApplicationError, Clock, DocumentRepository, IdGenerator, MAX_ID_GENERATION_ATTEMPTS,
};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use domain::{Document, DocumentDraft, DocumentId, SearchRequest};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, instrument, trace, warn};

// --- Document Repository Implementation ---

/// Keeps documents in a concurrent map and applies the upsert policy.
///
/// Each save runs inside a single map entry, so the "is this id taken" check
/// and the write happen under the same shard lock. Stored documents are
/// replaced wholesale, never mutated, which keeps concurrent readers from
/// seeing a half-written document.
#[derive(Clone)]
pub struct InMemoryDocumentRepository {
    // Document ID -> Document
    documents: Arc<DashMap<DocumentId, Arc<Document>>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryDocumentRepository {
    /// Repository backed by the system clock and random UUIDs.
    pub fn new() -> Self {
        Self::with_collaborators(Arc::new(SystemClock), Arc::new(UuidIdGenerator))
    }

    pub fn with_collaborators(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            clock,
            ids,
        }
    }

    /// Stores `draft` under a caller-chosen id, keeping the creation time of
    /// any document already stored there.
    fn upsert(&self, id: DocumentId, draft: DocumentDraft) -> Document {
        match self.documents.entry(id.clone()) {
            Entry::Occupied(mut slot) => {
                let created = slot.get().created();
                debug!(doc_id = %id, %created, "Replacing stored document, keeping original creation time");
                let document = draft.into_document(id, created);
                slot.insert(Arc::new(document.clone()));
                document
            }
            Entry::Vacant(slot) => {
                let document = draft.into_document(id, self.clock.now());
                debug!(doc_id = %document.id(), "Inserting new document");
                slot.insert(Arc::new(document.clone()));
                document
            }
        }
    }

    /// Draws ids until one is free, then inserts `draft` under it.
    fn insert_with_generated_id(&self, draft: DocumentDraft) -> Result<Document, ApplicationError> {
        for attempt in 1..=MAX_ID_GENERATION_ATTEMPTS {
            let candidate = self.ids.generate();
            if candidate.is_empty() {
                warn!(attempt, "Id generator produced an empty id, retrying");
                continue;
            }
            match self.documents.entry(candidate) {
                Entry::Occupied(slot) => {
                    warn!(doc_id = %slot.key(), attempt, "Generated id already in use, retrying");
                }
                Entry::Vacant(slot) => {
                    let document = draft.into_document(slot.key().clone(), self.clock.now());
                    debug!(doc_id = %document.id(), attempt, "Inserting new document under generated id");
                    slot.insert(Arc::new(document.clone()));
                    return Ok(document);
                }
            }
        }
        error!(
            attempts = MAX_ID_GENERATION_ATTEMPTS,
            "Could not generate a unique document id"
        );
        Err(ApplicationError::IdGenerationExhausted {
            attempts: MAX_ID_GENERATION_ATTEMPTS,
        })
    }
}

impl Default for InMemoryDocumentRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryDocumentRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDocumentRepository")
            .field("documents", &self.documents.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    #[instrument(skip(self, draft))]
    async fn save(&self, draft: DocumentDraft) -> Result<Document, ApplicationError> {
        match draft.requested_id().cloned() {
            Some(id) => {
                debug!(doc_id = %id, "Saving document to in-memory store");
                Ok(self.upsert(id, draft))
            }
            None => {
                debug!("Saving document without id to in-memory store");
                self.insert_with_generated_id(draft)
            }
        }
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, ApplicationError> {
        debug!(doc_id = %id, "Getting document from in-memory store");
        // Get returns a Ref, so we clone the document out of the Arc
        Ok(self.documents.get(id).map(|doc_ref| (**doc_ref).clone()))
    }

    #[instrument(skip(self, request), fields(has_request = request.is_some()))]
    async fn search(
        &self,
        request: Option<&SearchRequest>,
    ) -> Result<Vec<Document>, ApplicationError> {
        let hits: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| {
                let matched = domain::matches(entry.value(), request);
                trace!(doc_id = %entry.key(), matched, "Evaluated document");
                matched
            })
            .map(|entry| (**entry.value()).clone())
            .collect();
        debug!(
            total = self.documents.len(),
            nb_hits = hits.len(),
            "In-memory search finished."
        );
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, ApplicationError> {
        Ok(self.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::id_generator::SequentialIdGenerator;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use domain::Author;
    use std::collections::HashSet;

    /// Always hands out the same id, to force collisions.
    struct ConstantIdGenerator(&'static str);

    impl IdGenerator for ConstantIdGenerator {
        fn generate(&self) -> DocumentId {
            DocumentId::new(self.0)
        }
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn author(id: &str, name: &str) -> Author {
        Author {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn deterministic() -> (InMemoryDocumentRepository, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(start_time()));
        let repo = InMemoryDocumentRepository::with_collaborators(
            clock.clone(),
            Arc::new(SequentialIdGenerator::new("doc")),
        );
        (repo, clock)
    }

    fn titles(documents: &[Document]) -> HashSet<String> {
        documents.iter().map(|d| d.title.clone()).collect()
    }

    async fn seed_java_and_spring(repo: &InMemoryDocumentRepository) -> (Document, Document) {
        let java = repo
            .save(DocumentDraft::new(
                "Java Basics",
                "Learn Java programming",
                author("author1", "John Doe"),
            ))
            .await
            .unwrap();
        let spring = repo
            .save(DocumentDraft::new(
                "Spring Framework",
                "Build applications with Spring",
                author("author2", "Jane Doe"),
            ))
            .await
            .unwrap();
        (java, spring)
    }

    #[tokio::test]
    async fn save_without_id_generates_one() {
        let repo = InMemoryDocumentRepository::new();
        let saved = repo
            .save(DocumentDraft::new(
                "Test Title",
                "Test Content",
                author("author1", "John Doe"),
            ))
            .await
            .unwrap();

        assert!(!saved.id().is_empty());
        assert_eq!(saved.title, "Test Title");
        assert_eq!(saved.content, "Test Content");

        let found = repo.find_by_id(saved.id()).await.unwrap();
        assert_eq!(found, Some(saved));
    }

    #[tokio::test]
    async fn empty_id_is_treated_as_absent() {
        let (repo, _) = deterministic();
        let saved = repo
            .save(DocumentDraft::new("Title", "Content", author("a", "A")).with_id(""))
            .await
            .unwrap();
        assert_eq!(saved.id().as_str(), "doc-1");
        assert!(repo.find_by_id(&DocumentId::new("")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_insert_ignores_caller_created() {
        let repo = InMemoryDocumentRepository::new();
        let mut draft = DocumentDraft::new("Title", "Content", author("a", "A")).with_id("doc1");
        draft.created = Some(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap());

        let before = Utc::now();
        let saved = repo.save(draft).await.unwrap();
        let after = Utc::now();

        assert!(saved.created() >= before && saved.created() <= after);
    }

    #[tokio::test]
    async fn update_keeps_original_created() {
        let (repo, clock) = deterministic();
        let first = repo
            .save(
                DocumentDraft::new("Test Title", "Test Content", author("author1", "John Doe"))
                    .with_id("doc1"),
            )
            .await
            .unwrap();
        assert_eq!(first.created(), start_time());

        clock.advance(Duration::hours(3));
        let mut update = DocumentDraft::new(
            "Updated Title",
            "Updated Content",
            author("author1", "John Doe"),
        )
        .with_id("doc1");
        update.created = Some(start_time() + Duration::days(10));
        let second = repo.save(update).await.unwrap();

        assert_eq!(second.id().as_str(), "doc1");
        assert_eq!(second.created(), first.created());
        assert_eq!(second.title, "Updated Title");
        assert_eq!(second.content, "Updated Content");

        let stored = repo.find_by_id(&DocumentId::new("doc1")).await.unwrap().unwrap();
        assert_eq!(stored, second);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_by_id_misses_unknown_id() {
        let repo = InMemoryDocumentRepository::new();
        let found = repo.find_by_id(&DocumentId::new("nonexistent")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn search_combines_criteria_with_and() {
        let (repo, _) = deterministic();
        seed_java_and_spring(&repo).await;

        let matching = repo
            .search(Some(&SearchRequest {
                title_prefixes: Some(vec!["Java".to_string()]),
                author_ids: Some(vec!["author1".to_string()]),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(titles(&matching), HashSet::from(["Java Basics".to_string()]));

        let conflicting = repo
            .search(Some(&SearchRequest {
                title_prefixes: Some(vec!["Java".to_string()]),
                author_ids: Some(vec!["author2".to_string()]),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert!(conflicting.is_empty());
    }

    #[tokio::test]
    async fn search_without_request_returns_everything() {
        let (repo, _) = deterministic();
        let (java, spring) = seed_java_and_spring(&repo).await;

        let all = repo.search(None).await.unwrap();
        let ids: HashSet<DocumentId> = all.iter().map(|d| d.id().clone()).collect();
        assert_eq!(ids, HashSet::from([java.id().clone(), spring.id().clone()]));
    }

    #[tokio::test]
    async fn empty_author_list_differs_from_absent() {
        let (repo, _) = deterministic();
        seed_java_and_spring(&repo).await;

        let empty = repo
            .search(Some(&SearchRequest {
                author_ids: Some(Vec::new()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert!(empty.is_empty());

        let absent = repo.search(Some(&SearchRequest::default())).await.unwrap();
        assert_eq!(absent.len(), 2);
    }

    #[tokio::test]
    async fn search_filters_on_created_range() {
        let (repo, clock) = deterministic();
        let early = repo
            .save(DocumentDraft::new("Early", "first", author("a", "A")))
            .await
            .unwrap();
        clock.advance(Duration::days(1));
        let late = repo
            .save(DocumentDraft::new("Late", "second", author("a", "A")))
            .await
            .unwrap();

        let from_late = repo
            .search(Some(&SearchRequest {
                created_from: Some(late.created()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(titles(&from_late), HashSet::from(["Late".to_string()]));

        let up_to_early = repo
            .search(Some(&SearchRequest {
                created_to: Some(early.created()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(titles(&up_to_early), HashSet::from(["Early".to_string()]));
    }

    #[tokio::test]
    async fn generated_ids_are_distinct() {
        let repo = InMemoryDocumentRepository::new();
        let mut ids = HashSet::new();
        for i in 0..200 {
            let saved = repo
                .save(DocumentDraft::new(format!("Doc {i}"), "body", author("a", "A")))
                .await
                .unwrap();
            ids.insert(saved.id().clone());
        }
        assert_eq!(ids.len(), 200);
        assert_eq!(repo.count().await.unwrap(), 200);
    }

    #[tokio::test]
    async fn generation_skips_ids_already_taken() {
        let (repo, _) = deterministic();
        // Occupy the first ids the sequence will offer.
        for id in ["doc-1", "doc-2"] {
            repo.save(DocumentDraft::new("Manual", "body", author("a", "A")).with_id(id))
                .await
                .unwrap();
        }
        let saved = repo
            .save(DocumentDraft::new("Generated", "body", author("a", "A")))
            .await
            .unwrap();
        assert_eq!(saved.id().as_str(), "doc-3");
    }

    #[tokio::test]
    async fn exhausted_id_generation_is_an_error() {
        let repo = InMemoryDocumentRepository::with_collaborators(
            Arc::new(FixedClock::new(start_time())),
            Arc::new(ConstantIdGenerator("same")),
        );
        repo.save(DocumentDraft::new("First", "body", author("a", "A")))
            .await
            .unwrap();

        let result = repo
            .save(DocumentDraft::new("Second", "body", author("a", "A")))
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::IdGenerationExhausted { attempts }) if attempts == MAX_ID_GENERATION_ATTEMPTS
        ));
        assert_eq!(repo.count().await.unwrap(), 1);
        let kept = repo.find_by_id(&DocumentId::new("same")).await.unwrap().unwrap();
        assert_eq!(kept.title, "First");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_keep_ids_unique() {
        let repo = InMemoryDocumentRepository::new();
        let mut handles = Vec::new();
        for task in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for i in 0..50 {
                    let saved = repo
                        .save(DocumentDraft::new(
                            format!("Task {task} doc {i}"),
                            "body",
                            author("a", "A"),
                        ))
                        .await
                        .unwrap();
                    ids.push(saved.id().clone());
                }
                ids
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        assert_eq!(all.len(), 400);
        assert_eq!(repo.count().await.unwrap(), 400);
    }
}
