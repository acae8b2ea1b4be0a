use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Document, DocumentDraft, DocumentId, SearchRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

// --- Application Errors ---
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Document not found: {0}")]
    NotFound(String),
    /// The id generator kept producing ids that are already stored.
    /// Unreachable with a random generator; treat it as a broken invariant.
    #[error("Unable to generate a unique document id after {attempts} attempts")]
    IdGenerationExhausted { attempts: usize },
    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
}

/// Upper bound on id candidates tried by a repository before giving up.
pub const MAX_ID_GENERATION_ATTEMPTS: usize = 32;

// --- Infrastructure Interfaces (Traits) ---

/// Source of the current time. Injected so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Produces candidate document ids. Candidates need not be unique on their
/// own; the repository rejects the ones already in use.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> DocumentId;
}

/// Interface for storing, retrieving and filtering documents.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Upserts a document.
    ///
    /// Assigns a fresh id when the draft has none. A document already stored
    /// under the id keeps its original creation time; a new one is stamped
    /// with the current time. Any `created` on the draft is ignored.
    async fn save(&self, draft: DocumentDraft) -> Result<Document, ApplicationError>;
    /// Retrieves a document by its ID.
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, ApplicationError>;
    /// Returns every stored document matching the request, in no particular order.
    /// `None` matches all documents.
    async fn search(
        &self,
        request: Option<&SearchRequest>,
    ) -> Result<Vec<Document>, ApplicationError>;
    /// Returns the number of stored documents.
    async fn count(&self) -> Result<usize, ApplicationError>;
}

// --- Request/Response Models (DTOs) ---

// Save requests use domain::DocumentDraft directly and search requests use
// domain::SearchRequest, so no extra request DTOs are needed.

#[derive(Serialize, Debug)]
pub struct SearchResponse {
    /// Matching documents, in no particular order.
    pub documents: Vec<Document>,
    /// Number of matching documents.
    pub nb_hits: usize,
    /// Time taken by the search operation in milliseconds.
    pub processing_time_ms: u128,
}

#[derive(Serialize, Debug)]
pub struct StatsResponse {
    pub total_documents: usize,
}

// --- Application Services (Use Cases) ---

/// Service exposing the document repository operations.
pub struct DocumentService {
    doc_repo: Arc<dyn DocumentRepository>,
}

impl DocumentService {
    pub fn new(doc_repo: Arc<dyn DocumentRepository>) -> Self {
        Self { doc_repo }
    }

    #[instrument(skip(self, draft), fields(requested_id = ?draft.requested_id()))]
    pub async fn save_document(&self, draft: DocumentDraft) -> Result<Document, ApplicationError> {
        info!("Attempting to save document");
        let document = self.doc_repo.save(draft).await.map_err(|e| {
            error!("Failed to save document: {}", e);
            e
        })?;
        info!(doc_id = %document.id(), created = %document.created(), "Document saved successfully");
        Ok(document)
    }

    #[instrument(skip(self))]
    pub async fn find_document(&self, id: &str) -> Result<Option<Document>, ApplicationError> {
        debug!("Looking up document");
        self.doc_repo.find_by_id(&DocumentId::new(id)).await
    }

    /// Like [`find_document`](Self::find_document), but a miss is an error.
    #[instrument(skip(self))]
    pub async fn get_document(&self, id: &str) -> Result<Document, ApplicationError> {
        self.find_document(id).await?.ok_or_else(|| {
            warn!(doc_id = %id, "Document not found");
            ApplicationError::NotFound(id.to_string())
        })
    }

    #[instrument(skip(self, request), fields(has_request = request.is_some()))]
    pub async fn search_documents(
        &self,
        request: Option<SearchRequest>,
    ) -> Result<SearchResponse, ApplicationError> {
        info!("Attempting to search documents");
        let start_time = Instant::now();

        match self.doc_repo.search(request.as_ref()).await {
            Ok(documents) => {
                let processing_time_ms = start_time.elapsed().as_millis();
                let nb_hits = documents.len();
                info!(nb_hits, time_ms = processing_time_ms, "Search successful");
                Ok(SearchResponse {
                    documents,
                    nb_hits,
                    processing_time_ms,
                })
            }
            Err(e) => {
                error!(
                    time_ms = start_time.elapsed().as_millis(),
                    "Search failed: {}", e
                );
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<StatsResponse, ApplicationError> {
        let total_documents = self.doc_repo.count().await.map_err(|e| {
            error!("Failed to count documents for stats: {}", e);
            ApplicationError::InfrastructureError("Failed to retrieve document count".to_string())
        })?;
        Ok(StatsResponse { total_documents })
    }
}
