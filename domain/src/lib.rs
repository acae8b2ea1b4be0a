use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod matcher;

pub use matcher::matches;

// --- Document ID ---
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl From<DocumentId> for String {
    fn from(doc_id: DocumentId) -> Self {
        doc_id.0
    }
}
impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Author ---

/// The author of a document. Only `id` takes part in search matching.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub name: String,
}

// --- Documents ---

/// A document as handed in by a caller, before the repository has normalized it.
///
/// `id` may be absent (or empty), in which case the repository assigns one.
/// `created` is accepted for convenience but never trusted: the repository
/// either keeps the timestamp of the stored document or stamps the current time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentDraft {
    #[serde(default)]
    pub id: Option<DocumentId>,
    pub title: String,
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl DocumentDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>, author: Author) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            author,
            created: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The caller-supplied id, if it is present and non-empty.
    pub fn requested_id(&self) -> Option<&DocumentId> {
        self.id.as_ref().filter(|id| !id.is_empty())
    }

    /// Finalizes the draft under `id` with the authoritative creation time.
    pub fn into_document(self, id: DocumentId, created: DateTime<Utc>) -> Document {
        Document {
            id,
            title: self.title,
            content: self.content,
            author: self.author,
            created,
        }
    }
}

/// A stored document. Every stored document has an id and a creation time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    pub title: String,
    pub content: String,
    pub author: Author,
    created: DateTime<Utc>,
}

impl Document {
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

// --- Search Criteria ---

/// Filter criteria for a search. Each field is optional.
///
/// An absent list skips its criterion; a present but empty list matches no
/// document at all. See [`matcher::matches`] for the full semantics.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    #[serde(default)]
    pub title_prefixes: Option<Vec<String>>,
    #[serde(default)]
    pub contains_contents: Option<Vec<String>>,
    #[serde(default)]
    pub author_ids: Option<Vec<String>>,
    #[serde(default)]
    pub created_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_to: Option<DateTime<Utc>>,
}
