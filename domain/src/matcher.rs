use crate::{Document, SearchRequest};

/// Returns true if `document` satisfies every criterion present in `request`.
///
/// Criteria combine with AND; the entries of a list criterion combine with OR.
/// A `None` request matches everything. A present but empty list can never be
/// satisfied, so it rejects every document. All string comparisons are
/// case-sensitive.
pub fn matches(document: &Document, request: Option<&SearchRequest>) -> bool {
    let Some(request) = request else {
        return true;
    };

    if let Some(prefixes) = &request.title_prefixes {
        if !prefixes
            .iter()
            .any(|prefix| document.title.starts_with(prefix.as_str()))
        {
            return false;
        }
    }

    if let Some(fragments) = &request.contains_contents {
        if !fragments
            .iter()
            .any(|fragment| document.content.contains(fragment.as_str()))
        {
            return false;
        }
    }

    if let Some(author_ids) = &request.author_ids {
        if !author_ids.iter().any(|id| *id == document.author.id) {
            return false;
        }
    }

    // Bounds are inclusive on both ends.
    if let Some(from) = request.created_from {
        if document.created() < from {
            return false;
        }
    }

    if let Some(to) = request.created_to {
        if document.created() > to {
            return false;
        }
    }

    true
}

impl SearchRequest {
    pub fn matches(&self, document: &Document) -> bool {
        matches(document, Some(self))
    }
}
