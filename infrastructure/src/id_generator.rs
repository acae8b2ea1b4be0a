use application::IdGenerator;
use domain::DocumentId;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Random v4 UUIDs (122 random bits), rendered in hyphenated form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> DocumentId {
        DocumentId::new(Uuid::new_v4().to_string())
    }
}

/// Predictable ids (`{prefix}-1`, `{prefix}-2`, ...) for deterministic tests.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> DocumentId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        DocumentId::new(format!("{}-{}", self.prefix, n))
    }
}
