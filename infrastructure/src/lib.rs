// Module declarations
pub mod clock;
pub mod id_generator;
pub mod persistence;

// Re-export all implementations
pub use clock::{FixedClock, SystemClock};
pub use id_generator::{SequentialIdGenerator, UuidIdGenerator};
pub use persistence::InMemoryDocumentRepository;
