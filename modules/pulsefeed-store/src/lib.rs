pub mod postgres;
pub mod repository;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use postgres::PgStore;
pub use repository::{PostRepository, SaveOutcome};
pub use traits::{PostStore, StoreError};

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;
