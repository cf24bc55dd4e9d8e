pub mod content;
pub mod errors;

pub use content::{ContentStore, ContentStoreReader, DbContentStore, MemoryContentStore};
pub use errors::{ContentResult, ContentStoreError};
