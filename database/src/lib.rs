mod access;
mod cache;
mod db;
mod errors;
mod item;
mod key;
mod writer;

pub mod registry;
pub mod utils;

pub mod prelude {
    pub use super::access::CachedDbAccess;
    pub use super::cache::{Cache, CachePolicy};
    pub use super::db::{ConnBuilder, DB, Unspecified, delete_db};
    pub use super::errors::{StoreError, StoreResult, StoreResultExt};
    pub use super::item::CachedDbItem;
    pub use super::key::DbKey;
    pub use super::writer::{BatchDbWriter, DbWriter, DirectDbWriter};
}
