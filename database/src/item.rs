use crate::{db::DB, errors::StoreResult, key::DbKey, writer::DbWriter};
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

/// A single value stored under a fixed key, such as a counter or a cursor
#[derive(Clone)]
pub struct CachedDbItem<T> {
    db: Arc<DB>,
    key: DbKey,
    cached: Arc<RwLock<Option<T>>>,
}

impl<T> CachedDbItem<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    pub fn new(db: Arc<DB>, prefix: Vec<u8>) -> Self {
        Self { db, key: DbKey::prefix_only(&prefix), cached: Arc::new(RwLock::new(None)) }
    }

    /// Returns `None` if the item was never written
    pub fn read(&self) -> StoreResult<Option<T>> {
        if let Some(item) = self.cached.read().clone() {
            return Ok(Some(item));
        }
        let Some(slice) = self.db.get_pinned(&self.key)? else {
            return Ok(None);
        };
        let item: T = bincode::deserialize(&slice)?;
        *self.cached.write() = Some(item.clone());
        Ok(Some(item))
    }

    /// Forgets the cached value, so the next read goes to the DB
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    pub fn write(&mut self, writer: &mut impl DbWriter, item: &T) -> StoreResult<()> {
        writer.put(&self.key, bincode::serialize(item)?)?;
        *self.cached.write() = Some(item.clone());
        Ok(())
    }
}
