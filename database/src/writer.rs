use crate::{db::DB, errors::StoreResult};
use rocksdb::WriteBatch;

/// Destination of store writes
pub trait DbWriter {
    fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> StoreResult<()>;
}

/// Writes straight to the DB, each put being durable on its own
pub struct DirectDbWriter<'a> {
    db: &'a DB,
}

impl<'a> DirectDbWriter<'a> {
    pub fn new(db: &'a DB) -> Self {
        Self { db }
    }
}

impl DbWriter for DirectDbWriter<'_> {
    fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> StoreResult<()> {
        Ok(self.db.put(key, value)?)
    }
}

/// Collects puts which become visible together on [`BatchDbWriter::commit`]
#[derive(Default)]
pub struct BatchDbWriter {
    batch: WriteBatch,
}

impl BatchDbWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending puts
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn commit(self, db: &DB) -> StoreResult<()> {
        Ok(db.write(self.batch)?)
    }
}

impl DbWriter for BatchDbWriter {
    fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> StoreResult<()> {
        self.batch.put(key, value);
        Ok(())
    }
}
