use crate::{
    cache::{Cache, CachePolicy},
    db::DB,
    errors::{StoreError, StoreResult},
    key::DbKey,
    writer::DbWriter,
};
use rocksdb::{DBIteratorWithThreadMode, Direction, IteratorMode, PrefixRange, ReadOptions};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::hash_map::RandomState,
    hash::{BuildHasher, Hash},
    sync::Arc,
};

/// Typed access to all entries under one store prefix, reading through a shared cache.
///
/// Values are bincode encoded. Writes populate the cache immediately, even when they go
/// into a batch which is committed later. If such a batch fails to commit, the written keys
/// must be dropped with [`CachedDbAccess::invalidate`].
#[derive(Clone)]
pub struct CachedDbAccess<TKey, TData, S = RandomState>
where
    TKey: Clone + Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
{
    db: Arc<DB>,
    cache: Cache<TKey, TData, S>,
    prefix: Vec<u8>,
}

impl<TKey, TData, S> CachedDbAccess<TKey, TData, S>
where
    TKey: Clone + Hash + Eq + Send + Sync + AsRef<[u8]>,
    TData: Clone + Send + Sync,
    S: BuildHasher + Default,
{
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy, prefix: Vec<u8>) -> Self {
        Self { db, cache: Cache::new(cache_policy), prefix }
    }

    fn db_key(&self, key: &TKey) -> DbKey {
        DbKey::new(&self.prefix, key)
    }

    pub fn has(&self, key: &TKey) -> StoreResult<bool> {
        if self.cache.contains_key(key) {
            return Ok(true);
        }
        Ok(self.db.get_pinned(self.db_key(key))?.is_some())
    }

    pub fn read(&self, key: &TKey) -> StoreResult<TData>
    where
        TData: DeserializeOwned,
    {
        if let Some(data) = self.cache.get(key) {
            return Ok(data);
        }
        let db_key = self.db_key(key);
        let Some(slice) = self.db.get_pinned(&db_key)? else {
            return Err(StoreError::KeyNotFound(db_key));
        };
        let data: TData = bincode::deserialize(&slice)?;
        self.cache.insert(key.clone(), data.clone());
        Ok(data)
    }

    pub fn write(&self, writer: &mut impl DbWriter, key: TKey, data: TData) -> StoreResult<()>
    where
        TData: Serialize,
    {
        let bytes = bincode::serialize(&data)?;
        writer.put(self.db_key(&key), bytes)?;
        self.cache.insert(key, data);
        Ok(())
    }

    /// Drops the cached value of `key`, so the next read goes to the DB
    pub fn invalidate(&self, key: &TKey) {
        self.cache.remove(key);
    }

    fn scan(&self) -> (DbKey, DBIteratorWithThreadMode<'_, DB>) {
        let scope = DbKey::prefix_only(&self.prefix);
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(PrefixRange(scope.as_ref()));
        let iter = self.db.iterator_opt(IteratorMode::From(scope.as_ref(), Direction::Forward), read_opts);
        (scope, iter)
    }

    /// All persisted entries in key order, yielding the key suffix and the decoded value. Bypasses the cache.
    pub fn iterator(&self) -> impl Iterator<Item = StoreResult<(Box<[u8]>, TData)>> + '_
    where
        TData: DeserializeOwned,
    {
        let (scope, iter) = self.scan();
        let skip = scope.scope().len();
        iter.map(move |entry| -> StoreResult<(Box<[u8]>, TData)> {
            let (key, bytes) = entry?;
            let data = bincode::deserialize(&bytes)?;
            Ok((key[skip..].into(), data))
        })
    }

    /// Number of persisted entries, counted without decoding values
    pub fn count(&self) -> StoreResult<usize> {
        let (_, mut iter) = self.scan();
        iter.try_fold(0, |count, entry| entry.map(|_| count + 1).map_err(StoreError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        create_temp_db,
        prelude::{BatchDbWriter, ConnBuilder, DirectDbWriter},
    };

    #[test]
    fn test_read_through_small_cache() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10)).unwrap();
        let access = CachedDbAccess::<[u8; 8], u64>::new(db.clone(), CachePolicy::Count(2), vec![1]);

        let mut writer = DirectDbWriter::new(&db);
        for i in 0..16u64 {
            access.write(&mut writer, i.to_be_bytes(), i * 10).unwrap();
        }
        assert_eq!(access.count().unwrap(), 16);
        let values = access.iterator().map(|r| r.unwrap().1).collect::<Vec<_>>();
        assert_eq!(values, (0..16u64).map(|i| i * 10).collect::<Vec<_>>());

        assert_eq!(access.read(&3u64.to_be_bytes()).unwrap(), 30);
        assert!(access.has(&15u64.to_be_bytes()).unwrap());
        assert!(!access.has(&16u64.to_be_bytes()).unwrap());
        assert!(access.read(&16u64.to_be_bytes()).unwrap_err().is_key_not_found());
    }

    #[test]
    fn test_prefixes_do_not_overlap() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10)).unwrap();
        let first = CachedDbAccess::<[u8; 8], u64>::new(db.clone(), CachePolicy::Empty, vec![1]);
        let second = CachedDbAccess::<[u8; 8], u64>::new(db.clone(), CachePolicy::Empty, vec![2]);

        let mut batch = BatchDbWriter::new();
        first.write(&mut batch, 1u64.to_be_bytes(), 100).unwrap();
        second.write(&mut batch, 1u64.to_be_bytes(), 200).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(first.count().unwrap(), 0);
        batch.commit(&db).unwrap();

        assert_eq!(first.count().unwrap(), 1);
        assert_eq!(second.read(&1u64.to_be_bytes()).unwrap(), 200);
        let (suffix, value) = first.iterator().next().unwrap().unwrap();
        assert_eq!((&*suffix, value), (&1u64.to_be_bytes()[..], 100));
    }

    #[test]
    fn test_invalidate_drops_uncommitted_writes() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10)).unwrap();
        let access = CachedDbAccess::<[u8; 8], u64>::new(db.clone(), CachePolicy::Count(8), vec![1]);
        access.write(&mut DirectDbWriter::new(&db), 1u64.to_be_bytes(), 10).unwrap();

        let mut batch = BatchDbWriter::new();
        access.write(&mut batch, 1u64.to_be_bytes(), 11).unwrap();
        access.write(&mut batch, 2u64.to_be_bytes(), 20).unwrap();
        assert_eq!(access.read(&1u64.to_be_bytes()).unwrap(), 11);
        assert!(access.has(&2u64.to_be_bytes()).unwrap());
        drop(batch);

        access.invalidate(&1u64.to_be_bytes());
        access.invalidate(&2u64.to_be_bytes());
        assert_eq!(access.read(&1u64.to_be_bytes()).unwrap(), 10);
        assert!(!access.has(&2u64.to_be_bytes()).unwrap());
    }
}
