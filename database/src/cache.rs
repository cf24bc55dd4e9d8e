use indexmap::IndexMap;
use parking_lot::RwLock;
use rand::Rng;
use std::{
    collections::hash_map::RandomState,
    hash::{BuildHasher, Hash},
    sync::Arc,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    /// Every read goes to the DB
    Empty,
    /// Holds up to this many entries, evicting a random one when full
    Count(usize),
}

/// Bounded map shared between clones, evicting a random entry once full
#[derive(Clone)]
pub struct Cache<TKey, TData, S = RandomState> {
    entries: Arc<RwLock<IndexMap<TKey, TData, S>>>,
    capacity: usize,
}

impl<TKey, TData, S> Cache<TKey, TData, S>
where
    TKey: Hash + Eq,
    TData: Clone,
    S: BuildHasher + Default,
{
    pub fn new(policy: CachePolicy) -> Self {
        let capacity = match policy {
            CachePolicy::Empty => 0,
            CachePolicy::Count(capacity) => capacity,
        };
        Self { entries: Arc::new(RwLock::new(IndexMap::with_capacity_and_hasher(capacity, S::default()))), capacity }
    }

    pub fn get(&self, key: &TKey) -> Option<TData> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &TKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn insert(&self, key: TKey, data: TData) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let victim = rand::thread_rng().gen_range(0..entries.len());
            entries.swap_remove_index(victim);
        }
        entries.insert(key, data);
    }

    pub fn remove(&self, key: &TKey) -> Option<TData> {
        self.entries.write().swap_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
