use lineage_content::{
    config::BuildConfig,
    model::{
        content::{ContentId, ContentIds, ContentNode, SessionData, SessionId},
        stores::{ContentResult, ContentStoreReader, DbContentStore},
    },
    pipeline::{
        builder::{BuildReport, TreeBuilder},
        synthetic::{SyntheticEngine, SyntheticLayout},
    },
};
use lineage_database::{
    create_temp_db,
    prelude::{CachePolicy, ConnBuilder, DB},
    utils::DbLifetime,
};
use parking_lot::RwLock;
use std::{collections::HashMap, path::PathBuf, sync::Arc};

/// Fields drop in order, so the DB handles are released before the lifetime guard deletes the directory
pub struct Case {
    pub store: DbContentStore,
    pub db: Arc<DB>,
    pub report: BuildReport,
    pub lifetime: DbLifetime,
}

pub fn image_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("case.E01"), PathBuf::from("case.E02")]
}

/// Ingests a synthetic image into a fresh temporary DB
pub fn build_case(layout: SyntheticLayout, config: BuildConfig) -> Case {
    let (lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10)).unwrap();
    let store = RwLock::new(DbContentStore::new(db.clone(), CachePolicy::Count(1024)));
    let engine = SyntheticEngine::new(layout);
    let report = TreeBuilder::new(&store, &engine, config).build(&image_paths()).unwrap();
    Case { store: store.into_inner(), db, report, lifetime }
}

/// A reader which overrides parent links of selected nodes, for simulating corrupted stores
pub struct TamperedStore<S: ContentStoreReader> {
    inner: S,
    parents: HashMap<ContentId, Option<ContentId>>,
}

impl<S: ContentStoreReader> TamperedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, parents: HashMap::new() }
    }

    pub fn with_parent(mut self, id: u64, parent: Option<u64>) -> Self {
        self.parents.insert(ContentId::new(id), parent.map(ContentId::new));
        self
    }
}

impl<S: ContentStoreReader> ContentStoreReader for TamperedStore<S> {
    fn has(&self, id: ContentId) -> ContentResult<bool> {
        self.inner.has(id)
    }

    fn get_node(&self, id: ContentId) -> ContentResult<ContentNode> {
        let mut node = self.inner.get_node(id)?;
        node.parent = self.get_parent(id)?;
        Ok(node)
    }

    fn get_parent(&self, id: ContentId) -> ContentResult<Option<ContentId>> {
        match self.parents.get(&id) {
            Some(&parent) => Ok(parent),
            None => self.inner.get_parent(id),
        }
    }

    fn get_children(&self, id: ContentId) -> ContentResult<ContentIds> {
        self.inner.get_children(id)
    }

    fn get_session(&self, session: SessionId) -> ContentResult<SessionData> {
        self.inner.get_session(session)
    }

    fn sessions(&self) -> ContentResult<Vec<SessionData>> {
        self.inner.sessions()
    }

    fn open_session(&self) -> ContentResult<Option<SessionId>> {
        self.inner.open_session()
    }

    fn count(&self) -> ContentResult<usize> {
        self.inner.count()
    }
}
