//!
//! Test utils for content stores
//!
use crate::model::{
    content::{ContentId, ContentKind},
    stores::ContentStore,
};

/// A struct with fluent API to streamline content store building.
/// Each `add_*` call asserts the identifier the store allocates, keeping test trees readable.
pub struct StoreBuilder<'a> {
    store: &'a mut dyn ContentStore,
}

impl<'a> StoreBuilder<'a> {
    pub fn new(store: &'a mut dyn ContentStore) -> Self {
        Self { store }
    }

    pub fn begin(&mut self) -> &mut Self {
        self.store.begin_session().unwrap();
        self
    }

    pub fn add_root(&mut self, expected: u64) -> &mut Self {
        self.add_node_with(expected, None, ContentKind::directory("/"))
    }

    pub fn add_node(&mut self, expected: u64, parent: u64) -> &mut Self {
        self.add_node_with(expected, Some(parent), ContentKind::file(format!("f{expected}"), expected))
    }

    pub fn add_node_with(&mut self, expected: u64, parent: Option<u64>, kind: ContentKind) -> &mut Self {
        let id = self.store.create_node(parent.map(ContentId::new), kind).unwrap();
        assert_eq!(id, ContentId::new(expected), "store allocated an unexpected id");
        self
    }

    pub fn commit(&mut self) -> &mut Self {
        self.store.commit_session().unwrap();
        self
    }
}
