use super::errors::{ContentResult, ContentStoreError};
use crate::model::content::{ContentId, ContentIds, ContentKind, ContentNode, SessionData, SessionId, SessionStatus};
use lineage_core::{debug, warn};
use lineage_database::{
    prelude::{BatchDbWriter, CachePolicy, CachedDbAccess, CachedDbItem, DB, StoreResult, StoreResultExt},
    registry::DatabaseStorePrefixes,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

/// The first identifier handed out by a fresh store
pub const FIRST_CONTENT_ID: u64 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentNodeData {
    pub parent: Option<ContentId>,
    pub kind: ContentKind,
    pub children: ContentIds,
    pub session: SessionId,
}

impl ContentNodeData {
    pub fn new(parent: Option<ContentId>, kind: ContentKind, session: SessionId) -> Self {
        Self { parent, kind, children: Arc::new(vec![]), session }
    }

    fn to_node(&self, id: ContentId) -> ContentNode {
        ContentNode { id, parent: self.parent, kind: self.kind.clone(), children: Arc::clone(&self.children), session: self.session }
    }
}

/// Reader API for `ContentStore`.
pub trait ContentStoreReader {
    fn has(&self, id: ContentId) -> ContentResult<bool>;
    fn get_node(&self, id: ContentId) -> ContentResult<ContentNode>;
    /// Returns the parent of `id`, or `None` if `id` is a session root
    fn get_parent(&self, id: ContentId) -> ContentResult<Option<ContentId>>;
    /// Returns the children of `id` in discovery order
    fn get_children(&self, id: ContentId) -> ContentResult<ContentIds>;
    fn get_session(&self, session: SessionId) -> ContentResult<SessionData>;
    /// All sessions recorded in the store, in creation order
    fn sessions(&self) -> ContentResult<Vec<SessionData>>;
    /// The currently open session, if any
    fn open_session(&self) -> ContentResult<Option<SessionId>>;
    /// Returns the number of nodes in the store
    fn count(&self) -> ContentResult<usize>;
}

/// Write API for `ContentStore`. Nodes are append-only: once created they are never mutated
/// apart from their children list growing while their session is open.
pub trait ContentStore: ContentStoreReader {
    fn begin_session(&mut self) -> ContentResult<SessionId>;
    /// Allocates the next identifier and registers a node under `parent`, or as the session root if `parent` is `None`
    fn create_node(&mut self, parent: Option<ContentId>, kind: ContentKind) -> ContentResult<ContentId>;
    fn commit_session(&mut self) -> ContentResult<SessionData>;
    fn fail_session(&mut self, reason: &str) -> ContentResult<SessionData>;
}

/// Validates a prospective `create_node` against the open session and the resolved parent
fn check_placement(session: &SessionData, parent: Option<(ContentId, &ContentNodeData)>) -> ContentResult<()> {
    match parent {
        None => match session.root {
            Some(existing) => Err(ContentStoreError::DuplicateRoot { session: session.id, existing }),
            None => Ok(()),
        },
        Some((parent, _)) if session.root.is_none() => Err(ContentStoreError::OrphanNode { session: session.id, parent }),
        Some((parent, data)) if data.session != session.id => Err(ContentStoreError::SealedParent(parent)),
        Some(_) => Ok(()),
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct ContentKey([u8; 8]);

impl From<ContentId> for ContentKey {
    fn from(id: ContentId) -> Self {
        Self(id.to_be_bytes())
    }
}

impl AsRef<[u8]> for ContentKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct SessionKey([u8; 8]);

impl From<SessionId> for SessionKey {
    fn from(id: SessionId) -> Self {
        Self(id.value().to_be_bytes())
    }
}

impl AsRef<[u8]> for SessionKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A DB + cache implementation of `ContentStore` trait, with concurrent readers support.
#[derive(Clone)]
pub struct DbContentStore {
    db: Arc<DB>,
    access: CachedDbAccess<ContentKey, Arc<ContentNodeData>>,
    sessions: CachedDbAccess<SessionKey, SessionData>,
    next_id: CachedDbItem<u64>,
    session_cursor: CachedDbItem<SessionId>,
}

impl DbContentStore {
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            access: CachedDbAccess::new(Arc::clone(&db), cache_policy, DatabaseStorePrefixes::ContentNodes.into()),
            sessions: CachedDbAccess::new(Arc::clone(&db), CachePolicy::Count(64), DatabaseStorePrefixes::Sessions.into()),
            next_id: CachedDbItem::new(Arc::clone(&db), DatabaseStorePrefixes::ContentNextId.into()),
            session_cursor: CachedDbItem::new(db, DatabaseStorePrefixes::SessionCursor.into()),
        }
    }

    /// Returns a store over the same DB with empty caches, so reads are served from disk
    pub fn clone_with_new_cache(&self, cache_policy: CachePolicy) -> Self {
        Self::new(Arc::clone(&self.db), cache_policy)
    }

    fn read_data(&self, id: ContentId) -> ContentResult<Arc<ContentNodeData>> {
        self.access.read(&id.into()).optional()?.ok_or(ContentStoreError::NotFound(id))
    }

    fn last_session(&self) -> ContentResult<Option<SessionId>> {
        Ok(self.session_cursor.read()?)
    }

    fn require_open_session(&self) -> ContentResult<SessionData> {
        let session = self.last_session()?.ok_or(ContentStoreError::NoOpenSession)?;
        let data = self.get_session(session)?;
        if data.is_open() { Ok(data) } else { Err(ContentStoreError::NoOpenSession) }
    }

    fn close_session(&mut self, status: SessionStatus) -> ContentResult<SessionData> {
        let mut data = self.require_open_session()?;
        data.status = status;
        let mut batch = BatchDbWriter::new();
        self.sessions.write(&mut batch, data.id.into(), data.clone())?;
        self.commit(batch, &[], data.id)?;
        Ok(data)
    }

    /// Commits `batch`. On failure the cache entries it wrote are dropped, so readers fall back to the DB.
    fn commit(&self, batch: BatchDbWriter, nodes: &[Option<ContentId>], session: SessionId) -> ContentResult<()> {
        batch.commit(&self.db).inspect_err(|err| {
            warn!("dropping cached writes of session {} after a failed commit: {}", session, err);
            for &id in nodes.iter().flatten() {
                self.access.invalidate(&id.into());
            }
            self.sessions.invalidate(&session.into());
            self.next_id.invalidate();
            self.session_cursor.invalidate();
        })?;
        Ok(())
    }
}

impl ContentStore for DbContentStore {
    fn begin_session(&mut self) -> ContentResult<SessionId> {
        let last = self.last_session()?;
        if let Some(last) = last {
            if self.get_session(last)?.is_open() {
                return Err(ContentStoreError::SessionAlreadyOpen(last));
            }
        }
        let session = last.map_or(SessionId::new(1), SessionId::next);
        let mut batch = BatchDbWriter::new();
        self.sessions.write(&mut batch, session.into(), SessionData::new(session))?;
        self.session_cursor.write(&mut batch, &session)?;
        self.commit(batch, &[], session)?;
        debug!("opened ingestion session {}", session);
        Ok(session)
    }

    fn create_node(&mut self, parent: Option<ContentId>, kind: ContentKind) -> ContentResult<ContentId> {
        let mut session = self.require_open_session()?;
        let parent_data = match parent {
            Some(parent) => {
                let data = self.access.read(&parent.into()).optional()?.ok_or(ContentStoreError::ParentNotFound(parent))?;
                Some((parent, data))
            }
            None => None,
        };
        check_placement(&session, parent_data.as_ref().map(|(id, data)| (*id, data.as_ref())))?;

        let id = ContentId::new(self.next_id.read()?.unwrap_or(FIRST_CONTENT_ID));

        // Node, parent link, id counter and session root land atomically in one batch
        let session_id = session.id;
        let mut batch = BatchDbWriter::new();
        self.access.write(&mut batch, id.into(), Arc::new(ContentNodeData::new(parent, kind, session_id)))?;
        if let Some((parent, mut data)) = parent_data {
            let mut_data = Arc::make_mut(&mut data);
            Arc::make_mut(&mut mut_data.children).push(id);
            self.access.write(&mut batch, parent.into(), data)?;
        } else {
            session.root = Some(id);
            self.sessions.write(&mut batch, session.id.into(), session)?;
        }
        self.next_id.write(&mut batch, &(id.value() + 1))?;
        self.commit(batch, &[Some(id), parent], session_id)?;
        Ok(id)
    }

    fn commit_session(&mut self) -> ContentResult<SessionData> {
        self.close_session(SessionStatus::Committed)
    }

    fn fail_session(&mut self, reason: &str) -> ContentResult<SessionData> {
        self.close_session(SessionStatus::Failed(reason.to_string()))
    }
}

impl ContentStoreReader for DbContentStore {
    fn has(&self, id: ContentId) -> ContentResult<bool> {
        Ok(self.access.has(&id.into())?)
    }

    fn get_node(&self, id: ContentId) -> ContentResult<ContentNode> {
        Ok(self.read_data(id)?.to_node(id))
    }

    fn get_parent(&self, id: ContentId) -> ContentResult<Option<ContentId>> {
        Ok(self.read_data(id)?.parent)
    }

    fn get_children(&self, id: ContentId) -> ContentResult<ContentIds> {
        Ok(Arc::clone(&self.read_data(id)?.children))
    }

    fn get_session(&self, session: SessionId) -> ContentResult<SessionData> {
        self.sessions.read(&session.into()).optional()?.ok_or(ContentStoreError::SessionNotFound(session))
    }

    fn sessions(&self) -> ContentResult<Vec<SessionData>> {
        Ok(self.sessions.iterator().map(|entry| entry.map(|(_, data)| data)).collect::<StoreResult<Vec<_>>>()?)
    }

    fn open_session(&self) -> ContentResult<Option<SessionId>> {
        match self.last_session()? {
            Some(last) if self.get_session(last)?.is_open() => Ok(Some(last)),
            _ => Ok(None),
        }
    }

    fn count(&self) -> ContentResult<usize> {
        Ok(self.access.count()?)
    }
}

/// In-memory `ContentStore`, used by tests and by callers that do not need persistence
#[derive(Default)]
pub struct MemoryContentStore {
    map: HashMap<ContentId, ContentNodeData>,
    sessions: Vec<SessionData>,
    next_id: u64,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self { map: HashMap::new(), sessions: Vec::new(), next_id: FIRST_CONTENT_ID }
    }

    fn get_data(&self, id: ContentId) -> ContentResult<&ContentNodeData> {
        self.map.get(&id).ok_or(ContentStoreError::NotFound(id))
    }

    fn open_session_mut(&mut self) -> ContentResult<&mut SessionData> {
        self.sessions.last_mut().filter(|x| x.is_open()).ok_or(ContentStoreError::NoOpenSession)
    }

    fn close_session(&mut self, status: SessionStatus) -> ContentResult<SessionData> {
        let session = self.open_session_mut()?;
        session.status = status;
        Ok(session.clone())
    }
}

impl ContentStore for MemoryContentStore {
    fn begin_session(&mut self) -> ContentResult<SessionId> {
        if let Some(open) = self.sessions.last().filter(|x| x.is_open()) {
            return Err(ContentStoreError::SessionAlreadyOpen(open.id));
        }
        let session = self.sessions.last().map_or(SessionId::new(1), |x| x.id.next());
        self.sessions.push(SessionData::new(session));
        Ok(session)
    }

    fn create_node(&mut self, parent: Option<ContentId>, kind: ContentKind) -> ContentResult<ContentId> {
        let session = self.open_session_mut()?.clone();
        let parent_data = match parent {
            Some(parent) => Some((parent, self.map.get(&parent).ok_or(ContentStoreError::ParentNotFound(parent))?)),
            None => None,
        };
        check_placement(&session, parent_data)?;

        let id = ContentId::new(self.next_id.max(FIRST_CONTENT_ID));
        self.next_id = id.value() + 1;
        self.map.insert(id, ContentNodeData::new(parent, kind, session.id));
        match parent {
            Some(parent) => {
                // Presence verified by `check_placement` above
                if let Some(data) = self.map.get_mut(&parent) {
                    Arc::make_mut(&mut data.children).push(id);
                }
            }
            None => self.open_session_mut()?.root = Some(id),
        }
        Ok(id)
    }

    fn commit_session(&mut self) -> ContentResult<SessionData> {
        self.close_session(SessionStatus::Committed)
    }

    fn fail_session(&mut self, reason: &str) -> ContentResult<SessionData> {
        self.close_session(SessionStatus::Failed(reason.to_string()))
    }
}

impl ContentStoreReader for MemoryContentStore {
    fn has(&self, id: ContentId) -> ContentResult<bool> {
        Ok(self.map.contains_key(&id))
    }

    fn get_node(&self, id: ContentId) -> ContentResult<ContentNode> {
        Ok(self.get_data(id)?.to_node(id))
    }

    fn get_parent(&self, id: ContentId) -> ContentResult<Option<ContentId>> {
        Ok(self.get_data(id)?.parent)
    }

    fn get_children(&self, id: ContentId) -> ContentResult<ContentIds> {
        Ok(Arc::clone(&self.get_data(id)?.children))
    }

    fn get_session(&self, session: SessionId) -> ContentResult<SessionData> {
        self.sessions.iter().find(|x| x.id == session).cloned().ok_or(ContentStoreError::SessionNotFound(session))
    }

    fn sessions(&self) -> ContentResult<Vec<SessionData>> {
        Ok(self.sessions.clone())
    }

    fn open_session(&self) -> ContentResult<Option<SessionId>> {
        Ok(self.sessions.last().filter(|x| x.is_open()).map(|x| x.id))
    }

    fn count(&self) -> ContentResult<usize> {
        Ok(self.map.len())
    }
}

macro_rules! forward_reader {
    ($($ty:ty),*) => {$(
        impl<T: ContentStoreReader + ?Sized> ContentStoreReader for $ty {
            fn has(&self, id: ContentId) -> ContentResult<bool> {
                (**self).has(id)
            }

            fn get_node(&self, id: ContentId) -> ContentResult<ContentNode> {
                (**self).get_node(id)
            }

            fn get_parent(&self, id: ContentId) -> ContentResult<Option<ContentId>> {
                (**self).get_parent(id)
            }

            fn get_children(&self, id: ContentId) -> ContentResult<ContentIds> {
                (**self).get_children(id)
            }

            fn get_session(&self, session: SessionId) -> ContentResult<SessionData> {
                (**self).get_session(session)
            }

            fn sessions(&self) -> ContentResult<Vec<SessionData>> {
                (**self).sessions()
            }

            fn open_session(&self) -> ContentResult<Option<SessionId>> {
                (**self).open_session()
            }

            fn count(&self) -> ContentResult<usize> {
                (**self).count()
            }
        }
    )*};
}

forward_reader!(&T, Arc<T>, Box<T>);
