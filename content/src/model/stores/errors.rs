use crate::model::content::{ContentId, SessionId};
use lineage_database::prelude::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentStoreError {
    #[error("content {0} not found")]
    NotFound(ContentId),

    #[error("parent content {0} not found")]
    ParentNotFound(ContentId),

    #[error("session {session} already has root {existing}")]
    DuplicateRoot { session: SessionId, existing: ContentId },

    #[error("content {0} belongs to a closed session and cannot receive children")]
    SealedParent(ContentId),

    #[error("session {session} has no root yet, cannot attach to {parent}")]
    OrphanNode { session: SessionId, parent: ContentId },

    #[error("no ingestion session is open")]
    NoOpenSession,

    #[error("session {0} is still open")]
    SessionAlreadyOpen(SessionId),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("data store error: {0}")]
    Store(#[from] StoreError),
}

impl ContentStoreError {
    /// `true` for the structural "unknown identifier" outcome, as opposed to storage failures
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContentStoreError::NotFound(_))
    }
}

pub type ContentResult<T> = std::result::Result<T, ContentStoreError>;
