//!
//! The boundary towards the engine which actually decodes images, volume systems and file systems.
//!

use crate::model::content::ContentKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum IngestError {
    /// The artifact could not be expanded but its siblings can still be processed
    #[error("{context}: {reason}")]
    Recoverable { context: String, reason: String },

    /// The image as a whole cannot be processed any further
    #[error("fatal ingestion error: {0}")]
    Fatal(String),
}

impl IngestError {
    pub fn recoverable(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Recoverable { context: context.into(), reason: reason.into() }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Fatal(_))
    }
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// An engine which discovers artifacts top-down. `expand` may be called concurrently for
/// unrelated artifacts and must return children in discovery order.
pub trait IngestionEngine: Sync {
    type Artifact: Send;

    /// Opens the image split across `paths`. Any failure here is treated as fatal.
    fn open(&self, paths: &[PathBuf]) -> IngestResult<Self::Artifact>;

    fn describe(&self, artifact: &Self::Artifact) -> ContentKind;

    fn expand(&self, artifact: &Self::Artifact) -> IngestResult<Vec<Self::Artifact>>;
}
