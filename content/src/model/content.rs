use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

/// Stable identifier of a content node. Allocated monotonically by a store and never reused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(u64);

impl ContentId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Big-endian bytes, so that DB iteration follows allocation order
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for ContentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for ContentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Identifier of one ingestion session within a store
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Shared, discovery-ordered list of child identifiers
pub type ContentIds = Arc<Vec<ContentId>>;

/// The closed set of artifact kinds, each carrying its kind-specific attributes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Image { paths: Vec<String>, sector_size: u32, timezone: String },
    VolumeSystem { vs_type: String, block_size: u32 },
    Volume { address: u32, start_sector: u64, length_sectors: u64, description: String },
    FileSystem { fs_type: String, block_size: u32, block_count: u64 },
    Directory { name: String },
    File { name: String, size: u64 },
    UnallocatedSpace { start_sector: u64, length_sectors: u64 },
}

impl ContentKind {
    pub fn directory(name: impl Into<String>) -> Self {
        Self::Directory { name: name.into() }
    }

    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self::File { name: name.into(), size }
    }

    pub fn tag(&self) -> ContentKindTag {
        match self {
            ContentKind::Image { .. } => ContentKindTag::Image,
            ContentKind::VolumeSystem { .. } => ContentKindTag::VolumeSystem,
            ContentKind::Volume { .. } => ContentKindTag::Volume,
            ContentKind::FileSystem { .. } => ContentKindTag::FileSystem,
            ContentKind::Directory { .. } => ContentKindTag::Directory,
            ContentKind::File { .. } => ContentKindTag::File,
            ContentKind::UnallocatedSpace { .. } => ContentKindTag::UnallocatedSpace,
        }
    }

    /// The display name for named artifacts (directories and files)
    pub fn name(&self) -> Option<&str> {
        match self {
            ContentKind::Directory { name } | ContentKind::File { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Payload-free mirror of [`ContentKind`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentKindTag {
    Image,
    VolumeSystem,
    Volume,
    FileSystem,
    Directory,
    File,
    UnallocatedSpace,
}

impl Display for ContentKindTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContentKindTag::Image => "image",
            ContentKindTag::VolumeSystem => "volume-system",
            ContentKindTag::Volume => "volume",
            ContentKindTag::FileSystem => "file-system",
            ContentKindTag::Directory => "directory",
            ContentKindTag::File => "file",
            ContentKindTag::UnallocatedSpace => "unallocated-space",
        };
        f.write_str(s)
    }
}

/// A node of the content hierarchy as exposed to readers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentNode {
    pub id: ContentId,
    /// `None` only for the root of an ingestion session
    pub parent: Option<ContentId>,
    pub kind: ContentKind,
    pub children: ContentIds,
    pub session: SessionId,
}

impl ContentNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Open,
    Committed,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub id: SessionId,
    pub root: Option<ContentId>,
    pub status: SessionStatus,
}

impl SessionData {
    pub fn new(id: SessionId) -> Self {
        Self { id, root: None, status: SessionStatus::Open }
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}
