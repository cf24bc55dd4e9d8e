//!
//! A deterministic stand-in for a native image decoding engine.
//!
//! Every artifact carries its own seed, derived from its parent's seed, so the discovered
//! layout does not depend on the order (or the thread) in which artifacts are expanded.
//!

use super::ingest::{IngestError, IngestResult, IngestionEngine};
use crate::model::content::ContentKind;
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const SECTOR_SIZE: u32 = 512;
const FS_TYPES: [&str; 4] = ["ntfs", "fat32", "ext4", "hfs+"];
const VOLUME_DESCRIPTIONS: [&str; 3] = ["NTFS / exFAT (0x07)", "Linux (0x83)", "Win95 FAT32 (0x0c)"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SyntheticLayout {
    pub seed: u64,
    /// Upper bound on partitions in the volume system
    pub max_volumes: u32,
    /// Directory nesting below each file system root
    pub max_depth: usize,
    pub max_subdirs: usize,
    pub max_files: usize,
    /// Probability for a volume to hold an unrecognized file system
    pub unknown_fs_ratio: f64,
    /// Makes the partition table unparsable
    pub malformed_volume_system: bool,
    /// Makes reading the file system of this volume address fail fatally
    pub fatal_volume: Option<u32>,
    /// Makes opening the image fail
    pub unreadable_image: bool,
}

impl Default for SyntheticLayout {
    fn default() -> Self {
        Self {
            seed: 0,
            max_volumes: 3,
            max_depth: 3,
            max_subdirs: 3,
            max_files: 4,
            unknown_fs_ratio: 0.0,
            malformed_volume_system: false,
            fatal_volume: None,
            unreadable_image: false,
        }
    }
}

impl SyntheticLayout {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed, ..Default::default() }
    }
}

#[derive(Clone, Debug)]
enum Node {
    Image { paths: Vec<String> },
    VolumeSystem,
    Volume { address: u32, start_sector: u64, length_sectors: u64 },
    Unallocated { start_sector: u64, length_sectors: u64 },
    FileSystem { address: u32 },
    Directory { name: String, depth: usize },
    File { name: String },
}

#[derive(Clone, Debug)]
pub struct SyntheticArtifact {
    node: Node,
    seed: u64,
}

impl SyntheticArtifact {
    fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }
}

pub struct SyntheticEngine {
    layout: SyntheticLayout,
}

impl SyntheticEngine {
    pub fn new(layout: SyntheticLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &SyntheticLayout {
        &self.layout
    }

    fn volumes(&self, rng: &mut StdRng) -> Vec<SyntheticArtifact> {
        let count = rng.gen_range(1..=self.layout.max_volumes.max(1));
        let mut children = Vec::new();
        let mut sector = 63u64;
        for address in 0..count {
            let length_sectors = rng.gen_range(2048..=1 << 20);
            let node = Node::Volume { address, start_sector: sector, length_sectors };
            children.push(SyntheticArtifact { node, seed: rng.next_u64() });
            sector += length_sectors;
            if rng.gen_bool(0.5) {
                let length_sectors = rng.gen_range(1..=4096);
                let node = Node::Unallocated { start_sector: sector, length_sectors };
                children.push(SyntheticArtifact { node, seed: rng.next_u64() });
                sector += length_sectors;
            }
        }
        children
    }

    fn directory(&self, depth: usize, rng: &mut StdRng) -> Vec<SyntheticArtifact> {
        let mut children = Vec::new();
        if depth < self.layout.max_depth {
            for i in 0..rng.gen_range(0..=self.layout.max_subdirs) {
                let node = Node::Directory { name: format!("dir{i}"), depth: depth + 1 };
                children.push(SyntheticArtifact { node, seed: rng.next_u64() });
            }
        }
        for i in 0..rng.gen_range(0..=self.layout.max_files) {
            children.push(SyntheticArtifact { node: Node::File { name: format!("file{i}.bin") }, seed: rng.next_u64() });
        }
        children
    }
}

impl IngestionEngine for SyntheticEngine {
    type Artifact = SyntheticArtifact;

    fn open(&self, paths: &[PathBuf]) -> IngestResult<Self::Artifact> {
        let Some(first) = paths.first() else {
            return Err(IngestError::Fatal("no image paths given".to_string()));
        };
        if self.layout.unreadable_image {
            return Err(IngestError::Fatal(format!("cannot open image {}", first.display())));
        }
        let paths = paths.iter().map(|p| p.display().to_string()).collect();
        Ok(SyntheticArtifact { node: Node::Image { paths }, seed: self.layout.seed })
    }

    fn describe(&self, artifact: &Self::Artifact) -> ContentKind {
        let mut rng = artifact.rng();
        match &artifact.node {
            Node::Image { paths } => {
                ContentKind::Image { paths: paths.clone(), sector_size: SECTOR_SIZE, timezone: "UTC".to_string() }
            }
            Node::VolumeSystem => ContentKind::VolumeSystem { vs_type: "dos".to_string(), block_size: SECTOR_SIZE },
            &Node::Volume { address, start_sector, length_sectors } => ContentKind::Volume {
                address,
                start_sector,
                length_sectors,
                description: VOLUME_DESCRIPTIONS[address as usize % VOLUME_DESCRIPTIONS.len()].to_string(),
            },
            &Node::Unallocated { start_sector, length_sectors } => ContentKind::UnallocatedSpace { start_sector, length_sectors },
            Node::FileSystem { .. } => ContentKind::FileSystem {
                fs_type: FS_TYPES[rng.gen_range(0..FS_TYPES.len())].to_string(),
                block_size: 4096,
                block_count: rng.gen_range(1024..=1 << 24),
            },
            Node::Directory { name, .. } => ContentKind::directory(name.as_str()),
            Node::File { name } => ContentKind::file(name.as_str(), rng.gen_range(0..=1 << 30)),
        }
    }

    fn expand(&self, artifact: &Self::Artifact) -> IngestResult<Vec<Self::Artifact>> {
        // The first draws of an artifact's rng are reserved for `describe`
        let mut rng = artifact.rng();
        rng.next_u64();
        rng.next_u64();
        match &artifact.node {
            Node::Image { .. } => Ok(vec![SyntheticArtifact { node: Node::VolumeSystem, seed: rng.next_u64() }]),
            Node::VolumeSystem if self.layout.malformed_volume_system => {
                Err(IngestError::recoverable("volume system", "malformed partition table"))
            }
            Node::VolumeSystem => Ok(self.volumes(&mut rng)),
            &Node::Volume { address, .. } => {
                if rng.gen_bool(self.layout.unknown_fs_ratio.clamp(0.0, 1.0)) {
                    return Err(IngestError::recoverable(format!("volume {address}"), "unknown file system type"));
                }
                Ok(vec![SyntheticArtifact { node: Node::FileSystem { address }, seed: rng.next_u64() }])
            }
            &Node::FileSystem { address } => {
                if self.layout.fatal_volume == Some(address) {
                    return Err(IngestError::Fatal(format!("read error in file system of volume {address}")));
                }
                Ok(vec![SyntheticArtifact { node: Node::Directory { name: "/".to_string(), depth: 0 }, seed: rng.next_u64() }])
            }
            &Node::Directory { depth, .. } => Ok(self.directory(depth, &mut rng)),
            Node::Unallocated { .. } | Node::File { .. } => Ok(vec![]),
        }
    }
}
