use crate::db::DB;
use crate::errors::StoreError;
use std::{path::PathBuf, sync::Arc};

const MB: usize = 1024 * 1024;
const MEM_BUDGET: usize = 64 * MB;

#[derive(Debug)]
pub struct Unspecified;

/// Type-state builder for rocksdb connections. A path must be provided before `build` is available.
#[derive(Debug)]
pub struct ConnBuilder<Path> {
    db_path: Path,
    read_only: bool,
    parallelism: usize,
    files_limit: i32,
}

impl Default for ConnBuilder<Unspecified> {
    fn default() -> Self {
        ConnBuilder { db_path: Unspecified, read_only: false, parallelism: 1, files_limit: 64 }
    }
}

impl<Path> ConnBuilder<Path> {
    pub fn with_db_path(self, db_path: PathBuf) -> ConnBuilder<PathBuf> {
        ConnBuilder {
            db_path,
            read_only: self.read_only,
            parallelism: self.parallelism,
            files_limit: self.files_limit,
        }
    }
    /// Opens an existing DB without write access. Every write through it fails.
    pub fn with_read_only(self, read_only: bool) -> Self {
        ConnBuilder { read_only, ..self }
    }
    pub fn with_parallelism(self, parallelism: impl Into<usize>) -> Self {
        ConnBuilder { parallelism: parallelism.into(), ..self }
    }
    pub fn with_files_limit(self, files_limit: impl Into<i32>) -> Self {
        ConnBuilder { files_limit: files_limit.into(), ..self }
    }
}

impl ConnBuilder<PathBuf> {
    pub fn build(self) -> Result<Arc<DB>, StoreError> {
        let mut opts = rocksdb::Options::default();
        if self.parallelism > 1 {
            opts.increase_parallelism(self.parallelism as i32);
        }
        opts.optimize_level_style_compaction(MEM_BUDGET);
        opts.set_max_open_files(self.files_limit);
        let db = if self.read_only {
            DB::open_for_read_only(&opts, &self.db_path, false)?
        } else {
            opts.create_if_missing(true);
            DB::open(&opts, &self.db_path)?
        };
        Ok(Arc::new(db))
    }
}
