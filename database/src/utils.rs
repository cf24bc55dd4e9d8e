use crate::prelude::{ConnBuilder, DB, StoreError, Unspecified, delete_db};
use std::{
    sync::{Arc, Weak},
    thread,
    time::Duration,
};
use tempfile::TempDir;

/// Keeps a temporary DB directory alive and destroys it once the last strong DB reference is gone
#[derive(Default)]
pub struct DbLifetime {
    weak_db_ref: Weak<DB>,
    optional_tempdir: Option<TempDir>,
}

impl DbLifetime {
    pub fn new(tempdir: TempDir, weak_db_ref: Weak<DB>) -> Self {
        Self { optional_tempdir: Some(tempdir), weak_db_ref }
    }

    /// Tracks the DB reference without owning (and hence without deleting) its directory
    pub fn without_destroy(weak_db_ref: Weak<DB>) -> Self {
        Self { optional_tempdir: None, weak_db_ref }
    }
}

impl Drop for DbLifetime {
    fn drop(&mut self) {
        for _ in 0..16 {
            if self.weak_db_ref.strong_count() > 0 {
                // Sometimes another thread is shutting down and cleaning resources
                thread::sleep(Duration::from_millis(250));
            } else {
                break;
            }
        }
        if let Some(dir) = self.optional_tempdir.take() {
            let _ = delete_db(dir.path());
        }
    }
}

pub fn get_lineage_tempdir() -> Result<TempDir, StoreError> {
    Ok(tempfile::Builder::new().prefix("lineage-db-").tempdir()?)
}

/// Opens a DB in a fresh temporary directory. Prefer the [`create_temp_db`](crate::create_temp_db) macro.
pub fn create_temp_db_with(conn_builder: ConnBuilder<Unspecified>) -> Result<(DbLifetime, Arc<DB>), StoreError> {
    let db_tempdir = get_lineage_tempdir()?;
    let db_path = db_tempdir.path().to_owned();
    let db = conn_builder.with_db_path(db_path).build()?;
    Ok((DbLifetime::new(db_tempdir, Arc::downgrade(&db)), db))
}

/// Creates a DB within a temp directory under `<OS SPECIFIC TEMP DIR>/lineage-db-*`.
/// Callers must keep the returned `DbLifetime` guard for as long as they wish the DB to exist.
#[macro_export]
macro_rules! create_temp_db {
    ($conn_builder: expr) => {{ $crate::utils::create_temp_db_with($conn_builder) }};
}
