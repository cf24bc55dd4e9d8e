use crate::args::Args;
use lineage_content::{
    config::BuildConfig,
    model::stores::{ContentStoreReader, DbContentStore},
    pipeline::{
        builder::{BuildError, BuildReport, TreeBuilder},
        synthetic::SyntheticEngine,
    },
    processes::{
        ancestry::{
            recorder::{AncestryRecorder, RecorderError},
            symmetry::{SymmetryError, validate_store},
            verifier::{ConsistencyVerifier, VerificationReport, VerifierError},
        },
        navigation::Navigator,
    },
};
use lineage_core::{info, warn};
use lineage_database::{
    prelude::{CachePolicy, ConnBuilder, DB, StoreError},
    utils::{DbLifetime, create_temp_db_with},
};
use parking_lot::RwLock;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("no image path was given")]
    MissingImage,

    #[error("--verify-only requires --db-dir")]
    MissingDbDir,

    #[error("database error: {0}")]
    Store(#[from] StoreError),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("recording failed: {0}")]
    Recorder(#[from] RecorderError),

    #[error("verification failed: {0}")]
    Verifier(#[from] VerifierError),

    #[error("store is inconsistent: {0}")]
    Symmetry(#[from] SymmetryError),

    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug)]
pub struct AuditOutcome {
    pub build: Option<BuildReport>,
    pub verification: VerificationReport,
    pub exceptions: PathBuf,
}

impl AuditOutcome {
    pub fn is_clean(&self) -> bool {
        self.verification.is_clean()
    }
}

/// Keeps the DB alive and, for temporary DBs, removes it when dropped
struct DbHandle {
    db: Arc<DB>,
    _lifetime: DbLifetime,
}

fn open_db(args: &Args) -> Result<DbHandle, AuditError> {
    let conn_builder = ConnBuilder::default().with_parallelism(args.thread_count());
    match &args.db_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let db = conn_builder.with_db_path(PathBuf::from(dir)).with_read_only(args.verify_only).build()?;
            let lifetime = DbLifetime::without_destroy(Arc::downgrade(&db));
            Ok(DbHandle { db, _lifetime: lifetime })
        }
        None if args.verify_only => Err(AuditError::MissingDbDir),
        None => {
            let (lifetime, db) = create_temp_db_with(conn_builder)?;
            Ok(DbHandle { db, _lifetime: lifetime })
        }
    }
}

/// Runs the build, record and verify stages and writes every exception to the exceptions file
pub fn run(args: &Args) -> Result<AuditOutcome, AuditError> {
    if args.image.is_empty() && !args.verify_only {
        return Err(AuditError::MissingImage);
    }
    fs::create_dir_all(&args.out_dir)?;
    let records = args.records_path();
    let exceptions_path = args.exceptions_path();
    let mut exceptions = BufWriter::new(File::create(&exceptions_path)?);

    let config = args.content_config();
    let handle = open_db(args)?;
    let build = if args.verify_only {
        None
    } else {
        let store = RwLock::new(DbContentStore::new(handle.db.clone(), CachePolicy::Count(config.cache_size)));
        let engine = SyntheticEngine::new(args.layout());
        let paths = args.image.iter().map(PathBuf::from).collect::<Vec<_>>();
        let config = BuildConfig { parallel: args.parallel };
        let report = match TreeBuilder::new(&store, &engine, config).build(&paths) {
            Ok(report) => report,
            Err(err) => {
                writeln!(exceptions, "fatal: {}", err)?;
                exceptions.flush()?;
                return Err(err.into());
            }
        };
        for warning in report.warnings.iter() {
            writeln!(exceptions, "warning: {} {}: {}", warning.kind, warning.parent, warning.error)?;
        }

        let store = store.into_inner();
        validate_store(&store)?;
        let summary = AncestryRecorder::new(Navigator::new(&store)).record_to_path(report.session, &records)?;
        info!("session {}: {} leaves over {} nodes", report.session, summary.leaves, summary.nodes_visited);
        Some(report)
    };

    // Verification reads through a fresh cache so that it exercises the persisted links only
    let store = DbContentStore::new(handle.db.clone(), CachePolicy::Count(config.cache_size));
    if store.count()? == 0 {
        warn!("the content store is empty");
    }
    let navigator = Navigator::with_max_chain_len(&store, config.max_chain_len);
    let verifier = ConsistencyVerifier::new(navigator).with_chunk_size(config.verify_chunk_size);
    let verification = verifier.verify_path(&records)?;
    for failure in verification.failures.iter() {
        writeln!(exceptions, "line {}: {}", failure.line, failure.error)?;
    }
    exceptions.flush()?;

    Ok(AuditOutcome { build, verification, exceptions: exceptions_path })
}
