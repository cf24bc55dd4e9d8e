use super::ingest::{IngestError, IngestionEngine};
use crate::{
    config::BuildConfig,
    model::{
        content::{ContentId, ContentKindTag, SessionId},
        stores::{ContentStore, ContentStoreError},
    },
};
use lineage_core::{debug, error, info, time::Stopwatch, trace, warn};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::{
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("content store error: {0}")]
    Store(#[from] ContentStoreError),

    #[error("{0}")]
    Ingest(IngestError),
}

/// A recoverable failure to expand the children of `parent`. The subtree under `parent` is incomplete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildWarning {
    pub parent: ContentId,
    pub kind: ContentKindTag,
    pub error: IngestError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildReport {
    pub session: SessionId,
    pub root: ContentId,
    pub nodes_created: usize,
    /// Ordered by parent id
    pub warnings: Vec<BuildWarning>,
}

/// Materializes the artifacts discovered by an [`IngestionEngine`] as a content tree, top-down.
/// Every node is created before its children are requested from the engine.
pub struct TreeBuilder<'a, S: ContentStore, E: IngestionEngine> {
    store: &'a RwLock<S>,
    engine: &'a E,
    config: BuildConfig,
}

/// Per build mutable state, shared across expansion tasks
#[derive(Default)]
struct BuildContext {
    nodes_created: AtomicUsize,
    warnings: Mutex<Vec<BuildWarning>>,
}

impl<'a, S, E> TreeBuilder<'a, S, E>
where
    S: ContentStore + Send + Sync,
    E: IngestionEngine,
{
    pub fn new(store: &'a RwLock<S>, engine: &'a E, config: BuildConfig) -> Self {
        Self { store, engine, config }
    }

    /// Ingests the image at `paths` within a new session. The session is committed on success and
    /// marked failed otherwise, in which case nodes created so far are kept.
    pub fn build(&self, paths: &[PathBuf]) -> Result<BuildReport, BuildError> {
        let session = self.store.write().begin_session()?;
        info!("session {}: ingesting {:?}", session, paths);

        let ctx = BuildContext::default();
        let _sw = Stopwatch::with_threshold("build content tree", Duration::from_secs(30));
        let outcome = self.build_session(paths, &ctx).and_then(|root| {
            self.store.write().commit_session()?;
            Ok(root)
        });
        match outcome {
            Ok(root) => {
                let mut warnings = ctx.warnings.into_inner();
                warnings.sort_by_key(|w| w.parent);
                let report = BuildReport { session, root, nodes_created: ctx.nodes_created.into_inner(), warnings };
                info!("session {}: committed {} nodes with {} warnings", session, report.nodes_created, report.warnings.len());
                Ok(report)
            }
            Err(err) => {
                error!("session {}: build failed: {}", session, err);
                if let Err(fail_err) = self.store.write().fail_session(&err.to_string()) {
                    error!("session {}: could not mark session as failed: {}", session, fail_err);
                }
                Err(err)
            }
        }
    }

    fn build_session(&self, paths: &[PathBuf], ctx: &BuildContext) -> Result<ContentId, BuildError> {
        let image = self.engine.open(paths).map_err(|err| match err {
            IngestError::Recoverable { context, reason } => BuildError::Ingest(IngestError::Fatal(format!("{context}: {reason}"))),
            fatal => BuildError::Ingest(fatal),
        })?;
        let root = self.create(None, &image, ctx)?;
        if self.config.parallel {
            self.expand_parallel(root, &image, ctx)?;
        } else {
            self.expand_sequential(root, image, ctx)?;
        }
        Ok(root)
    }

    fn expand_sequential(&self, root: ContentId, image: E::Artifact, ctx: &BuildContext) -> Result<(), BuildError> {
        let mut stack = vec![(root, image)];
        while let Some((id, artifact)) = stack.pop() {
            let children = self.create_children(id, &artifact, ctx)?;
            stack.extend(children.into_iter().rev());
        }
        Ok(())
    }

    fn expand_parallel(&self, id: ContentId, artifact: &E::Artifact, ctx: &BuildContext) -> Result<(), BuildError> {
        let children = self.create_children(id, artifact, ctx)?;
        children.into_par_iter().try_for_each(|(child_id, child)| self.expand_parallel(child_id, &child, ctx))
    }

    /// Creates all children of `artifact` in discovery order. Recoverable engine failures are
    /// recorded as warnings and leave `id` without children.
    fn create_children(
        &self,
        id: ContentId,
        artifact: &E::Artifact,
        ctx: &BuildContext,
    ) -> Result<Vec<(ContentId, E::Artifact)>, BuildError> {
        match self.engine.expand(artifact) {
            Ok(children) => children.into_iter().map(|child| Ok((self.create(Some(id), &child, ctx)?, child))).collect(),
            Err(err @ IngestError::Recoverable { .. }) => {
                let kind = self.engine.describe(artifact).tag();
                warn!("skipping children of {} {}: {}", kind, id, err);
                ctx.warnings.lock().push(BuildWarning { parent: id, kind, error: err });
                Ok(vec![])
            }
            Err(fatal) => Err(BuildError::Ingest(fatal)),
        }
    }

    fn create(&self, parent: Option<ContentId>, artifact: &E::Artifact, ctx: &BuildContext) -> Result<ContentId, BuildError> {
        let kind = self.engine.describe(artifact);
        let tag = kind.tag();
        let id = self.store.write().create_node(parent, kind)?;
        ctx.nodes_created.fetch_add(1, Ordering::Relaxed);
        match parent {
            Some(parent) => trace!("created {} {} under {}", tag, id, parent),
            None => debug!("created root {} {}", tag, id),
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        content::{ContentIds, ContentKind, ContentNode, SessionData, SessionStatus},
        stores::{ContentResult, ContentStoreReader, MemoryContentStore},
    };
    use lineage_database::prelude::StoreError;
    use std::{collections::HashMap, io};

    /// An engine over a fixed adjacency map keyed by artifact name. Names listed in `broken`
    /// fail to expand with the attached error.
    struct MapEngine {
        children: HashMap<&'static str, Vec<&'static str>>,
        broken: HashMap<&'static str, IngestError>,
    }

    impl MapEngine {
        fn new(edges: &[(&'static str, &[&'static str])]) -> Self {
            Self { children: edges.iter().map(|(k, v)| (*k, v.to_vec())).collect(), broken: HashMap::new() }
        }

        fn with_broken(mut self, name: &'static str, err: IngestError) -> Self {
            self.broken.insert(name, err);
            self
        }
    }

    impl IngestionEngine for MapEngine {
        type Artifact = &'static str;

        fn open(&self, paths: &[PathBuf]) -> Result<Self::Artifact, IngestError> {
            if paths.is_empty() { Err(IngestError::Fatal("no image".to_string())) } else { Ok("img") }
        }

        fn describe(&self, artifact: &Self::Artifact) -> ContentKind {
            if self.children.contains_key(artifact) { ContentKind::directory(*artifact) } else { ContentKind::file(*artifact, 1) }
        }

        fn expand(&self, artifact: &Self::Artifact) -> Result<Vec<Self::Artifact>, IngestError> {
            if let Some(err) = self.broken.get(artifact) {
                return Err(err.clone());
            }
            Ok(self.children.get(artifact).cloned().unwrap_or_default())
        }
    }

    /// Memory store whose first `failing_commits` commits hit a storage error
    struct CommitFailingStore {
        inner: MemoryContentStore,
        failing_commits: usize,
    }

    impl ContentStoreReader for CommitFailingStore {
        fn has(&self, id: ContentId) -> ContentResult<bool> {
            self.inner.has(id)
        }

        fn get_node(&self, id: ContentId) -> ContentResult<ContentNode> {
            self.inner.get_node(id)
        }

        fn get_parent(&self, id: ContentId) -> ContentResult<Option<ContentId>> {
            self.inner.get_parent(id)
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

    impl ContentStore for CommitFailingStore {
        fn begin_session(&mut self) -> ContentResult<SessionId> {
            self.inner.begin_session()
        }

        fn create_node(&mut self, parent: Option<ContentId>, kind: ContentKind) -> ContentResult<ContentId> {
            self.inner.create_node(parent, kind)
        }

        fn commit_session(&mut self) -> ContentResult<SessionData> {
            if self.failing_commits > 0 {
                self.failing_commits -= 1;
                return Err(StoreError::IoError(io::Error::other("disk full")).into());
            }
            self.inner.commit_session()
        }

        fn fail_session(&mut self, reason: &str) -> ContentResult<SessionData> {
            self.inner.fail_session(reason)
        }
    }

    fn paths() -> Vec<PathBuf> {
        vec![PathBuf::from("disk.img")]
    }

    #[test]
    fn test_sequential_build_order() {
        let engine = MapEngine::new(&[("img", &["a", "b"]), ("a", &["a1", "a2"]), ("b", &["b1"])]);
        let store = RwLock::new(MemoryContentStore::new());
        let report = TreeBuilder::new(&store, &engine, BuildConfig::default()).build(&paths()).unwrap();
        assert_eq!(report.nodes_created, 6);
        assert!(report.warnings.is_empty());

        let store = store.into_inner();
        // Children of a node are created together, before descending
        let name = |id: u64| store.get_node(ContentId::new(id)).unwrap().kind.name().map(str::to_string);
        let names = (1..=6).map(name).collect::<Option<Vec<_>>>().unwrap();
        assert_eq!(names, vec!["img", "a", "b", "a1", "a2", "b1"]);
        assert_eq!(store.get_session(report.session).unwrap().status, SessionStatus::Committed);
    }

    #[test]
    fn test_recoverable_errors_become_warnings() {
        let engine = MapEngine::new(&[("img", &["a", "b"]), ("a", &["a1"]), ("b", &["b1"])])
            .with_broken("a", IngestError::recoverable("volume system", "malformed partition table"));
        let store = RwLock::new(MemoryContentStore::new());
        let report = TreeBuilder::new(&store, &engine, BuildConfig::default()).build(&paths()).unwrap();
        assert_eq!(report.nodes_created, 4);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].parent, ContentId::new(2));
        assert_eq!(report.warnings[0].kind, ContentKindTag::Directory);
    }

    #[test]
    fn test_fatal_errors_fail_the_session() {
        let engine = MapEngine::new(&[("img", &["a", "b"]), ("b", &["b1"])]).with_broken("b", IngestError::Fatal("read error".into()));
        let store = RwLock::new(MemoryContentStore::new());
        let err = TreeBuilder::new(&store, &engine, BuildConfig::default()).build(&paths()).unwrap_err();
        assert!(matches!(err, BuildError::Ingest(IngestError::Fatal(_))));

        let store = store.into_inner();
        // Partial tree is kept, session is failed
        assert_eq!(store.count().unwrap(), 3);
        assert!(matches!(store.sessions().unwrap()[0].status, SessionStatus::Failed(_)));
    }

    #[test]
    fn test_commit_failure_fails_the_session() {
        let engine = MapEngine::new(&[("img", &["a"])]);
        let store = RwLock::new(CommitFailingStore { inner: MemoryContentStore::new(), failing_commits: 1 });
        let err = TreeBuilder::new(&store, &engine, BuildConfig::default()).build(&paths()).unwrap_err();
        assert!(matches!(err, BuildError::Store(ContentStoreError::Store(_))));
        {
            let store = store.read();
            assert_eq!(store.open_session().unwrap(), None);
            assert!(matches!(store.sessions().unwrap()[0].status, SessionStatus::Failed(_)));
        }

        // The store accepts a new session afterwards
        let report = TreeBuilder::new(&store, &engine, BuildConfig::default()).build(&paths()).unwrap();
        assert_eq!(report.session, SessionId::new(2));
        assert_eq!(store.read().get_session(report.session).unwrap().status, SessionStatus::Committed);
    }

    #[test]
    fn test_unopenable_image() {
        let engine = MapEngine::new(&[]);
        let store = RwLock::new(MemoryContentStore::new());
        assert!(TreeBuilder::new(&store, &engine, BuildConfig::default()).build(&[]).is_err());
        let store = store.into_inner();
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.sessions().unwrap()[0].root, None);
        assert_eq!(store.open_session().unwrap(), None);
    }

    #[test]
    fn test_parallel_build() {
        let engine = MapEngine::new(&[("img", &["a", "b", "c"]), ("a", &["a1", "a2"]), ("b", &["b1", "b2"]), ("c", &["c1"])]);
        let store = RwLock::new(MemoryContentStore::new());
        let report = TreeBuilder::new(&store, &engine, BuildConfig::parallel()).build(&paths()).unwrap();
        assert_eq!(report.nodes_created, 9);

        let store = store.into_inner();
        // Direct children of the root are created before any fan-out
        let root_children = store.get_children(report.root).unwrap();
        assert_eq!(root_children.as_slice(), &[ContentId::new(2), ContentId::new(3), ContentId::new(4)]);
        let names = root_children.iter().map(|&id| store.get_children(id).unwrap().len()).collect::<Vec<_>>();
        assert_eq!(names, vec![2, 2, 1]);
    }
}
