use super::record::format_record;
use crate::{
    model::{
        content::{SessionId, SessionStatus},
        stores::{ContentStoreError, ContentStoreReader},
    },
    processes::navigation::{NavigationError, Navigator},
};
use lineage_core::{debug, info, warn};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("session {0} is still open")]
    SessionNotCommitted(SessionId),

    #[error("content store error: {0}")]
    Store(#[from] ContentStoreError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("record output error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordSummary {
    pub leaves: usize,
    pub nodes_visited: usize,
}

/// Writes one `[leaf,...,root]` line per leaf of a closed session, in depth-first child order
pub struct AncestryRecorder<S: ContentStoreReader> {
    navigator: Navigator<S>,
}

impl<S: ContentStoreReader> AncestryRecorder<S> {
    pub fn new(navigator: Navigator<S>) -> Self {
        Self { navigator }
    }

    pub fn record<W: Write>(&self, session: SessionId, mut writer: W) -> Result<RecordSummary, RecorderError> {
        let data = self.navigator.store().get_session(session)?;
        match &data.status {
            SessionStatus::Open => return Err(RecorderError::SessionNotCommitted(session)),
            SessionStatus::Failed(reason) => warn!("recording ancestry of failed session {}: {}", session, reason),
            SessionStatus::Committed => {}
        }
        let Some(root) = data.root else {
            warn!("session {} has no root, nothing to record", session);
            return Ok(RecordSummary::default());
        };

        let mut leaves = 0;
        let nodes_visited = self.navigator.for_each_leaf_path(root, |path| {
            writeln!(writer, "{}", format_record(path.iter().rev().copied()))?;
            leaves += 1;
            Ok::<_, RecorderError>(())
        })?;
        writer.flush()?;

        debug!("session {}: recorded {} leaves out of {} nodes", session, leaves, nodes_visited);
        Ok(RecordSummary { leaves, nodes_visited })
    }

    pub fn record_to_path(&self, session: SessionId, path: &Path) -> Result<RecordSummary, RecorderError> {
        let summary = self.record(session, BufWriter::new(File::create(path)?))?;
        info!("wrote {} ancestry records to {}", summary.leaves, path.display());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{content::ContentKind, stores::{ContentStore, MemoryContentStore}},
        test_helpers::StoreBuilder,
    };

    fn record_string<S: ContentStoreReader>(recorder: &AncestryRecorder<S>, session: SessionId) -> (String, RecordSummary) {
        let mut out = Vec::new();
        let summary = recorder.record(session, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn test_record_leaves() {
        let mut store = MemoryContentStore::new();
        StoreBuilder::new(&mut store).begin().add_root(1).add_node(2, 1).add_node(3, 2).add_node(4, 2).add_node(5, 1).commit();

        let recorder = AncestryRecorder::new(Navigator::new(&store));
        let (out, summary) = record_string(&recorder, SessionId::new(1));
        assert_eq!(out, "[3,2,1]\n[4,2,1]\n[5,1]\n");
        assert_eq!(summary, RecordSummary { leaves: 3, nodes_visited: 5 });
    }

    #[test]
    fn test_single_node_session() {
        let mut store = MemoryContentStore::new();
        StoreBuilder::new(&mut store).begin().add_root(1).commit();
        let (out, summary) = record_string(&AncestryRecorder::new(Navigator::new(&store)), SessionId::new(1));
        assert_eq!(out, "[1]\n");
        assert_eq!(summary.leaves, 1);
    }

    #[test]
    fn test_session_states() {
        let mut store = MemoryContentStore::new();
        StoreBuilder::new(&mut store).begin().add_root(1).add_node(2, 1);
        {
            let recorder = AncestryRecorder::new(Navigator::new(&store));
            assert!(matches!(recorder.record(SessionId::new(1), io::sink()), Err(RecorderError::SessionNotCommitted(_))));
            assert!(matches!(
                recorder.record(SessionId::new(7), io::sink()),
                Err(RecorderError::Store(ContentStoreError::SessionNotFound(_)))
            ));
        }

        // Partial trees of failed sessions are still recorded
        store.fail_session("engine crashed").unwrap();
        let (out, _) = record_string(&AncestryRecorder::new(Navigator::new(&store)), SessionId::new(1));
        assert_eq!(out, "[2,1]\n");

        store.begin_session().unwrap();
        store.fail_session("image unreadable").unwrap();
        let (out, summary) = record_string(&AncestryRecorder::new(Navigator::new(&store)), SessionId::new(2));
        assert!(out.is_empty());
        assert_eq!(summary, RecordSummary::default());

        store.begin_session().unwrap();
        store.create_node(None, ContentKind::directory("/")).unwrap();
        store.commit_session().unwrap();
        let (out, _) = record_string(&AncestryRecorder::new(Navigator::new(&store)), SessionId::new(3));
        assert_eq!(out, "[3]\n");
    }
}
