use super::record::{RecordParseError, parse_record};
use crate::{
    config::DEFAULT_VERIFY_CHUNK_SIZE,
    model::{content::ContentId, stores::{ContentStoreError, ContentStoreReader}},
    processes::navigation::{NavigationError, Navigator},
};
use itertools::Itertools;
use lineage_core::{info, time::Stopwatch, warn};
use rayon::prelude::*;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    time::Duration,
};
use thiserror::Error;

/// Why a single record failed verification. These never abort a run.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Parse(#[from] RecordParseError),

    #[error("content {0} not found")]
    NotFound(ContentId),

    #[error("chain length mismatch: expected {expected} ids, navigator found {observed}")]
    ChainLengthMismatch { expected: usize, observed: usize },

    #[error("chain value mismatch at position {position}: expected {expected}, observed {observed}")]
    ChainValueMismatch { position: usize, expected: ContentId, observed: ContentId },

    #[error("chain starting at {start} exceeded {limit} links, a cycle is suspected")]
    CycleSuspected { start: ContentId, limit: usize },
}

/// Failures which abort the whole run
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("record input error: {0}")]
    Io(#[from] io::Error),

    #[error("content store error: {0}")]
    Store(ContentStoreError),
}

pub type VerifierResult<T> = std::result::Result<T, VerifierError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordVerdict {
    Verified,
    Failed(RecordError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFailure {
    /// 1-based line number within the record input
    pub line: usize,
    pub error: RecordError,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub processed: usize,
    pub verified: usize,
    /// Ordered by line
    pub failures: Vec<RecordFailure>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Splits navigation errors into per-record outcomes and fatal store failures
fn classify(err: NavigationError) -> VerifierResult<RecordError> {
    match err {
        NavigationError::Store(ContentStoreError::NotFound(id)) => Ok(RecordError::NotFound(id)),
        NavigationError::CycleSuspected { start, limit } => Ok(RecordError::CycleSuspected { start, limit }),
        NavigationError::Store(err) => Err(VerifierError::Store(err)),
    }
}

/// Re-derives every recorded chain bottom-up through parent links and compares it with the record
pub struct ConsistencyVerifier<S: ContentStoreReader> {
    navigator: Navigator<S>,
    chunk_size: usize,
}

impl<S: ContentStoreReader + Sync> ConsistencyVerifier<S> {
    pub fn new(navigator: Navigator<S>) -> Self {
        Self { navigator, chunk_size: DEFAULT_VERIFY_CHUNK_SIZE }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn verify_path(&self, path: &Path) -> VerifierResult<VerificationReport> {
        self.verify_reader(BufReader::new(File::open(path)?))
    }

    /// Verifies every non-blank line of `reader`. Lines are taken as raw bytes, so an undecodable
    /// line fails on its own instead of ending the run.
    pub fn verify_reader<R: BufRead>(&self, reader: R) -> VerifierResult<VerificationReport> {
        let _sw = Stopwatch::with_threshold("verify records", Duration::from_secs(2));
        let mut report = VerificationReport::default();
        let lines = reader
            .split(b'\n')
            .enumerate()
            .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.iter().all(u8::is_ascii_whitespace)));
        for chunk in &lines.chunks(self.chunk_size) {
            let chunk = chunk.map(|(index, line)| line.map(|line| (index + 1, line))).collect::<io::Result<Vec<_>>>()?;
            let verdicts = chunk
                .par_iter()
                .map(|(line, bytes)| self.verify_line(bytes).map(|verdict| (*line, verdict)))
                .collect::<VerifierResult<Vec<_>>>()?;
            for (line, verdict) in verdicts {
                report.processed += 1;
                match verdict {
                    RecordVerdict::Verified => report.verified += 1,
                    RecordVerdict::Failed(error) => {
                        warn!("line {}: {}", line, error);
                        report.failures.push(RecordFailure { line, error });
                    }
                }
            }
        }
        info!("verified {} of {} records, {} failures", report.verified, report.processed, report.failures.len());
        Ok(report)
    }

    pub fn verify_line(&self, line: impl AsRef<[u8]>) -> VerifierResult<RecordVerdict> {
        match parse_record(line) {
            Ok(ids) => self.verify_record(&ids),
            Err(err) => Ok(RecordVerdict::Failed(err.into())),
        }
    }

    /// Walks from `ids[0]` towards the root, requiring the `k`-th resolved id to equal `ids[k]`
    /// and the root to be reached exactly at the last position
    pub fn verify_record(&self, ids: &[ContentId]) -> VerifierResult<RecordVerdict> {
        let Some(&leaf) = ids.first() else {
            return Ok(RecordVerdict::Failed(RecordError::ChainLengthMismatch { expected: 0, observed: 0 }));
        };
        match self.walk(ids, leaf) {
            Ok(None) => Ok(RecordVerdict::Verified),
            Ok(Some(error)) => Ok(RecordVerdict::Failed(error)),
            Err(err) => classify(err).map(RecordVerdict::Failed),
        }
    }

    fn walk(&self, ids: &[ContentId], leaf: ContentId) -> Result<Option<RecordError>, NavigationError> {
        let limit = self.navigator.max_chain_len();
        let mut current = self.navigator.node(leaf)?.id;
        for (position, &expected) in ids.iter().enumerate() {
            if current != expected {
                return Ok(Some(RecordError::ChainValueMismatch { position, expected, observed: current }));
            }
            if position >= limit {
                return Ok(Some(RecordError::CycleSuspected { start: leaf, limit }));
            }
            match self.navigator.parent(current)? {
                None if position + 1 < ids.len() => {
                    return Ok(Some(RecordError::ChainLengthMismatch { expected: ids.len(), observed: position + 1 }));
                }
                None => return Ok(None),
                Some(parent) if position + 1 == ids.len() => {
                    let observed = match self.navigator.chain_len(parent) {
                        Ok(rest) => ids.len() + rest,
                        Err(NavigationError::CycleSuspected { .. }) => usize::MAX,
                        Err(err) => return Err(err),
                    };
                    if observed > limit {
                        return Ok(Some(RecordError::CycleSuspected { start: leaf, limit }));
                    }
                    return Ok(Some(RecordError::ChainLengthMismatch { expected: ids.len(), observed }));
                }
                Some(parent) => current = parent,
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::stores::MemoryContentStore, processes::ancestry::record::RecordParseErrorKind, test_helpers::StoreBuilder,
    };
    use std::io::Cursor;

    /// root `1`, child `2`, grandchild `3`
    fn chain_store() -> MemoryContentStore {
        let mut store = MemoryContentStore::new();
        StoreBuilder::new(&mut store).begin().add_root(1).add_node(2, 1).add_node(3, 2).commit();
        store
    }

    fn verdict(store: &MemoryContentStore, line: &str) -> RecordVerdict {
        ConsistencyVerifier::new(Navigator::new(store)).verify_line(line).unwrap()
    }

    #[test]
    fn test_full_match() {
        let store = chain_store();
        assert_eq!(verdict(&store, "[3,2,1]"), RecordVerdict::Verified);
        assert_eq!(verdict(&store, "[3, 2, 1]"), RecordVerdict::Verified);
        assert_eq!(verdict(&store, "[1]"), RecordVerdict::Verified);
    }

    #[test]
    fn test_value_mismatch() {
        let store = chain_store();
        assert_eq!(
            verdict(&store, "[3,2,99]"),
            RecordVerdict::Failed(RecordError::ChainValueMismatch {
                position: 2,
                expected: ContentId::new(99),
                observed: ContentId::new(1)
            })
        );
        assert_eq!(
            verdict(&store, "[3,1]"),
            RecordVerdict::Failed(RecordError::ChainValueMismatch {
                position: 1,
                expected: ContentId::new(1),
                observed: ContentId::new(2)
            })
        );
    }

    #[test]
    fn test_length_mismatch() {
        let store = chain_store();
        // Root missing from the record
        assert_eq!(verdict(&store, "[3,2]"), RecordVerdict::Failed(RecordError::ChainLengthMismatch { expected: 2, observed: 3 }));
        // Record claims more ancestors than exist
        assert_eq!(verdict(&store, "[3,2,1,0]"), RecordVerdict::Failed(RecordError::ChainLengthMismatch { expected: 4, observed: 3 }));
    }

    #[test]
    fn test_not_found_and_parse_errors() {
        let store = chain_store();
        assert_eq!(verdict(&store, "[42,2,1]"), RecordVerdict::Failed(RecordError::NotFound(ContentId::new(42))));
        assert!(matches!(verdict(&store, "3,2,1"), RecordVerdict::Failed(RecordError::Parse(_))));
    }

    #[test]
    fn test_chain_cutoff() {
        let store = chain_store();
        let verifier = ConsistencyVerifier::new(Navigator::with_max_chain_len(&store, 2));
        assert_eq!(
            verifier.verify_line("[3,2,1]").unwrap(),
            RecordVerdict::Failed(RecordError::CycleSuspected { start: ContentId::new(3), limit: 2 })
        );
        assert_eq!(
            verifier.verify_line("[3]").unwrap(),
            RecordVerdict::Failed(RecordError::CycleSuspected { start: ContentId::new(3), limit: 2 })
        );
        assert_eq!(verifier.verify_line("[2,1]").unwrap(), RecordVerdict::Verified);
    }

    #[test]
    fn test_report_accumulates_in_line_order() {
        let store = chain_store();
        let input = "[3,2,1]\n3,2,1\n\n[3,2]\r\n   \n[2,1]\n[7]\n";
        let verifier = ConsistencyVerifier::new(Navigator::new(&store)).with_chunk_size(2);
        let report = verifier.verify_reader(Cursor::new(input)).unwrap();
        assert_eq!(report.processed, 5);
        assert_eq!(report.verified, 2);
        assert_eq!(report.failures.iter().map(|f| f.line).collect::<Vec<_>>(), vec![2, 4, 7]);
        assert!(matches!(report.failures[0].error, RecordError::Parse(_)));
        assert!(matches!(report.failures[1].error, RecordError::ChainLengthMismatch { .. }));
        assert_eq!(report.failures[2].error, RecordError::NotFound(ContentId::new(7)));

        // Reruns are identical
        assert_eq!(verifier.verify_reader(Cursor::new(input)).unwrap(), report);
    }

    #[test]
    fn test_undecodable_line_fails_alone() {
        let store = chain_store();
        let input: &[u8] = b"[3,2,1]\n[3,\xff2,1]\n[3,2,1]\n";
        let report = ConsistencyVerifier::new(Navigator::new(&store)).verify_reader(Cursor::new(input)).unwrap();
        assert_eq!((report.processed, report.verified), (3, 2));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].line, 2);
        assert!(matches!(
            report.failures[0].error,
            RecordError::Parse(e) if e.kind == RecordParseErrorKind::NonAscii && e.column == 4
        ));
    }

    struct BrokenReader;

    impl io::Read for BrokenReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device removed"))
        }
    }

    #[test]
    fn test_read_failure_aborts() {
        let store = chain_store();
        let verifier = ConsistencyVerifier::new(Navigator::new(&store));
        assert!(matches!(verifier.verify_reader(io::BufReader::new(BrokenReader)), Err(VerifierError::Io(_))));
    }

    #[test]
    fn test_empty_input() {
        let store = chain_store();
        let report = ConsistencyVerifier::new(Navigator::new(&store)).verify_reader(Cursor::new("")).unwrap();
        assert_eq!(report, VerificationReport::default());
        assert!(report.is_clean());
    }
}
