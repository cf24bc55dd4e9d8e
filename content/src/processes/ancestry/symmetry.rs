use crate::model::{
    content::ContentId,
    stores::{ContentStoreError, ContentStoreReader},
};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SymmetryError {
    #[error("content store error: {0}")]
    Store(#[from] ContentStoreError),

    #[error("{child} is listed under {parent} but its parent is {actual:?}")]
    ChildParentMismatch { parent: ContentId, child: ContentId, actual: Option<ContentId> },

    #[error("{child} is reachable more than once (again under {parent})")]
    DuplicateChild { parent: ContentId, child: ContentId },

    #[error("session roots reach {reachable} of {total} stored nodes")]
    UnreachableNodes { reachable: usize, total: usize },
}

/// Walks the tree under `root` breadth-first and checks that every enumerated child points back
/// at the enumerating node and that no node is reached twice. Returns the number of visited nodes.
pub fn validate_symmetry<S: ContentStoreReader + ?Sized>(store: &S, root: ContentId) -> Result<usize, SymmetryError> {
    store.get_node(root)?;
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(parent) = queue.pop_front() {
        for &child in store.get_children(parent)?.iter() {
            let actual = store.get_parent(child)?;
            if actual != Some(parent) {
                return Err(SymmetryError::ChildParentMismatch { parent, child, actual });
            }
            if !seen.insert(child) {
                return Err(SymmetryError::DuplicateChild { parent, child });
            }
            queue.push_back(child);
        }
    }
    Ok(seen.len())
}

/// Runs [`validate_symmetry`] from every session root and additionally requires that every stored node is reachable
pub fn validate_store<S: ContentStoreReader + ?Sized>(store: &S) -> Result<usize, SymmetryError> {
    let mut reachable = 0;
    for root in store.sessions()?.into_iter().filter_map(|session| session.root) {
        reachable += validate_symmetry(store, root)?;
    }
    let total = store.count()?;
    if reachable != total {
        return Err(SymmetryError::UnreachableNodes { reachable, total });
    }
    Ok(reachable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::stores::MemoryContentStore, test_helpers::StoreBuilder};

    #[test]
    fn test_validate_symmetry() {
        let mut store = MemoryContentStore::new();
        StoreBuilder::new(&mut store).begin().add_root(1).add_node(2, 1).add_node(3, 1).add_node(4, 3).commit();
        StoreBuilder::new(&mut store).begin().add_root(5).add_node(6, 5).commit();

        assert_eq!(validate_symmetry(&store, ContentId::new(1)).unwrap(), 4);
        assert_eq!(validate_symmetry(&store, ContentId::new(3)).unwrap(), 2);
        assert_eq!(validate_store(&store).unwrap(), 6);
        assert!(matches!(validate_symmetry(&store, ContentId::new(9)), Err(SymmetryError::Store(ContentStoreError::NotFound(_)))));
    }

    #[test]
    fn test_open_session_is_covered() {
        let mut store = MemoryContentStore::new();
        StoreBuilder::new(&mut store).begin().add_root(1).add_node(2, 1);
        // The session root is recorded as soon as it is created
        assert_eq!(validate_store(&store).unwrap(), 2);
    }
}
