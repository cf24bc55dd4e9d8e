//!
//! Read-side queries over a content store, including the bottom-up ancestor chain
//! and the top-down leaf enumeration.
//!

use crate::{
    config::DEFAULT_MAX_CHAIN_LEN,
    model::{
        content::{ContentId, ContentIds, ContentNode},
        stores::{ContentStoreError, ContentStoreReader},
    },
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("content store error: {0}")]
    Store(#[from] ContentStoreError),

    #[error("chain starting at {start} exceeded {limit} links, a cycle is suspected")]
    CycleSuspected { start: ContentId, limit: usize },
}

impl NavigationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NavigationError::Store(err) if err.is_not_found())
    }
}

pub type NavigationResult<T> = std::result::Result<T, NavigationError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainOrder {
    /// `[id, parent(id), ..., root]`
    LeafToRoot,
    /// `[root, ..., parent(id), id]`
    RootToLeaf,
}

#[derive(Clone)]
pub struct Navigator<S: ContentStoreReader> {
    store: S,
    max_chain_len: usize,
}

impl<S: ContentStoreReader> Navigator<S> {
    pub fn new(store: S) -> Self {
        Self::with_max_chain_len(store, DEFAULT_MAX_CHAIN_LEN)
    }

    pub fn with_max_chain_len(store: S, max_chain_len: usize) -> Self {
        Self { store, max_chain_len }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_chain_len(&self) -> usize {
        self.max_chain_len
    }

    pub fn node(&self, id: ContentId) -> NavigationResult<ContentNode> {
        Ok(self.store.get_node(id)?)
    }

    pub fn parent(&self, id: ContentId) -> NavigationResult<Option<ContentId>> {
        Ok(self.store.get_parent(id)?)
    }

    pub fn children(&self, id: ContentId) -> NavigationResult<ContentIds> {
        Ok(self.store.get_children(id)?)
    }

    pub fn is_leaf(&self, id: ContentId) -> NavigationResult<bool> {
        Ok(self.children(id)?.is_empty())
    }

    /// Collects `id` and all of its ancestors by repeated parent lookups
    pub fn ancestor_chain(&self, id: ContentId, order: ChainOrder) -> NavigationResult<Vec<ContentId>> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current)? {
            if chain.len() >= self.max_chain_len {
                return Err(NavigationError::CycleSuspected { start: id, limit: self.max_chain_len });
            }
            chain.push(parent);
            current = parent;
        }
        if order == ChainOrder::RootToLeaf {
            chain.reverse();
        }
        Ok(chain)
    }

    /// Length of the ancestor chain of `id`, `id` included
    pub fn chain_len(&self, id: ContentId) -> NavigationResult<usize> {
        let mut len = 1;
        let mut current = id;
        while let Some(parent) = self.parent(current)? {
            if len >= self.max_chain_len {
                return Err(NavigationError::CycleSuspected { start: id, limit: self.max_chain_len });
            }
            len += 1;
            current = parent;
        }
        Ok(len)
    }

    pub fn root_of(&self, id: ContentId) -> NavigationResult<ContentId> {
        let chain = self.ancestor_chain(id, ChainOrder::LeafToRoot)?;
        Ok(*chain.last().unwrap_or(&id))
    }

    /// Leaves of the subtree under `root`, depth-first in child order
    pub fn leaves(&self, root: ContentId) -> Leaves<'_, S> {
        Leaves { navigator: self, stack: vec![(root, 1)], failed: false }
    }

    /// Depth-first walk of the subtree under `root`, calling `f` with the root-to-leaf path of every leaf.
    /// Returns the number of visited nodes.
    pub fn for_each_leaf_path<E, F>(&self, root: ContentId, mut f: F) -> Result<usize, E>
    where
        E: From<NavigationError>,
        F: FnMut(&[ContentId]) -> Result<(), E>,
    {
        let mut visited = 0;
        let mut path = Vec::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            if depth >= self.max_chain_len {
                return Err(NavigationError::CycleSuspected { start: root, limit: self.max_chain_len }.into());
            }
            path.truncate(depth);
            path.push(id);
            visited += 1;

            let children = self.children(id)?;
            if children.is_empty() {
                f(path.as_slice())?;
            } else {
                stack.extend(children.iter().rev().map(|&child| (child, depth + 1)));
            }
        }
        Ok(visited)
    }
}

pub struct Leaves<'a, S: ContentStoreReader> {
    navigator: &'a Navigator<S>,
    stack: Vec<(ContentId, usize)>,
    failed: bool,
}

impl<S: ContentStoreReader> Iterator for Leaves<'_, S> {
    type Item = NavigationResult<ContentId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while let Some((id, depth)) = self.stack.pop() {
            if depth > self.navigator.max_chain_len {
                self.failed = true;
                return Some(Err(NavigationError::CycleSuspected { start: id, limit: self.navigator.max_chain_len }));
            }
            match self.navigator.children(id) {
                Ok(children) if children.is_empty() => return Some(Ok(id)),
                Ok(children) => self.stack.extend(children.iter().rev().map(|&child| (child, depth + 1))),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}
