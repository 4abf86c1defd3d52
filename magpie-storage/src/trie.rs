//! Copy-on-write persistent trie.
//!
//! Every mutation returns a new trie sharing all untouched subtrees
//! with the old one, so a clone is an O(1) immutable snapshot. The
//! catalog uses this for its name map; snapshots of the namespace cost
//! one pointer copy.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

type DynValue = Arc<dyn Any + Send + Sync>;

struct TrieNode {
    children: BTreeMap<char, Arc<TrieNode>>,
    value: Option<DynValue>,
}

impl TrieNode {
    #[inline]
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.value.is_none()
    }
}

/// An immutable prefix tree. `Clone` is a snapshot.
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    #[inline]
    pub fn new() -> Self {
        Trie { root: None }
    }

    /// Returns the value stored under `key`, if a value-bearing
    /// terminal exists there and its stored type matches `T`.
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        for c in key.chars() {
            node = node.children.get(&c)?;
        }
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// Returns a new trie with `value` stored under `key`. The path
    /// from root to terminal is freshly cloned, untouched subtrees are
    /// shared, and an existing value under `key` is replaced.
    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) -> Trie {
        let chars: Vec<char> = key.chars().collect();
        let root = put_rec(self.root.as_ref(), &chars, Arc::new(value));
        Trie { root: Some(root) }
    }

    /// Returns a new trie with the value under `key` cleared. Nodes
    /// left with no value and no children are pruned bottom-up. Removal
    /// of an absent key returns an equivalent trie.
    pub fn remove(&self, key: &str) -> Trie {
        let Some(root) = self.root.as_ref() else {
            return Trie::new();
        };
        let chars: Vec<char> = key.chars().collect();
        match remove_rec(root, &chars) {
            RemoveResult::NotFound => self.clone(),
            RemoveResult::Removed(root) => Trie { root },
        }
    }
}

fn put_rec(node: Option<&Arc<TrieNode>>, key: &[char], value: DynValue) -> Arc<TrieNode> {
    match key.split_first() {
        None => Arc::new(TrieNode {
            // The terminal keeps its existing children.
            children: node.map(|n| n.children.clone()).unwrap_or_default(),
            value: Some(value),
        }),
        Some((&c, rest)) => {
            let child = node.and_then(|n| n.children.get(&c));
            let new_child = put_rec(child, rest, value);
            let mut children = node.map(|n| n.children.clone()).unwrap_or_default();
            children.insert(c, new_child);
            Arc::new(TrieNode {
                children,
                value: node.and_then(|n| n.value.clone()),
            })
        }
    }
}

enum RemoveResult {
    /// Key absent or terminal has no value: nothing to do.
    NotFound,
    /// New subtree, `None` when the node became empty and is dropped.
    Removed(Option<Arc<TrieNode>>),
}

fn remove_rec(node: &Arc<TrieNode>, key: &[char]) -> RemoveResult {
    match key.split_first() {
        None => {
            if node.value.is_none() {
                return RemoveResult::NotFound;
            }
            if node.children.is_empty() {
                return RemoveResult::Removed(None);
            }
            RemoveResult::Removed(Some(Arc::new(TrieNode {
                children: node.children.clone(),
                value: None,
            })))
        }
        Some((&c, rest)) => {
            let Some(child) = node.children.get(&c) else {
                return RemoveResult::NotFound;
            };
            match remove_rec(child, rest) {
                RemoveResult::NotFound => RemoveResult::NotFound,
                RemoveResult::Removed(new_child) => {
                    let mut children = node.children.clone();
                    match new_child {
                        Some(new_child) => {
                            children.insert(c, new_child);
                        }
                        None => {
                            children.remove(&c);
                        }
                    }
                    let new_node = TrieNode {
                        children,
                        value: node.value.clone(),
                    };
                    if new_node.is_empty() {
                        RemoveResult::Removed(None)
                    } else {
                        RemoveResult::Removed(Some(Arc::new(new_node)))
                    }
                }
            }
        }
    }
}
