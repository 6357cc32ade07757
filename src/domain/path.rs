//! # Path resolver (C4)
//!
//! Walks as far as possible down a trie from a root, following a nibble
//! sequence, and reports both what was resolved and what was left over.

use super::keys::Key;
use super::nibbles::Nibbles;
use super::node::TrieNode;
use super::store::TrieStore;
use super::TrieError;

/// One step taken while resolving a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathStep {
    /// The key of the node visited at this step.
    pub key: Key,
    /// The node visited at this step.
    pub node: TrieNode,
    /// The branch child index selected here, or `-1` if this step is not a
    /// branch selection (Extension/Leaf steps, or a Branch with empty tail).
    pub nibble: i8,
}

/// The result of a path walk: the steps taken plus whatever nibbles could
/// not be consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    /// Key of the trie root the walk started from.
    pub root_key: Key,
    /// Steps taken, in descent order.
    pub steps: Vec<PathStep>,
    /// Nibbles that remain unconsumed.
    pub tail: Nibbles,
    /// If the walk stopped because a child link pointed at a key absent
    /// from the store, that key — the caller's "fetch this next" hint.
    pub dangling: Option<Key>,
}

impl Path {
    /// True iff every nibble of the original request was consumed.
    pub fn is_complete(&self) -> bool {
        self.tail.is_empty()
    }

    /// The key of the last node visited, if any step was taken.
    pub fn last_key(&self) -> Option<Key> {
        self.steps.last().map(|s| s.key)
    }

    /// The node last visited, if any step was taken.
    pub fn last_node(&self) -> Option<&TrieNode> {
        self.steps.last().map(|s| &s.node)
    }
}

/// Walk from `root_key`, consuming nibbles of `start` as deeply as the
/// current trie content allows (§4.4).
pub fn hexary_path(start: &Nibbles, root_key: Key, store: &TrieStore) -> Path {
    let mut steps = Vec::new();
    let mut current_key = root_key;
    let mut tail = start.clone();
    let mut dangling = None;

    loop {
        let node = match store.get_node(&current_key) {
            Ok(node) => node,
            Err(_) => {
                dangling = Some(current_key);
                break;
            }
        };

        match node {
            TrieNode::Branch { children, .. } => {
                if tail.is_empty() {
                    steps.push(PathStep {
                        key: current_key,
                        node: node.clone(),
                        nibble: -1,
                    });
                    break;
                }
                let nibble = tail.at(0);
                steps.push(PathStep {
                    key: current_key,
                    node: node.clone(),
                    nibble: nibble as i8,
                });
                match children[nibble as usize] {
                    None => break,
                    Some(child_key) => {
                        if !store.contains(&child_key) {
                            dangling = Some(child_key);
                            break;
                        }
                        tail = tail.slice(1);
                        current_key = child_key;
                    }
                }
            }

            TrieNode::Extension { prefix, child } => {
                if tail.starts_with(prefix) {
                    steps.push(PathStep {
                        key: current_key,
                        node: node.clone(),
                        nibble: -1,
                    });
                    tail = tail.slice(prefix.len());
                    let child_key = *child;
                    if !store.contains(&child_key) {
                        dangling = Some(child_key);
                        break;
                    }
                    current_key = child_key;
                } else {
                    steps.push(PathStep {
                        key: current_key,
                        node: node.clone(),
                        nibble: -1,
                    });
                    break;
                }
            }

            TrieNode::Leaf { prefix, .. } => {
                steps.push(PathStep {
                    key: current_key,
                    node: node.clone(),
                    nibble: -1,
                });
                if tail.0 == prefix.0 {
                    tail = Nibbles::new();
                }
                break;
            }
        }
    }

    Path {
        root_key,
        steps,
        tail,
        dangling,
    }
}

/// As [`hexary_path`], but rejects a walk that reaches more than
/// `max_proof_depth` steps (`TrieConfig::max_proof_depth`, §4.5/§7) — the
/// anti-DoS cap on how deep an untrusted proof chain is allowed to nest.
pub fn hexary_path_bounded(
    start: &Nibbles,
    root_key: Key,
    store: &TrieStore,
    max_proof_depth: usize,
) -> Result<Path, TrieError> {
    let path = hexary_path(start, root_key, store);
    if path.steps.len() > max_proof_depth {
        return Err(TrieError::NestingTooDeep {
            max: max_proof_depth,
            reached: path.steps.len(),
        });
    }
    Ok(path)
}

/// Convenience over [`hexary_path`]: the key of the node exactly addressed
/// by `start` (when the tail is fully consumed), and/or a dangling child's
/// key worth fetching next.
pub fn hexary_path_node_key(
    start: &Nibbles,
    root_key: Key,
    store: &TrieStore,
) -> (Option<Key>, Option<Key>) {
    let path = hexary_path(start, root_key, store);
    let resolved = if path.is_complete() {
        path.last_key()
    } else {
        None
    };
    (resolved, path.dangling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::NodeState;

    #[test]
    fn single_leaf_round_trip_resolves_with_empty_tail() {
        let mut store = TrieStore::new();
        let leaf_key = Key::Hash([1; 32]);
        store.put(
            leaf_key,
            TrieNode::Leaf {
                prefix: Nibbles(vec![6, 4, 6, 0xf]),
                payload: b"verb".to_vec(),
            },
            NodeState::Static,
        );
        let path = hexary_path(&Nibbles(vec![6, 4, 6, 0xf]), leaf_key, &store);
        assert_eq!(path.steps.len(), 1);
        assert!(path.is_complete());
    }

    #[test]
    fn leaf_mismatch_leaves_tail_intact() {
        let mut store = TrieStore::new();
        let leaf_key = Key::Hash([1; 32]);
        store.put(
            leaf_key,
            TrieNode::Leaf {
                prefix: Nibbles(vec![6, 4, 6, 0xf]),
                payload: b"verb".to_vec(),
            },
            NodeState::Static,
        );
        let path = hexary_path(&Nibbles(vec![6, 4, 6, 0xe]), leaf_key, &store);
        assert!(!path.is_complete());
        assert_eq!(path.tail.0, vec![6, 4, 6, 0xe]);
    }

    #[test]
    fn branch_walk_stops_at_empty_slot() {
        let mut store = TrieStore::new();
        let mut children: [Option<Key>; 16] = [None; 16];
        let leaf_key = Key::Hash([2; 32]);
        children[6] = Some(leaf_key);
        let branch_key = Key::Hash([1; 32]);
        store.put(
            branch_key,
            TrieNode::Branch {
                children: Box::new(children),
                legacy_data: None,
            },
            NodeState::Static,
        );
        store.put(
            leaf_key,
            TrieNode::Leaf {
                prefix: Nibbles::new(),
                payload: b"x".to_vec(),
            },
            NodeState::Static,
        );
        let path = hexary_path(&Nibbles(vec![7]), branch_key, &store);
        assert_eq!(path.steps.len(), 1);
        assert_eq!(path.tail.0, vec![7]);
    }

    #[test]
    fn dangling_child_is_reported() {
        let mut store = TrieStore::new();
        let mut children: [Option<Key>; 16] = [None; 16];
        let missing_key = Key::Hash([9; 32]);
        children[6] = Some(missing_key);
        let branch_key = Key::Hash([1; 32]);
        store.put(
            branch_key,
            TrieNode::Branch {
                children: Box::new(children),
                legacy_data: None,
            },
            NodeState::Static,
        );
        let path = hexary_path(&Nibbles(vec![6, 0]), branch_key, &store);
        assert_eq!(path.dangling, Some(missing_key));
    }

    #[test]
    fn bounded_walk_rejects_excess_depth() {
        let mut store = TrieStore::new();
        let leaf_key = Key::Hash([1; 32]);
        store.put(
            leaf_key,
            TrieNode::Leaf {
                prefix: Nibbles(vec![6, 4]),
                payload: b"verb".to_vec(),
            },
            NodeState::Static,
        );
        let err = hexary_path_bounded(&Nibbles(vec![6, 4]), leaf_key, &store, 0).unwrap_err();
        assert_eq!(
            err,
            TrieError::NestingTooDeep {
                max: 0,
                reached: 1
            }
        );
        assert!(hexary_path_bounded(&Nibbles(vec![6, 4]), leaf_key, &store, 1).is_ok());
    }
}
