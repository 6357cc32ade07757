//! # In-memory trie store (C3)
//!
//! Maps a [`Key`] (hash or provisional) to a [`NodeRecord`], and owns the
//! [`IdGenerator`] that mints fresh provisional keys. Backed by a plain
//! `HashMap` — every operation the design calls out (`get`/`put`/`contains`/
//! `delete`/`iter`) is `O(1)` amortized for free.

use std::collections::HashMap;

use super::keys::{IdGenerator, Key};
use super::node::TrieNode;
use super::TrieError;

/// Lifecycle state of an in-memory node (§3).
///
/// Only `Mutable` and `TmpRoot` nodes may be rewritten in place; `Static` and
/// `Locked` are immutable and their key equals the keccak-256 hash of their
/// encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Inserted from an authoritative proof.
    Static,
    /// Inserted on the fly but already verified by hash.
    Locked,
    /// Pending interpolation; may still be rewritten.
    Mutable,
    /// A mutable root placeholder.
    TmpRoot,
}

impl NodeState {
    /// Static/Locked nodes are immutable and hash-keyed; Mutable/TmpRoot are not.
    pub fn is_finalized(&self) -> bool {
        matches!(self, NodeState::Static | NodeState::Locked)
    }
}

/// A stored node plus its lifecycle state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    /// The node's parsed shape.
    pub node: TrieNode,
    /// Its current lifecycle state.
    pub state: NodeState,
}

/// The in-memory key → node-record mapping (C3).
#[derive(Debug, Default)]
pub struct TrieStore {
    records: HashMap<Key, NodeRecord>,
    ids: IdGenerator,
}

impl TrieStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            ids: IdGenerator::new(),
        }
    }

    /// Fetch the record at `key`.
    pub fn get(&self, key: &Key) -> Result<&NodeRecord, TrieError> {
        self.records.get(key).ok_or(TrieError::NodeNotFound)
    }

    /// Fetch just the node shape at `key`.
    pub fn get_node(&self, key: &Key) -> Result<&TrieNode, TrieError> {
        self.get(key).map(|r| &r.node)
    }

    /// Insert or overwrite the record at `key`.
    pub fn put(&mut self, key: Key, node: TrieNode, state: NodeState) {
        self.records.insert(key, NodeRecord { node, state });
    }

    /// Does this key have a record?
    pub fn contains(&self, key: &Key) -> bool {
        self.records.contains_key(key)
    }

    /// Remove the record at `key`, returning it if present.
    pub fn delete(&mut self, key: &Key) -> Option<NodeRecord> {
        self.records.remove(key)
    }

    /// Iterate over all `(key, record)` pairs. No ordering guarantee.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &NodeRecord)> {
        self.records.iter()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True iff the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mint a fresh, never-before-issued provisional key.
    pub fn fresh_key(&mut self) -> Key {
        self.ids.fresh()
    }

    /// True iff every record in the store is Static/Locked and hash-keyed —
    /// the invariant a commit to the persistent backend must observe (§3).
    pub fn is_fully_finalized(&self) -> bool {
        self.records
            .iter()
            .all(|(key, record)| key.is_node_key() && record.state.is_finalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::nibbles::Nibbles;

    fn sample_leaf() -> TrieNode {
        TrieNode::Leaf {
            prefix: Nibbles(vec![1, 2]),
            payload: b"x".to_vec(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut store = TrieStore::new();
        let key = Key::Hash([7; 32]);
        store.put(key, sample_leaf(), NodeState::Static);
        assert_eq!(store.get_node(&key).unwrap(), &sample_leaf());
    }

    #[test]
    fn missing_key_is_not_found() {
        let store = TrieStore::new();
        assert_eq!(
            store.get(&Key::Hash([0; 32])).unwrap_err(),
            TrieError::NodeNotFound
        );
    }

    #[test]
    fn fresh_keys_are_unique_and_provisional() {
        let mut store = TrieStore::new();
        let a = store.fresh_key();
        let b = store.fresh_key();
        assert_ne!(a, b);
        assert!(a.is_provisional() && b.is_provisional());
    }

    #[test]
    fn delete_removes_record() {
        let mut store = TrieStore::new();
        let key = Key::Hash([1; 32]);
        store.put(key, sample_leaf(), NodeState::Locked);
        assert!(store.delete(&key).is_some());
        assert!(!store.contains(&key));
    }

    #[test]
    fn finalized_check_rejects_provisional_residue() {
        let mut store = TrieStore::new();
        store.put(Key::Hash([2; 32]), sample_leaf(), NodeState::Locked);
        assert!(store.is_fully_finalized());
        let fresh = store.fresh_key();
        store.put(fresh, sample_leaf(), NodeState::Mutable);
        assert!(!store.is_fully_finalized());
    }
}
