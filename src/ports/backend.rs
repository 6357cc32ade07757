//! # Persistent backend port (C10)
//!
//! A hash-keyed KV contract the core can sit on top of without owning a
//! real database. Separate key-space prefixes (accounts trie, per-account
//! storage tries, and the state-root registry) are the caller's concern;
//! the exact prefix byte values come from whatever external database crate
//! the caller wires in (§4.10 Open Question).

use crate::domain::rlp;
use crate::domain::{TrieError, TrieStore};

/// A hash-keyed persistent store for RLP-encoded trie nodes.
///
/// `get`/`put` are the two function contracts named in §4.10. `bulk_ingest`
/// is optional; its default implementation falls back to repeated `put`
/// calls, so implementors only override it when they have an SST-style
/// ingest path worth using.
pub trait PersistentBackend: Send + Sync {
    /// Fetch the RLP encoding stored under `key`, or `None` if absent.
    fn get(&self, key: &[u8; 32]) -> Result<Option<Vec<u8>>, TrieError>;

    /// Store `value` under `key`. Callers MUST ensure `key == keccak256(value)`.
    fn put(&self, key: [u8; 32], value: Vec<u8>) -> Result<(), TrieError>;

    /// Write a batch of hash-keyed nodes, sorted by key and containing no
    /// provisional keys. Default falls back to sequential `put`.
    fn bulk_ingest(&self, sorted_pairs: Vec<([u8; 32], Vec<u8>)>) -> Result<(), TrieError> {
        for (key, value) in sorted_pairs {
            self.put(key, value)?;
        }
        Ok(())
    }
}

/// Commit every record in `store` to `backend` as one bulk-ingest batch.
///
/// Refuses the whole batch if any key is still provisional — per §3, "a
/// commit to the persistent backend MUST refuse to write any provisional
/// key; this is a fatal invariant breach." Callers run this only after
/// [`crate::domain::interpolate_finalize`] has reported success, so this is
/// a last-line check, not the primary enforcement point.
pub fn commit_store(store: &TrieStore, backend: &dyn PersistentBackend) -> Result<(), TrieError> {
    let mut pairs = Vec::with_capacity(store.len());
    for (key, record) in store.iter() {
        let hash = key.as_node_key().ok_or(TrieError::UnresolvedRepairNode)?;
        let encoded = record.node.rlp_encode().ok_or(TrieError::RlpEncoding)?;
        pairs.push((hash, encoded));
    }
    pairs.sort_by_key(|a| a.0);
    backend.bulk_ingest(pairs)
}

/// The "zero" key under which the state-root registry's head pointer lives.
pub const STATE_ROOT_REGISTRY_HEAD: [u8; 32] = [0u8; 32];

/// One entry in the state-root registry's singly-linked chain: a saved
/// root, a pointer to its predecessor, and an opaque progress payload
/// (e.g. pivot header plus accumulated counters).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StateRootEntry {
    /// The trie root this entry records.
    pub root: [u8; 32],
    /// The previous entry's root, or `None` if this is the chain's origin.
    pub predecessor: Option<[u8; 32]>,
    /// Caller-defined payload (pivot header, progress counters, ...).
    pub payload: Vec<u8>,
}

impl StateRootEntry {
    /// RLP-encodes as `[predecessor_key_32, payload_bytes]` (§6). A missing
    /// predecessor (the chain's origin) is recorded as the all-zero key.
    fn encode(&self) -> Vec<u8> {
        let predecessor = self.predecessor.unwrap_or([0u8; 32]);
        rlp::rlp_encode_list_items(&[predecessor.to_vec(), self.payload.clone()])
    }

    fn decode(root: [u8; 32], bytes: &[u8]) -> Result<Self, TrieError> {
        let list = rlp::decode_list(bytes)?;
        let [pred_item, payload] = <[Vec<u8>; 2]>::try_from(list.items)
            .map_err(|_| TrieError::GarbledNode)?;
        let mut pred_bytes = [0u8; 32];
        match pred_item.len() {
            0 => {}
            32 => pred_bytes.copy_from_slice(&pred_item),
            _ => return Err(TrieError::GarbledNode),
        }
        let predecessor = if pred_bytes == [0u8; 32] { None } else { Some(pred_bytes) };
        Ok(StateRootEntry {
            root,
            predecessor,
            payload,
        })
    }
}

/// Push `entry` onto the registry's chain, making it the new head. The head
/// pointer is itself an RLP-encoded registry record (§6), stored under
/// [`STATE_ROOT_REGISTRY_HEAD`) whose `predecessor_key` carries the chain's
/// current head root.
pub fn state_root_registry_push(
    backend: &dyn PersistentBackend,
    entry: StateRootEntry,
) -> Result<(), TrieError> {
    backend.put(entry.root, entry.encode())?;
    let head_pointer = StateRootEntry {
        root: STATE_ROOT_REGISTRY_HEAD,
        predecessor: Some(entry.root),
        payload: Vec::new(),
    };
    backend.put(STATE_ROOT_REGISTRY_HEAD, head_pointer.encode())?;
    Ok(())
}

/// Read the most recently pushed entry, if any.
pub fn state_root_registry_head(
    backend: &dyn PersistentBackend,
) -> Result<Option<StateRootEntry>, TrieError> {
    let head_bytes = match backend.get(&STATE_ROOT_REGISTRY_HEAD)? {
        Some(b) => b,
        None => return Ok(None),
    };
    let head_pointer = StateRootEntry::decode(STATE_ROOT_REGISTRY_HEAD, &head_bytes)?;
    let root = match head_pointer.predecessor {
        Some(root) => root,
        None => return Ok(None),
    };
    state_root_registry_get(backend, &root)
}

/// Read a specific registry entry by its root.
pub fn state_root_registry_get(
    backend: &dyn PersistentBackend,
    root: &[u8; 32],
) -> Result<Option<StateRootEntry>, TrieError> {
    match backend.get(root)? {
        Some(bytes) => Ok(Some(StateRootEntry::decode(*root, &bytes)?)),
        None => Ok(None),
    }
}
