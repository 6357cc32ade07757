//! In-memory [`PersistentBackend`] for tests and callers without a real KV
//! store, grounded on the teacher's `InMemoryTrieDb`.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::TrieError;
use crate::ports::PersistentBackend;

/// In-memory implementation of [`PersistentBackend`].
pub struct MemoryBackend {
    nodes: RwLock<HashMap<[u8; 32], Vec<u8>>>,
}

impl MemoryBackend {
    /// An empty backend.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentBackend for MemoryBackend {
    fn get(&self, key: &[u8; 32]) -> Result<Option<Vec<u8>>, TrieError> {
        let nodes = self.nodes.read().map_err(|_| TrieError::NodeNotFound)?;
        Ok(nodes.get(key).cloned())
    }

    fn put(&self, key: [u8; 32], value: Vec<u8>) -> Result<(), TrieError> {
        let mut nodes = self.nodes.write().map_err(|_| TrieError::NodeNotFound)?;
        nodes.insert(key, value);
        Ok(())
    }

    fn bulk_ingest(&self, sorted_pairs: Vec<([u8; 32], Vec<u8>)>) -> Result<(), TrieError> {
        let mut nodes = self.nodes.write().map_err(|_| TrieError::NodeNotFound)?;
        for (key, value) in sorted_pairs {
            nodes.insert(key, value);
        }
        Ok(())
    }
}
