//! # Key spaces
//!
//! Two key spaces coexist in the trie store (§3 of the owning spec):
//!
//! - [`NodeKey`]: 32 bytes, the keccak-256 hash of a finalized node's RLP
//!   encoding, also read as a 256-bit ordinal (a `NodeTag`) over leaf-path
//!   space.
//! - A provisional key: not yet hashed, identified only by a monotonically
//!   increasing 64-bit id minted while a trie is under interpolation.
//!
//! These are modeled as a sum type rather than two separate maps, per the
//! design notes: `Key::Hash` carries a real `NodeKey`, `Key::Provisional`
//! carries the fresh id. The 33-byte wire form (tag byte + 32-byte payload)
//! is only a serialization detail, produced by [`Key::to_bytes33`] /
//! [`Key::from_bytes33`] for callers that need to persist or transmit a key.

/// 32-byte keccak-256 hash of a finalized node's RLP encoding.
///
/// Doubles as a `NodeTag`: a 256-bit ordinal over the leaf-path space, used
/// by the envelope algebra (§4.7).
pub type NodeKey = [u8; 32];

/// A store key: either a finalized hash key, or a provisional id minted
/// during interpolation before the node's final encoding is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Key {
    /// A finalized node, keyed by the keccak-256 hash of its RLP encoding.
    Hash(NodeKey),
    /// A provisional node, keyed only by a fresh monotonic id.
    Provisional(u64),
}

impl Key {
    /// True iff this is a finalized hash key (Static/Locked node per §3).
    pub fn is_node_key(&self) -> bool {
        matches!(self, Key::Hash(_))
    }

    /// True iff this is a not-yet-hashed provisional key.
    pub fn is_provisional(&self) -> bool {
        matches!(self, Key::Provisional(_))
    }

    /// The underlying `NodeKey`, if this is a hash key.
    pub fn as_node_key(&self) -> Option<NodeKey> {
        match self {
            Key::Hash(h) => Some(*h),
            Key::Provisional(_) => None,
        }
    }

    /// Encode to the 33-byte wire form: tag byte `0` followed by the 32-byte
    /// hash for [`Key::Hash`]; tag byte `0xFF` followed by 24 zero bytes and
    /// the big-endian id (in the last 8 bytes, "for legibility" per §4.3) for
    /// [`Key::Provisional`].
    pub fn to_bytes33(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        match self {
            Key::Hash(hash) => {
                out[0] = 0;
                out[1..33].copy_from_slice(hash);
            }
            Key::Provisional(id) => {
                out[0] = 0xFF;
                out[25..33].copy_from_slice(&id.to_be_bytes());
            }
        }
        out
    }

    /// Decode from the 33-byte wire form.
    pub fn from_bytes33(bytes: &[u8; 33]) -> Self {
        if bytes[0] == 0 {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&bytes[1..33]);
            Key::Hash(hash)
        } else {
            let mut id_bytes = [0u8; 8];
            id_bytes.copy_from_slice(&bytes[25..33]);
            Key::Provisional(u64::from_be_bytes(id_bytes))
        }
    }
}

impl std::fmt::Display for Key {
    /// Renders a hash key as `0x`-prefixed hex and a provisional key as
    /// `prov:<id>`, matching the `0x`-hex convention the adapter/API layers
    /// of the owning codebase use for hashes in logs and responses.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Hash(hash) => write!(f, "0x{}", hex::encode(hash)),
            Key::Provisional(id) => write!(f, "prov:{id}"),
        }
    }
}

/// Mints fresh, strictly increasing provisional keys.
///
/// One instance lives per in-memory [`crate::domain::store::TrieStore`]; each
/// call to [`IdGenerator::fresh`] is guaranteed to return a key never handed
/// out before by this generator.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    /// A fresh generator starting at id 0.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Mint the next provisional key.
    pub fn fresh(&mut self) -> Key {
        let id = self.next;
        self.next += 1;
        Key::Provisional(id)
    }
}
