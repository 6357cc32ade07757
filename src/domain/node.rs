//! # Trie node shapes and their RLP codec (C2)
//!
//! Three node kinds, as a tagged sum type — no virtual dispatch. A Branch's
//! 16-way child array is a fixed-size array; the legacy 17th "data" slot is
//! preserved only for wire compatibility (§4.2/§9) and is never read by any
//! algorithm in this crate.

use super::keys::Key;
use super::nibbles::Nibbles;
use super::rlp;
use super::TrieError;

/// A trie node: Branch, Extension, or Leaf (§3). There is no `Empty`
/// variant — an absent child is represented by `None` in a branch's array or
/// by the key simply not existing in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// 16-way branch. `children[i]` is the link taken on nibble `i`.
    Branch {
        /// One link per nibble value; `None` means no child on that branch.
        children: Box<[Option<Key>; 16]>,
        /// Legacy 17th RLP slot. Unused by the Ethereum secure-trie
        /// specialization this crate targets; carried through the codec
        /// untouched so re-encoding a decoded node is lossless.
        legacy_data: Option<Vec<u8>>,
    },
    /// Shared-prefix optimization: one path segment, one child.
    Extension {
        /// The shared nibble prefix.
        prefix: Nibbles,
        /// The single child this extension leads to.
        child: Key,
    },
    /// Terminal node: the rest of the path plus its payload.
    Leaf {
        /// The remaining path nibbles from this node to the leaf value.
        prefix: Nibbles,
        /// Opaque payload bytes (an empty payload is an administrative
        /// marker per §3, carrying no leaf content).
        payload: Vec<u8>,
    },
}

impl TrieNode {
    /// RLP-encode this node, per §6's wire format.
    ///
    /// Returns `None` ("encoding-failure", §4.2) if any child link is still
    /// a provisional key — the caller should treat that as "cannot finalize
    /// yet", not as a hard error.
    pub fn rlp_encode(&self) -> Option<Vec<u8>> {
        match self {
            TrieNode::Leaf { prefix, payload } => {
                let encoded_prefix = prefix.encode_hex_prefix(true);
                Some(rlp::rlp_encode_list_items(&[encoded_prefix, payload.clone()]))
            }

            TrieNode::Extension { prefix, child } => {
                let hash = child.as_node_key()?;
                let encoded_prefix = prefix.encode_hex_prefix(false);
                Some(rlp::rlp_encode_list_items(&[
                    encoded_prefix,
                    hash.to_vec(),
                ]))
            }

            TrieNode::Branch {
                children,
                legacy_data,
            } => {
                let mut items: Vec<Vec<u8>> = Vec::with_capacity(17);
                for child in children.iter() {
                    match child {
                        None => items.push(Vec::new()),
                        Some(key) => items.push(key.as_node_key()?.to_vec()),
                    }
                }
                items.push(legacy_data.clone().unwrap_or_default());
                Some(rlp::rlp_encode_list_items(&items))
            }
        }
    }

    /// Decode an RLP-encoded node. Length-17 lists are branches, length-2
    /// lists are leaf-or-extension (disambiguated by the compact prefix's
    /// leaf flag); anything else is [`TrieError::GarbledNode`] (§4.2).
    pub fn rlp_decode(data: &[u8]) -> Result<Self, TrieError> {
        let list = rlp::decode_list(data)?;
        match list.items.len() {
            17 => {
                let mut children: [Option<Key>; 16] = [None; 16];
                for (i, item) in list.items[..16].iter().enumerate() {
                    if !item.is_empty() {
                        if item.len() != 32 {
                            return Err(TrieError::GarbledNode);
                        }
                        let mut hash = [0u8; 32];
                        hash.copy_from_slice(item);
                        children[i] = Some(Key::Hash(hash));
                    }
                }
                let legacy = &list.items[16];
                let legacy_data = if legacy.is_empty() {
                    None
                } else {
                    Some(legacy.clone())
                };
                Ok(TrieNode::Branch {
                    children: Box::new(children),
                    legacy_data,
                })
            }
            2 => {
                let (nibbles, is_leaf) = Nibbles::decode_hex_prefix(&list.items[0]);
                if is_leaf {
                    Ok(TrieNode::Leaf {
                        prefix: nibbles,
                        payload: list.items[1].clone(),
                    })
                } else {
                    if list.items[1].len() != 32 {
                        return Err(TrieError::GarbledNode);
                    }
                    let mut hash = [0u8; 32];
                    hash.copy_from_slice(&list.items[1]);
                    Ok(TrieNode::Extension {
                        prefix: nibbles,
                        child: Key::Hash(hash),
                    })
                }
            }
            _ => Err(TrieError::GarbledNode),
        }
    }

    /// Child key reached by following `nibble` from this node, if any.
    /// Extension nodes ignore `nibble` and always return their single child.
    pub fn child_at(&self, nibble: i8) -> Option<Key> {
        match self {
            TrieNode::Branch { children, .. } => {
                if nibble < 0 {
                    None
                } else {
                    children[nibble as usize]
                }
            }
            TrieNode::Extension { child, .. } => Some(*child),
            TrieNode::Leaf { .. } => None,
        }
    }
}
