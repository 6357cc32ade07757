//! # Range engine (C9)
//!
//! Pages through a trie's leaves within a [`NodeTagRange`], stopping at an
//! RLP byte budget, and assembles the boundary proof (the non-leaf nodes on
//! the path to the page's first and last leaf) needed to validate the page
//! is exactly the trie's content in that interval.

use std::collections::HashSet;

use tracing::trace;

use super::config::TrieConfig;
use super::envelope::{nibbles_to_tag, path_to_nibbles, NodeTag, NodeTagRange};
use super::keys::Key;
use super::nearby::{hexary_nearby_left_bounded, hexary_nearby_right_bounded};
use super::nibbles::Nibbles;
use super::node::TrieNode;
use super::path::hexary_path_bounded;
use super::rlp::rlp_encode_list_items;
use super::store::TrieStore;
use super::TrieError;

/// One leaf in a range page.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RangeLeaf {
    /// The leaf's full path, as a NodeTag.
    pub tag: NodeTag,
    /// Its payload.
    pub payload: Vec<u8>,
}

/// A page of leaves plus a left/right boundary proof (§4.9).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RangeProof {
    /// NodeTag of the leaf immediately at-or-before the requested interval.
    pub base_tag: Option<NodeTag>,
    /// The returned leaves, strictly increasing by tag.
    pub leafs: Vec<RangeLeaf>,
    /// RLP wire-size of `leafs` as a `[key, blob]` list.
    pub leafs_size: usize,
    /// Non-leaf nodes proving the page's boundaries, deduplicated by key.
    pub proof_list: Vec<Key>,
    /// Summed RLP wire-size of `proof_list`'s node encodings.
    pub proof_size: usize,
}

/// Mirrors RLP length-prefix overhead for a blob of `blob_len` bytes (§4.9).
pub fn range_rlp_size(blob_len: usize) -> usize {
    if blob_len < 56 {
        blob_len + 1
    } else if blob_len < (1 << 8) {
        blob_len + 2
    } else if blob_len < (1 << 16) {
        blob_len + 3
    } else if blob_len < (1 << 24) {
        blob_len + 4
    } else {
        blob_len + 5
    }
}

/// Size of one `[key, blob]` pair plus the running outer-list size after
/// adding it, given `current_list_len` (sum of prior pairs' encoded sizes).
pub fn range_rlp_leaf_list_size(blob_len: usize, current_list_len: usize) -> (usize, usize) {
    let key_size = range_rlp_size(32);
    let blob_size = range_rlp_size(blob_len);
    let pair_payload = key_size + blob_size;
    let pair_size = range_rlp_size(pair_payload);
    let new_list_len = current_list_len + pair_size;
    (pair_size, range_rlp_size(new_list_len))
}

/// Produce a page of leaves in `iv`, sized to `byte_budget`, plus its
/// boundary proof (§4.9). `config.max_proof_depth` bounds every descent this
/// call makes (§4.5/§7); `byte_budget` is the caller's per-call override of
/// `config.range_byte_budget`.
pub fn range_leafs_proof(
    store: &TrieStore,
    root_key: Key,
    iv: NodeTagRange,
    byte_budget: usize,
    config: &TrieConfig,
) -> Result<RangeProof, TrieError> {
    let min_nibbles = super::envelope::tag_to_nibbles(iv.lo);
    let max_depth = config.max_proof_depth;

    let base_path = hexary_path_bounded(&min_nibbles, root_key, store, max_depth)?;
    let base_tag = hexary_nearby_left_bounded(&base_path, store, max_depth)
        .ok()
        .map(|p| nibbles_to_tag(&path_to_nibbles(&p)));

    let mut leafs = Vec::new();
    let mut running_size = 0usize;
    let mut cursor = min_nibbles;
    let mut last_leaf_path: Option<Nibbles> = None;
    let mut previous_tag: Option<NodeTag> = None;

    loop {
        let seed = hexary_path_bounded(&cursor, root_key, store, max_depth)?;
        let found = match hexary_nearby_right_bounded(&seed, store, max_depth) {
            Ok(p) => p,
            Err(TrieError::Failed) => break,
            Err(e) => return Err(e),
        };
        let leaf_path = path_to_nibbles(&found);
        let leaf_tag = nibbles_to_tag(&leaf_path);

        if leaf_tag > iv.hi {
            break;
        }
        if let Some(prev) = previous_tag {
            if leaf_tag <= prev && !leafs.is_empty() {
                return Err(TrieError::FailedNextNode);
            }
        }

        let payload = match found.last_node() {
            Some(TrieNode::Leaf { payload, .. }) => payload.clone(),
            _ => return Err(TrieError::LeafExpected),
        };

        let (_pair_size, projected_list_size) =
            range_rlp_leaf_list_size(payload.len(), running_size);
        if !leafs.is_empty() && projected_list_size >= byte_budget {
            break;
        }

        trace!(?leaf_tag, "range engine: emitting leaf");
        running_size = projected_list_size;
        leafs.push(RangeLeaf {
            tag: leaf_tag,
            payload,
        });
        last_leaf_path = Some(leaf_path.clone());
        previous_tag = Some(leaf_tag);

        cursor = super::envelope::tag_to_nibbles(leaf_tag + NodeTag::one());
    }

    let mut proof_keys: HashSet<Key> = HashSet::new();
    for step in &base_path.steps {
        if !matches!(step.node, TrieNode::Leaf { .. }) {
            proof_keys.insert(step.key);
        }
    }
    if let Some(last_path) = &last_leaf_path {
        let last_walk = hexary_path_bounded(last_path, root_key, store, max_depth)?;
        for step in &last_walk.steps {
            if !matches!(step.node, TrieNode::Leaf { .. }) {
                proof_keys.insert(step.key);
            }
        }
    }

    let mut proof_size = 0usize;
    let mut proof_list: Vec<Key> = proof_keys.into_iter().collect();
    proof_list.sort_by_key(|k| k.to_bytes33());
    for key in &proof_list {
        if let Ok(node) = store.get_node(key) {
            if let Some(encoded) = node.rlp_encode() {
                proof_size += range_rlp_size(encoded.len());
            }
        }
    }

    let leafs_items: Vec<Vec<u8>> = leafs
        .iter()
        .flat_map(|l| {
            let mut tag_bytes = [0u8; 32];
            l.tag.to_big_endian(&mut tag_bytes);
            vec![tag_bytes.to_vec(), l.payload.clone()]
        })
        .collect();
    let leafs_size = rlp_encode_list_items(&leafs_items).len();

    Ok(RangeProof {
        base_tag,
        leafs,
        leafs_size,
        proof_list,
        proof_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::nibbles::Nibbles as N;
    use crate::domain::store::NodeState;
    use primitive_types::U256;

    fn build_three_leaf_trie() -> (TrieStore, Key) {
        let mut store = TrieStore::new();
        let a = Key::Hash([1; 32]);
        let b = Key::Hash([2; 32]);
        let c = Key::Hash([3; 32]);
        store.put(a, TrieNode::Leaf { prefix: N::new(), payload: b"a".to_vec() }, NodeState::Static);
        store.put(b, TrieNode::Leaf { prefix: N::new(), payload: b"b".to_vec() }, NodeState::Static);
        store.put(c, TrieNode::Leaf { prefix: N::new(), payload: b"c".to_vec() }, NodeState::Static);
        let mut children: [Option<Key>; 16] = [None; 16];
        children[2] = Some(a);
        children[5] = Some(b);
        children[9] = Some(c);
        let root = Key::Hash([9; 32]);
        store.put(
            root,
            TrieNode::Branch {
                children: Box::new(children),
                legacy_data: None,
            },
            NodeState::Static,
        );
        (store, root)
    }

    #[test]
    fn range_returns_leaves_in_increasing_order() {
        let (store, root) = build_three_leaf_trie();
        let iv = NodeTagRange::new(U256::zero(), U256::max_value());
        let result = range_leafs_proof(&store, root, iv, 1 << 20, &TrieConfig::default()).unwrap();
        assert_eq!(result.leafs.len(), 3);
        assert!(result.leafs[0].tag < result.leafs[1].tag);
        assert!(result.leafs[1].tag < result.leafs[2].tag);
    }

    #[test]
    fn range_respects_byte_budget() {
        let (store, root) = build_three_leaf_trie();
        let iv = NodeTagRange::new(U256::zero(), U256::max_value());
        let result = range_leafs_proof(&store, root, iv, 1, &TrieConfig::default()).unwrap();
        assert!(result.leafs.len() <= 1);
    }

    #[test]
    fn range_rejects_descent_past_max_proof_depth() {
        let (store, root) = build_three_leaf_trie();
        let iv = NodeTagRange::new(U256::zero(), U256::max_value());
        let config = TrieConfig {
            max_proof_depth: 0,
            ..TrieConfig::default()
        };
        let err = range_leafs_proof(&store, root, iv, 1 << 20, &config).unwrap_err();
        assert!(matches!(err, TrieError::NestingTooDeep { max: 0, .. }));
    }

    #[test]
    fn rlp_size_matches_length_prefix_rules() {
        assert_eq!(range_rlp_size(10), 11);
        assert_eq!(range_rlp_size(55), 56);
        assert_eq!(range_rlp_size(56), 58);
        assert_eq!(range_rlp_size(300), 303);
    }
}
