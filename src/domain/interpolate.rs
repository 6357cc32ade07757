//! # Interpolator (C8)
//!
//! Given a proof-seeded store and a sorted list of leaves, Phase A inserts
//! (splitting branches/extensions as needed) and Phase B walks the new
//! material bottom-up, replacing provisional keys with hash keys until only
//! Static/Locked nodes remain.

use tracing::{debug, trace};

use super::config::TrieConfig;
use super::keys::Key;
use super::nibbles::Nibbles;
use super::node::TrieNode;
use super::path::hexary_path_bounded;
use super::store::{NodeState, TrieStore};
use super::TrieError;

/// One leaf to realize in the trie (§3).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LeafSpec {
    /// The leaf's full 64-nibble path.
    pub path_tag: Nibbles,
    /// A node key the leaf was already known under, if any.
    pub node_key: Option<Key>,
    /// Opaque leaf payload; empty denotes an administrative marker (§3).
    pub payload: Vec<u8>,
}

/// Insert every leaf in `leaves` (sorted strictly by `path_tag`) into `store`
/// beneath `root_key`, splitting/creating nodes as needed (Phase A, §4.8).
///
/// Returns the (possibly new) root key — insertion may replace a Leaf or
/// Extension root with a fresh provisional Branch.
pub fn interpolate_insert(
    store: &mut TrieStore,
    mut root_key: Key,
    leaves: &[LeafSpec],
    config: &TrieConfig,
) -> Result<Key, TrieError> {
    for leaf in leaves {
        trace!(path = ?leaf.path_tag.0, "interpolate: inserting leaf");
        root_key = insert_one(store, root_key, &leaf.path_tag, leaf.payload.clone(), config)?;
    }
    Ok(root_key)
}

/// If `old_key` anchors a still-unfinalized hash-typed position — content
/// filled in earlier this batch to materialize a Static ancestor's recorded
/// but previously-dangling child link — move `fresh_key`'s just-written node
/// back under `old_key` so Phase B keeps comparing the recomputed hash
/// against the link that ancestor already committed to. Otherwise `old_key`
/// was either genuine finalized content (a true divergence, minting fresh is
/// correct) or an ordinary provisional node, and `fresh_key` stands as-is.
fn relocate_if_dangling_anchor(
    store: &mut TrieStore,
    old_key: Key,
    old_state: NodeState,
    fresh_key: Key,
) -> Key {
    if fresh_key == old_key || !(old_key.is_node_key() && old_state == NodeState::Mutable) {
        return fresh_key;
    }
    let node = store.get_node(&fresh_key).expect("just written").clone();
    store.delete(&fresh_key);
    store.put(old_key, node, NodeState::Mutable);
    old_key
}

fn insert_one(
    store: &mut TrieStore,
    root_key: Key,
    path_tag: &Nibbles,
    payload: Vec<u8>,
    config: &TrieConfig,
) -> Result<Key, TrieError> {
    let path = hexary_path_bounded(path_tag, root_key, store, config.max_proof_depth)?;
    if path.is_complete() {
        // Leaf already present with this exact path; overwrite its payload.
        if let (Some(key), Some(TrieNode::Leaf { prefix, .. })) = (path.last_key(), path.last_node()) {
            let prefix = prefix.clone();
            let old_state = store.get(&key)?.state;
            let fresh = store.fresh_key();
            store.put(fresh, TrieNode::Leaf { prefix, payload }, NodeState::Mutable);
            let final_key = relocate_if_dangling_anchor(store, key, old_state, fresh);
            if final_key == key {
                return Ok(root_key);
            }
            store.delete(&key);
            return relink_parent(store, &path, key, final_key);
        }
        return Ok(root_key);
    }

    let tail = path.tail.clone();
    let Some(last) = path.steps.last() else {
        // Empty trie: the new leaf becomes the (provisional) root.
        let fresh = store.fresh_key();
        store.put(
            fresh,
            TrieNode::Leaf {
                prefix: tail,
                payload,
            },
            NodeState::Mutable,
        );
        return Ok(fresh);
    };
    let last_key = last.key;

    match last.node.clone() {
        TrieNode::Branch { mut children, legacy_data } => {
            let nibble = tail.at(0) as usize;
            let rest = tail.slice(1);
            let branch_old_state = store.get(&last_key)?.state;

            if children[nibble].is_none() {
                let leaf_key = store.fresh_key();
                store.put(
                    leaf_key,
                    TrieNode::Leaf {
                        prefix: rest,
                        payload,
                    },
                    NodeState::Mutable,
                );
                children[nibble] = Some(leaf_key);
                let fresh_branch = store.fresh_key();
                store.put(
                    fresh_branch,
                    TrieNode::Branch {
                        children,
                        legacy_data,
                    },
                    NodeState::Mutable,
                );
                let new_branch = relocate_if_dangling_anchor(store, last_key, branch_old_state, fresh_branch);
                if new_branch == last_key {
                    return Ok(root_key);
                }
                store.delete(&last_key);
                relink_parent(store, &path, last_key, new_branch)
            } else {
                // Diverging child: split it, reusing the child's own key if
                // it was itself a dangling link just materialized this batch.
                let child_key = children[nibble].unwrap();
                if !store.contains(&child_key) {
                    // Branch already records this child's hash (a proof
                    // boundary not yet materialized); build under that exact
                    // key so Phase B can check the recomputed hash against
                    // what this branch already committed to.
                    store.put(
                        child_key,
                        TrieNode::Leaf {
                            prefix: rest,
                            payload,
                        },
                        NodeState::Mutable,
                    );
                    return Ok(root_key);
                }
                let child_old_state = store.get(&child_key)?.state;
                let child_node = store.get_node(&child_key)?.clone();
                let fresh_child = split_node(store, &child_node, &rest, payload)?;
                let new_child_key =
                    relocate_if_dangling_anchor(store, child_key, child_old_state, fresh_child);
                if new_child_key == child_key {
                    return Ok(root_key);
                }
                store.delete(&child_key);
                children[nibble] = Some(new_child_key);
                let fresh_branch = store.fresh_key();
                store.put(
                    fresh_branch,
                    TrieNode::Branch {
                        children,
                        legacy_data,
                    },
                    NodeState::Mutable,
                );
                let new_branch = relocate_if_dangling_anchor(store, last_key, branch_old_state, fresh_branch);
                if new_branch == last_key {
                    return Ok(root_key);
                }
                store.delete(&last_key);
                relink_parent(store, &path, last_key, new_branch)
            }
        }

        TrieNode::Extension { prefix, child } => {
            let ext_old_state = store.get(&last_key)?.state;
            if !store.contains(&child) {
                // Extension's child is a recorded-but-unmaterialized link;
                // build a fresh branch with one leaf slot under that exact
                // key, leaving the extension itself untouched.
                let nibble = tail.at(0) as usize;
                let rest = tail.slice(1);
                let mut children: [Option<Key>; 16] = [None; 16];
                let leaf_key = store.fresh_key();
                store.put(leaf_key, TrieNode::Leaf { prefix: rest, payload }, NodeState::Mutable);
                children[nibble] = Some(leaf_key);
                store.put(
                    child,
                    TrieNode::Branch {
                        children: Box::new(children),
                        legacy_data: None,
                    },
                    NodeState::Mutable,
                );
                return Ok(root_key);
            }

            // Extension mismatched during the walk.
            let shared = tail.common_prefix_len(&prefix);
            let fresh_ext = split_extension(store, &prefix, child, &tail, shared, payload)?;
            let new_ext_key = relocate_if_dangling_anchor(store, last_key, ext_old_state, fresh_ext);
            if new_ext_key == last_key {
                return Ok(root_key);
            }
            store.delete(&last_key);
            relink_parent(store, &path, last_key, new_ext_key)
        }

        TrieNode::Leaf { prefix, payload: existing_payload } => {
            let leaf_old_state = store.get(&last_key)?.state;
            let fresh_key = split_leaf(store, &prefix, existing_payload, &tail, payload)?;
            let new_key = relocate_if_dangling_anchor(store, last_key, leaf_old_state, fresh_key);
            if new_key == last_key {
                return Ok(root_key);
            }
            store.delete(&last_key);
            relink_parent(store, &path, last_key, new_key)
        }
    }
}

/// Split a diverging child (leaf or extension) under a branch, inserting a
/// new leaf alongside it (§4.8 split rule).
fn split_node(
    store: &mut TrieStore,
    child: &TrieNode,
    tail: &Nibbles,
    payload: Vec<u8>,
) -> Result<Key, TrieError> {
    match child {
        TrieNode::Leaf { prefix, payload: existing } => {
            split_leaf(store, prefix, existing.clone(), tail, payload)
        }
        TrieNode::Extension { prefix, child } => {
            let shared = tail.common_prefix_len(prefix);
            split_extension(store, prefix, *child, tail, shared, payload)
        }
        TrieNode::Branch { .. } => unreachable!("hexary_path would have descended into a present branch child"),
    }
}

fn split_leaf(
    store: &mut TrieStore,
    existing_prefix: &Nibbles,
    existing_payload: Vec<u8>,
    tail: &Nibbles,
    new_payload: Vec<u8>,
) -> Result<Key, TrieError> {
    let shared = tail.common_prefix_len(existing_prefix);
    let mut children: [Option<Key>; 16] = [None; 16];

    if shared == existing_prefix.len() && shared == tail.len() {
        // Identical paths: overwrite.
        let key = store.fresh_key();
        store.put(
            key,
            TrieNode::Leaf {
                prefix: existing_prefix.clone(),
                payload: new_payload,
            },
            NodeState::Mutable,
        );
        return Ok(key);
    }

    let existing_rest = existing_prefix.slice(shared);
    let new_rest = tail.slice(shared);
    if existing_rest.is_empty() || new_rest.is_empty() {
        // One leaf's path is a strict prefix of the other's: no valid
        // branch split exists for two distinct terminal leaves here.
        return Err(TrieError::PathTail);
    }

    let existing_key = store.fresh_key();
    store.put(
        existing_key,
        TrieNode::Leaf {
            prefix: existing_rest.slice(1),
            payload: existing_payload,
        },
        NodeState::Mutable,
    );
    children[existing_rest.at(0) as usize] = Some(existing_key);

    let new_key = store.fresh_key();
    store.put(
        new_key,
        TrieNode::Leaf {
            prefix: new_rest.slice(1),
            payload: new_payload,
        },
        NodeState::Mutable,
    );
    children[new_rest.at(0) as usize] = Some(new_key);

    let middle = store.fresh_key();
    store.put(
        middle,
        TrieNode::Branch {
            children: Box::new(children),
            legacy_data: None,
        },
        NodeState::Mutable,
    );

    wrap_in_extension(store, &tail.slice_range(0, shared), middle)
}

fn split_extension(
    store: &mut TrieStore,
    existing_prefix: &Nibbles,
    existing_child: Key,
    tail: &Nibbles,
    shared: usize,
    new_payload: Vec<u8>,
) -> Result<Key, TrieError> {
    let mut children: [Option<Key>; 16] = [None; 16];

    let existing_rest = existing_prefix.slice(shared);
    let new_rest_check = tail.slice(shared);
    if existing_rest.is_empty() || new_rest_check.is_empty() {
        return Err(TrieError::PathTail);
    }
    let reattached = if existing_rest.len() > 1 {
        wrap_in_extension(store, &existing_rest.slice(1), existing_child)?
    } else {
        existing_child
    };
    children[existing_rest.at(0) as usize] = Some(reattached);

    let new_rest = tail.slice(shared);
    let new_key = store.fresh_key();
    store.put(
        new_key,
        TrieNode::Leaf {
            prefix: new_rest.slice(1),
            payload: new_payload,
        },
        NodeState::Mutable,
    );
    children[new_rest.at(0) as usize] = Some(new_key);

    let middle = store.fresh_key();
    store.put(
        middle,
        TrieNode::Branch {
            children: Box::new(children),
            legacy_data: None,
        },
        NodeState::Mutable,
    );

    wrap_in_extension(store, &tail.slice_range(0, shared), middle)
}

fn wrap_in_extension(store: &mut TrieStore, prefix: &Nibbles, child: Key) -> Result<Key, TrieError> {
    if prefix.is_empty() {
        return Ok(child);
    }
    let key = store.fresh_key();
    store.put(
        key,
        TrieNode::Extension {
            prefix: prefix.clone(),
            child,
        },
        NodeState::Mutable,
    );
    Ok(key)
}

/// Rewrite every ancestor of `old_child_key` along `path` to point at
/// `new_child_key` instead, returning the (possibly new) root key.
fn relink_parent(
    store: &mut TrieStore,
    path: &super::path::Path,
    old_child_key: Key,
    new_child_key: Key,
) -> Result<Key, TrieError> {
    if old_child_key == new_child_key {
        return Ok(path.root_key);
    }

    let idx = path
        .steps
        .iter()
        .position(|s| s.key == old_child_key)
        .ok_or(TrieError::NodeNotFound)?;

    let mut current_new_key = new_child_key;
    let mut i = idx;
    while i > 0 {
        let parent_step = &path.steps[i - 1];
        let parent_node = store.get_node(&parent_step.key)?.clone();
        store.delete(&parent_step.key);
        let rewritten = match parent_node {
            TrieNode::Branch {
                mut children,
                legacy_data,
            } => {
                let nibble = parent_step.nibble;
                if nibble < 0 {
                    return Err(TrieError::BranchError);
                }
                children[nibble as usize] = Some(current_new_key);
                TrieNode::Branch {
                    children,
                    legacy_data,
                }
            }
            TrieNode::Extension { prefix, .. } => TrieNode::Extension {
                prefix,
                child: current_new_key,
            },
            TrieNode::Leaf { .. } => return Err(TrieError::LeafExpected),
        };
        let fresh = store.fresh_key();
        store.put(fresh, rewritten, NodeState::Mutable);
        current_new_key = fresh;
        i -= 1;
    }

    Ok(current_new_key)
}

/// Walk every provisional node bottom-up, recomputing encodings and hash
/// keys until only Static/Locked nodes with hash keys remain, or the batch
/// is rejected (Phase B, §4.8).
pub fn interpolate_finalize(store: &mut TrieStore, root_key: Key) -> Result<Key, TrieError> {
    let mut current_root = root_key;
    let mut blocked_count = usize::MAX;

    loop {
        debug!(blocked = blocked_count, "interpolate: finalize pass");
        let (new_root, blocked) = finalize_pass(store, current_root)?;
        current_root = new_root;
        if blocked == 0 {
            break;
        }
        if blocked >= blocked_count {
            return Err(TrieError::BoundaryProofFailed);
        }
        blocked_count = blocked;
    }

    if !store.is_fully_finalized() {
        return Err(TrieError::UnresolvedRepairNode);
    }
    Ok(current_root)
}

/// One bottom-up pass: recursively finalize `key`, returning its new key and
/// the number of subtrees that could not be finalized this pass.
///
/// Always walks into a Static/Locked node's children too — content filling a
/// previously-dangling link surfaces there as a freshly-`Mutable` node kept
/// under the same key the ancestor already recorded — but leaves an already
/// finalized node whose children turned out unchanged untouched rather than
/// needlessly re-hashing it.
fn finalize_pass(store: &mut TrieStore, key: Key) -> Result<(Key, usize), TrieError> {
    let record = store.get(&key)?.clone();
    let original_node = record.node.clone();

    let mut blocked = 0usize;
    let new_node = match record.node {
        TrieNode::Leaf { .. } => original_node.clone(),
        TrieNode::Extension { prefix, child } => {
            let child = if store.contains(&child) {
                let (new_child, child_blocked) = finalize_pass(store, child)?;
                blocked += child_blocked;
                new_child
            } else {
                child
            };
            TrieNode::Extension { prefix, child }
        }
        TrieNode::Branch {
            mut children,
            legacy_data,
        } => {
            for slot in children.iter_mut() {
                if let Some(child_key) = slot {
                    if store.contains(child_key) {
                        let (new_child, child_blocked) = finalize_pass(store, *child_key)?;
                        *slot = Some(new_child);
                        blocked += child_blocked;
                    }
                }
            }
            TrieNode::Branch {
                children,
                legacy_data,
            }
        }
    };

    if record.state.is_finalized() && blocked == 0 && new_node == original_node {
        return Ok((key, 0));
    }

    if blocked > 0 {
        // A descendant is still pending; hold this node without comparing or
        // promoting it until the blocked leaves below it clear.
        store.put(key, new_node, NodeState::Mutable);
        return Ok((key, blocked));
    }

    match new_node.rlp_encode() {
        None => {
            // A descendant is still provisional; retry next pass.
            store.put(key, new_node, NodeState::Mutable);
            Ok((key, 1))
        }
        Some(encoded) => {
            let hash_key = Key::Hash(super::rlp::keccak256(&encoded));
            if key.is_node_key() && key != hash_key {
                trace!(?key, ?hash_key, "interpolate: recomputed hash mismatches its recorded link");
                store.put(key, new_node, NodeState::Mutable);
                return Ok((key, 1));
            }
            if key != hash_key {
                store.delete(&key);
            }
            store.put(hash_key, new_node, NodeState::Locked);
            Ok((hash_key, 0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::nibbles::Nibbles as N;

    /// A key that has never been put into the store, used only to signal
    /// "start from an empty trie" to [`insert_one`]/[`interpolate_insert`].
    fn empty_trie_root(store: &mut TrieStore) -> Key {
        let key = store.fresh_key();
        store.delete(&key);
        key
    }

    #[test]
    fn single_leaf_interpolates_and_finalizes() {
        let mut store = TrieStore::new();
        let root = empty_trie_root(&mut store);

        let leaves = vec![LeafSpec {
            path_tag: N(vec![6, 4, 6, 0xf]),
            node_key: None,
            payload: b"verb".to_vec(),
        }];

        let root = interpolate_insert(&mut store, root, &leaves, &TrieConfig::default()).unwrap();
        let finalized = interpolate_finalize(&mut store, root).unwrap();
        assert!(finalized.is_node_key());
        assert!(store.is_fully_finalized());
    }

    #[test]
    fn two_leaves_share_a_branch_after_finalize() {
        let mut store = TrieStore::new();
        let root = empty_trie_root(&mut store);

        let leaves = vec![
            LeafSpec {
                path_tag: N(vec![6, 4, 6, 0xf]),
                node_key: None,
                payload: b"verb".to_vec(),
            },
            LeafSpec {
                path_tag: N(vec![6, 4, 6, 0x0]),
                node_key: None,
                payload: b"coin".to_vec(),
            },
        ];

        let root = interpolate_insert(&mut store, root, &leaves, &TrieConfig::default()).unwrap();
        let finalized = interpolate_finalize(&mut store, root).unwrap();
        assert!(finalized.is_node_key());
        assert!(store.is_fully_finalized());
    }

    #[test]
    fn dangling_branch_child_fill_matching_recorded_hash_finalizes_cleanly() {
        let leaf_node = TrieNode::Leaf {
            prefix: N(vec![0xf]),
            payload: b"x".to_vec(),
        };
        let leaf_hash = Key::Hash(crate::domain::rlp::keccak256(&leaf_node.rlp_encode().unwrap()));

        let mut children: [Option<Key>; 16] = [None; 16];
        children[3] = Some(leaf_hash);
        let branch_node = TrieNode::Branch {
            children: Box::new(children),
            legacy_data: None,
        };
        let branch_hash = Key::Hash(crate::domain::rlp::keccak256(&branch_node.rlp_encode().unwrap()));

        let mut store = TrieStore::new();
        store.put(branch_hash, branch_node, NodeState::Static);

        let leaves = vec![LeafSpec {
            path_tag: N(vec![3, 0xf]),
            node_key: None,
            payload: b"x".to_vec(),
        }];
        let new_root =
            interpolate_insert(&mut store, branch_hash, &leaves, &TrieConfig::default()).unwrap();
        assert_eq!(new_root, branch_hash, "Static ancestor must not be rewritten");

        let finalized = interpolate_finalize(&mut store, new_root).unwrap();
        assert_eq!(finalized, branch_hash);
        assert!(store.is_fully_finalized());
        assert_eq!(store.get(&leaf_hash).unwrap().state, NodeState::Locked);
    }

    #[test]
    fn dangling_branch_child_fill_mismatching_recorded_hash_is_rejected() {
        let mut children: [Option<Key>; 16] = [None; 16];
        let wrong_hash = Key::Hash([0xAB; 32]);
        children[3] = Some(wrong_hash);
        let branch_node = TrieNode::Branch {
            children: Box::new(children),
            legacy_data: None,
        };
        let branch_hash = Key::Hash(crate::domain::rlp::keccak256(&branch_node.rlp_encode().unwrap()));

        let mut store = TrieStore::new();
        store.put(branch_hash, branch_node, NodeState::Static);

        let leaves = vec![LeafSpec {
            path_tag: N(vec![3, 0xf]),
            node_key: None,
            payload: b"x".to_vec(),
        }];
        let new_root =
            interpolate_insert(&mut store, branch_hash, &leaves, &TrieConfig::default()).unwrap();
        assert_eq!(new_root, branch_hash);

        let err = interpolate_finalize(&mut store, new_root).unwrap_err();
        assert_eq!(err, TrieError::BoundaryProofFailed);
    }

    #[test]
    fn dangling_extension_child_fill_materializes_a_branch_under_the_recorded_key() {
        let leaf_node = TrieNode::Leaf {
            prefix: N(vec![0xa]),
            payload: b"ok".to_vec(),
        };
        let leaf_hash = Key::Hash(crate::domain::rlp::keccak256(&leaf_node.rlp_encode().unwrap()));

        let mut children: [Option<Key>; 16] = [None; 16];
        children[2] = Some(leaf_hash);
        let branch_node = TrieNode::Branch {
            children: Box::new(children),
            legacy_data: None,
        };
        let branch_hash = Key::Hash(crate::domain::rlp::keccak256(&branch_node.rlp_encode().unwrap()));

        let ext_node = TrieNode::Extension {
            prefix: N(vec![5, 6]),
            child: branch_hash,
        };
        let ext_hash = Key::Hash(crate::domain::rlp::keccak256(&ext_node.rlp_encode().unwrap()));

        let mut store = TrieStore::new();
        store.put(ext_hash, ext_node, NodeState::Static);

        let leaves = vec![LeafSpec {
            path_tag: N(vec![5, 6, 2, 0xa]),
            node_key: None,
            payload: b"ok".to_vec(),
        }];
        let new_root = interpolate_insert(&mut store, ext_hash, &leaves, &TrieConfig::default()).unwrap();
        assert_eq!(new_root, ext_hash);

        let finalized = interpolate_finalize(&mut store, new_root).unwrap();
        assert_eq!(finalized, ext_hash);
        assert!(store.is_fully_finalized());
        assert_eq!(store.get(&branch_hash).unwrap().state, NodeState::Locked);
        assert_eq!(store.get(&leaf_hash).unwrap().state, NodeState::Locked);
    }
}
