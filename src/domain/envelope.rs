//! # Envelope algebra (C7)
//!
//! A partial path covers a closed interval of the 256-bit leaf-path space —
//! its *envelope*. This module builds envelopes, keeps them deduplicated,
//! and decomposes an envelope against an already-proven interval into the
//! minimal set of sub-envelopes still needing proof.

use primitive_types::U256;

use super::keys::Key;
use super::nearby::{hexary_nearby_left_bounded, hexary_nearby_right_bounded};
use super::nibbles::Nibbles;
use super::node::TrieNode;
use super::path::{hexary_path_bounded, Path};
use super::store::TrieStore;
use super::TrieError;

/// A 256-bit ordinal over the leaf-path space.
pub type NodeTag = U256;

/// A closed interval `[lo, hi]` of [`NodeTag`]s, `lo <= hi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeTagRange {
    /// Inclusive lower bound.
    pub lo: NodeTag,
    /// Inclusive upper bound.
    pub hi: NodeTag,
}

impl NodeTagRange {
    /// Build a range; panics if `lo > hi` (a caller bug, not adversarial input).
    pub fn new(lo: NodeTag, hi: NodeTag) -> Self {
        assert!(lo <= hi, "NodeTagRange requires lo <= hi");
        Self { lo, hi }
    }

    /// Do these two ranges share at least one point?
    pub fn intersects(&self, other: &NodeTagRange) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }

    /// Is `other` entirely within `self`?
    pub fn contains_range(&self, other: &NodeTagRange) -> bool {
        self.lo <= other.lo && other.hi <= self.hi
    }

    /// Is `point` within `self`?
    pub fn contains(&self, point: NodeTag) -> bool {
        self.lo <= point && point <= self.hi
    }

    /// Number of NodeTags covered (`hi - lo + 1`).
    pub fn measure(&self) -> U256 {
        self.hi - self.lo + U256::one()
    }
}

/// Expand a [`NodeTag`] into its 64-nibble leaf path.
pub fn tag_to_nibbles(tag: NodeTag) -> Nibbles {
    let mut bytes = [0u8; 32];
    tag.to_big_endian(&mut bytes);
    Nibbles::from_bytes(&bytes)
}

/// Read a (full-length) nibble path as a [`NodeTag`]; equivalent to its own
/// envelope collapsing to a point.
pub fn nibbles_to_tag(path: &Nibbles) -> NodeTag {
    U256::from_big_endian(&path.pad_to_tag(0x00))
}

/// The envelope of a partial path: `[pad(p, 0x00), pad(p, 0xff)]` (§4.7).
pub fn envelope_of(path: &Nibbles) -> NodeTagRange {
    let lo = U256::from_big_endian(&path.pad_to_tag(0x00));
    let hi = U256::from_big_endian(&path.pad_to_tag(0xf));
    NodeTagRange { lo, hi }
}

/// An ordered set of disjoint [`NodeTagRange`]s, automatically merging
/// overlapping or touching ranges on insert.
#[derive(Clone, Debug, Default)]
pub struct IntervalSet {
    ranges: Vec<NodeTagRange>,
}

impl IntervalSet {
    /// An empty set.
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// The set's ranges, sorted by ascending `lo`.
    pub fn ranges(&self) -> &[NodeTagRange] {
        &self.ranges
    }

    /// Insert `range`, merging with any existing range it overlaps or
    /// touches (adjacent NodeTags, `hi + 1 == lo`).
    pub fn insert(&mut self, range: NodeTagRange) {
        let mut merged = range;
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for existing in self.ranges.drain(..) {
            let touching = (merged.hi < U256::max_value() && merged.hi + U256::one() == existing.lo)
                || (existing.hi < U256::max_value() && existing.hi + U256::one() == merged.lo);
            if merged.intersects(&existing) || touching {
                merged = NodeTagRange {
                    lo: merged.lo.min(existing.lo),
                    hi: merged.hi.max(existing.hi),
                };
            } else {
                kept.push(existing);
            }
        }
        kept.push(merged);
        kept.sort_by_key(|r| r.lo);
        self.ranges = kept;
    }

    /// Union with `other`.
    pub fn union(&self, other: &IntervalSet) -> IntervalSet {
        let mut out = self.clone();
        for r in &other.ranges {
            out.insert(*r);
        }
        out
    }

    /// Subtract `other` from `self`.
    pub fn difference(&self, other: &IntervalSet) -> IntervalSet {
        let mut result = self.ranges.clone();
        for cut in &other.ranges {
            let mut next = Vec::with_capacity(result.len());
            for r in result.drain(..) {
                if !r.intersects(cut) {
                    next.push(r);
                    continue;
                }
                if r.lo < cut.lo {
                    next.push(NodeTagRange {
                        lo: r.lo,
                        hi: cut.lo - U256::one(),
                    });
                }
                if cut.hi < r.hi {
                    next.push(NodeTagRange {
                        lo: cut.hi + U256::one(),
                        hi: r.hi,
                    });
                }
            }
            result = next;
        }
        IntervalSet { ranges: result }
    }

    /// The range at or immediately below `point`, if any.
    pub fn le(&self, point: NodeTag) -> Option<NodeTagRange> {
        self.ranges.iter().rev().find(|r| r.lo <= point).copied()
    }

    /// The range at or immediately above `point`, if any.
    pub fn ge(&self, point: NodeTag) -> Option<NodeTagRange> {
        self.ranges.iter().find(|r| r.hi >= point).copied()
    }

    /// Is `point` covered by any range in the set?
    pub fn contains(&self, point: NodeTag) -> bool {
        self.ranges.iter().any(|r| r.contains(point))
    }

    /// Total NodeTag count covered across all ranges.
    pub fn coverage(&self) -> U256 {
        self.ranges
            .iter()
            .fold(U256::zero(), |acc, r| acc + r.measure())
    }
}

/// Sort envelopes by low endpoint and drop any strictly contained within
/// another, keeping only the outermost (§4.7).
pub fn envelope_unique(paths: &[Nibbles]) -> Vec<Nibbles> {
    let mut items: Vec<(NodeTagRange, Nibbles)> = paths
        .iter()
        .map(|p| (envelope_of(p), p.clone()))
        .collect();
    items.sort_by(|a, b| a.0.lo.cmp(&b.0.lo).then(b.0.hi.cmp(&a.0.hi)));

    let mut out = Vec::new();
    let mut frontier: Option<NodeTag> = None;
    for (range, path) in items {
        let contained = frontier.map(|hi| range.hi <= hi).unwrap_or(false);
        if !contained {
            frontier = Some(frontier.map(|hi| hi.max(range.hi)).unwrap_or(range.hi));
            out.push(path);
        }
    }
    out
}

/// The subset of `range_set`'s ranges that intersect `partial_path`'s envelope.
pub fn envelope_touched_by(range_set: &IntervalSet, partial_path: &Nibbles) -> IntervalSet {
    let env = envelope_of(partial_path);
    let mut out = IntervalSet::new();
    for r in &range_set.ranges {
        if r.intersects(&env) {
            out.ranges.push(*r);
        }
    }
    out
}

/// A child reference plus the partial path that reaches it — the unit of
/// decomposition output.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeSpec {
    /// The child's store key.
    pub child_key: Key,
    /// The partial path from the root to this child.
    pub partial_path: Nibbles,
}

/// Reconstruct the full nibble path walked by `path`.
pub fn path_to_nibbles(path: &Path) -> Nibbles {
    let mut acc = Nibbles::new();
    for step in &path.steps {
        match &step.node {
            TrieNode::Branch { .. } => {
                if step.nibble >= 0 {
                    acc = acc.concat(&Nibbles(vec![step.nibble as u8]));
                }
            }
            TrieNode::Extension { prefix, .. } => acc = acc.concat(prefix),
            TrieNode::Leaf { prefix, .. } => acc = acc.concat(prefix),
        }
    }
    acc
}

/// Decompose `envelope(partial_path) \ iv` into a minimal list of
/// non-overlapping [`NodeSpec`]s, given that `iv` is boundary-proven (§4.7).
///
/// Returns an empty list if the envelope is fully covered by `iv`, and
/// [`TrieError::Disjunct`] if `iv` shares no point with the envelope at all.
pub fn envelope_decompose(
    partial_path: &Nibbles,
    root_key: Key,
    iv: NodeTagRange,
    store: &TrieStore,
    max_proof_depth: usize,
) -> Result<Vec<NodeSpec>, TrieError> {
    let env = envelope_of(partial_path);
    if iv.hi < env.lo || iv.lo > env.hi {
        return Err(TrieError::Disjunct);
    }
    if iv.lo <= env.lo && env.hi <= iv.hi {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let own_path = hexary_path_bounded(partial_path, root_key, store, max_proof_depth)?;

    if env.lo < iv.lo {
        // The nearest node strictly left of `iv` is itself outside `iv`;
        // everything at or before its column on each branch level qualifies.
        let seed = hexary_path_bounded(&tag_to_nibbles(iv.lo), root_key, store, max_proof_depth)?;
        let left = hexary_nearby_left_bounded(&seed, store, max_proof_depth)?;
        let boundary = path_to_nibbles(&left);
        collect_side(&own_path, &boundary, true, &mut out);
    }

    if iv.hi < env.hi {
        let seed = hexary_path_bounded(&tag_to_nibbles(iv.hi), root_key, store, max_proof_depth)?;
        let right = hexary_nearby_right_bounded(&seed, store, max_proof_depth)?;
        let boundary = path_to_nibbles(&right);
        collect_side(&own_path, &boundary, false, &mut out);
    }

    Ok(out)
}

/// Walk `own_path`'s branch steps, collecting siblings on one side of
/// `boundary`'s nibble at the matching depth, inclusive of `boundary`'s own
/// column (its node is known to lie outside `iv`). `below` selects "at or
/// before boundary's nibble" (left side); otherwise "at or after" (right
/// side).
fn collect_side(own_path: &Path, boundary: &Nibbles, below: bool, out: &mut Vec<NodeSpec>) {
    let mut acc = Nibbles::new();
    for step in &own_path.steps {
        match &step.node {
            TrieNode::Branch { children, .. } => {
                if acc.len() < boundary.len() {
                    let boundary_nibble = boundary.at(acc.len()) as usize;
                    let range: Vec<usize> = if below {
                        (0..=boundary_nibble).collect()
                    } else {
                        (boundary_nibble..16).collect()
                    };
                    for i in range {
                        if let Some(child_key) = children[i] {
                            out.push(NodeSpec {
                                child_key,
                                partial_path: acc.concat(&Nibbles(vec![i as u8])),
                            });
                        }
                    }
                }
                if step.nibble >= 0 {
                    acc = acc.concat(&Nibbles(vec![step.nibble as u8]));
                }
            }
            TrieNode::Extension { prefix, .. } => acc = acc.concat(prefix),
            TrieNode::Leaf { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_min_le_max_for_any_partial_path() {
        for path in [
            Nibbles::new(),
            Nibbles(vec![6]),
            Nibbles(vec![6, 4, 6, 0xf]),
        ] {
            let env = envelope_of(&path);
            assert!(env.lo <= env.hi);
        }
    }

    #[test]
    fn full_path_envelope_is_singleton() {
        let full = Nibbles::from_bytes(&[0xAB; 32]);
        let env = envelope_of(&full);
        assert_eq!(env.lo, env.hi);
    }

    #[test]
    fn envelope_unique_drops_contained_envelopes() {
        let outer = Nibbles(vec![6]);
        let inner = Nibbles(vec![6, 4]);
        let disjoint = Nibbles(vec![7]);
        let result = envelope_unique(&[outer.clone(), inner, disjoint.clone()]);
        assert_eq!(result.len(), 2);
        assert!(result.contains(&outer));
        assert!(result.contains(&disjoint));
    }

    #[test]
    fn envelope_unique_is_idempotent() {
        let paths = vec![Nibbles(vec![1]), Nibbles(vec![1, 2]), Nibbles(vec![3])];
        let once = envelope_unique(&paths);
        let twice = envelope_unique(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn interval_set_merges_overlaps_and_reports_coverage() {
        let mut set = IntervalSet::new();
        set.insert(NodeTagRange::new(U256::from(0), U256::from(10)));
        set.insert(NodeTagRange::new(U256::from(5), U256::from(20)));
        assert_eq!(set.ranges().len(), 1);
        assert_eq!(set.coverage(), U256::from(21));
    }

    #[test]
    fn interval_set_difference_splits_around_a_cut() {
        let mut set = IntervalSet::new();
        set.insert(NodeTagRange::new(U256::from(0), U256::from(100)));
        let mut cut = IntervalSet::new();
        cut.insert(NodeTagRange::new(U256::from(40), U256::from(60)));
        let remainder = set.difference(&cut);
        assert_eq!(remainder.ranges().len(), 2);
        assert_eq!(remainder.ranges()[0].hi, U256::from(39));
        assert_eq!(remainder.ranges()[1].lo, U256::from(61));
    }

    #[test]
    fn decompose_disjoint_interval_is_an_error() {
        let store = TrieStore::new();
        let path = Nibbles(vec![6]);
        let env = envelope_of(&path);
        let far = NodeTagRange::new(env.hi + U256::one(), env.hi + U256::from(2));
        let result = envelope_decompose(&path, Key::Hash([0; 32]), far, &store, 64);
        assert!(matches!(result, Err(TrieError::Disjunct)));
    }

    #[test]
    fn decompose_fully_covered_envelope_is_empty() {
        let store = TrieStore::new();
        let path = Nibbles(vec![6]);
        let env = envelope_of(&path);
        let result = envelope_decompose(&path, Key::Hash([0; 32]), env, &store, 64).unwrap();
        assert!(result.is_empty());
    }

    use crate::domain::nibbles::Nibbles as N;
    use crate::domain::store::{NodeState, TrieStore};

    #[test]
    fn decompose_collects_siblings_outside_proven_interval() {
        let mut store = TrieStore::new();
        let leaf_a = Key::Hash([1; 32]);
        let leaf_b = Key::Hash([2; 32]);
        let leaf_c = Key::Hash([3; 32]);
        store.put(leaf_a, TrieNode::Leaf { prefix: N::new(), payload: b"a".to_vec() }, NodeState::Static);
        store.put(leaf_b, TrieNode::Leaf { prefix: N::new(), payload: b"b".to_vec() }, NodeState::Static);
        store.put(leaf_c, TrieNode::Leaf { prefix: N::new(), payload: b"c".to_vec() }, NodeState::Static);
        let mut children: [Option<Key>; 16] = [None; 16];
        children[2] = Some(leaf_a);
        children[5] = Some(leaf_b);
        children[9] = Some(leaf_c);
        let root = Key::Hash([9; 32]);
        store.put(
            root,
            TrieNode::Branch {
                children: Box::new(children),
                legacy_data: None,
            },
            NodeState::Static,
        );

        let partial = N::new();
        let leaf_b_path = N(vec![5]);
        let iv = envelope_of(&leaf_b_path);
        let specs = envelope_decompose(&partial, root, iv, &store, 64).unwrap();
        let keys: Vec<Key> = specs.iter().map(|s| s.child_key).collect();
        assert!(keys.contains(&leaf_a));
        assert!(keys.contains(&leaf_c));
        assert!(!keys.contains(&leaf_b));
    }

    #[test]
    fn interval_set_never_reports_overlapping_ranges_for_random_inserts() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let mut set = IntervalSet::new();
            for _ in 0..20 {
                let a: u64 = rng.gen_range(0..1_000);
                let b: u64 = rng.gen_range(0..1_000);
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                set.insert(NodeTagRange::new(U256::from(lo), U256::from(hi)));
            }
            let ranges = set.ranges();
            for pair in ranges.windows(2) {
                assert!(pair[0].hi + U256::from(1) < pair[1].lo, "adjacent ranges should have merged");
            }
        }
    }

    #[test]
    fn difference_then_union_recovers_original_coverage() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let mut set = IntervalSet::new();
            set.insert(NodeTagRange::new(U256::from(0u64), U256::from(200u64)));
            let cut_a: u64 = rng.gen_range(0..100);
            let cut_b: u64 = rng.gen_range(100..200);
            let mut cut = IntervalSet::new();
            cut.insert(NodeTagRange::new(U256::from(cut_a), U256::from(cut_b)));

            let remainder = set.difference(&cut);
            let recombined = remainder.union(&cut);
            assert_eq!(recombined.coverage(), set.coverage());
        }
    }
}
