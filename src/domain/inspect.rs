//! # Inspector (C6)
//!
//! Width-first search for dangling links reachable from a root: a child-link
//! reference whose target is either a still-provisional key (never a
//! legitimate closed subtree, §3) or a key genuinely absent from the store.
//! Bounded by three independent caps and resumable across calls via a plain
//! data [`ResumeContext`] (§4.6, §9).

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::config::TrieConfig;
use super::keys::Key;
use super::nibbles::Nibbles;
use super::node::TrieNode;
use super::path::hexary_path_bounded;
use super::store::TrieStore;
use super::TrieError;

/// A reported dangling child link.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dangling {
    /// Partial path from the root to the dangling child.
    pub partial_path: Nibbles,
    /// The child's key, when the link carries one worth fetching. `None` for
    /// a provisional-key link, which has nothing fetchable behind it yet.
    pub child_key: Option<Key>,
}

/// One queued frontier node: its key, partial path from the root, and the
/// depth it was discovered at.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
struct Frontier {
    key: Key,
    path: Nibbles,
    depth: usize,
}

/// Explicit re-entry handle for a suspended inspection run (§9). Plain data
/// — no references into the store — so a caller may hold it across calls.
#[derive(Clone, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ResumeContext {
    to_visit: Vec<Frontier>,
}

/// Outcome of one (possibly partial) inspection run.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InspectReport {
    /// Danglings accumulated this run.
    pub danglings: Vec<Dangling>,
    /// Number of nodes visited this run.
    pub visited: usize,
    /// Maximum depth reached this run.
    pub max_depth: usize,
    /// True iff `stop_at_level` was the cap that ended this run.
    pub stopped: bool,
    /// Non-`None` iff work remains; feed back into the next call.
    pub resume: Option<ResumeContext>,
}

/// Width-first search for dangling links beneath `root_key` (§4.6).
///
/// `seeds`, if given, replaces the root as the starting frontier: each seed
/// partial path is resolved as far as the trie allows and its resolved node
/// (if any) becomes a frontier entry. `resume`, if given, takes priority over
/// both and continues a prior suspended run.
///
/// `config` supplies `suspend_after`/`stop_at_level`/`max_dangling` and the
/// `max_proof_depth` anti-DoS cap: a frontier node discovered past that depth
/// makes the whole run fail with [`TrieError::NestingTooDeep`] rather than
/// silently being queued.
pub fn inspect_trie(
    store: &TrieStore,
    root_key: Key,
    seeds: Option<&[Nibbles]>,
    resume: Option<ResumeContext>,
    config: &TrieConfig,
) -> Result<InspectReport, TrieError> {
    let mut to_visit: VecDeque<Frontier> = VecDeque::new();
    let mut to_visit_next: VecDeque<Frontier> = VecDeque::new();
    let mut depth = 0usize;

    match resume {
        Some(ctx) => {
            for f in ctx.to_visit {
                depth = depth.max(f.depth);
                to_visit.push_back(f);
            }
        }
        None => match seeds {
            Some(seeds) => {
                for seed in seeds {
                    let path = hexary_path_bounded(seed, root_key, store, config.max_proof_depth)?;
                    if let Some(key) = path.last_key() {
                        to_visit.push_back(Frontier {
                            key,
                            path: seed.clone(),
                            depth: 0,
                        });
                    }
                }
            }
            None => to_visit.push_back(Frontier {
                key: root_key,
                path: Nibbles::new(),
                depth: 0,
            }),
        },
    }

    trace!(frontier = to_visit.len(), "inspect: starting run");

    let mut danglings = Vec::new();
    let mut visited = 0usize;
    let mut max_depth_reached = depth;
    let mut stopped = false;
    let mut capped = false;

    loop {
        if to_visit.is_empty() {
            if to_visit_next.is_empty() {
                break;
            }
            depth += 1;
            if depth > config.stop_at_level {
                stopped = true;
                capped = true;
                to_visit = to_visit_next;
                to_visit_next = VecDeque::new();
                break;
            }
            std::mem::swap(&mut to_visit, &mut to_visit_next);
        }

        let Some(frontier) = to_visit.pop_front() else {
            break;
        };

        if frontier.depth > config.max_proof_depth {
            return Err(TrieError::NestingTooDeep {
                max: config.max_proof_depth,
                reached: frontier.depth,
            });
        }

        if visited >= config.suspend_after {
            to_visit.push_front(frontier);
            capped = true;
            break;
        }

        visited += 1;
        max_depth_reached = max_depth_reached.max(frontier.depth);

        let node = match store.get_node(&frontier.key) {
            Ok(node) => node,
            Err(_) => continue,
        };

        match node {
            TrieNode::Leaf { .. } => {}
            TrieNode::Extension { prefix, child } => {
                let child_path = frontier.path.concat(prefix);
                classify_and_queue(
                    store,
                    *child,
                    child_path,
                    frontier.depth + 1,
                    &mut danglings,
                    &mut to_visit_next,
                );
            }
            TrieNode::Branch { children, .. } => {
                for (nibble, child) in children.iter().enumerate() {
                    if let Some(child_key) = child {
                        let child_path = frontier.path.concat(&Nibbles(vec![nibble as u8]));
                        classify_and_queue(
                            store,
                            *child_key,
                            child_path,
                            frontier.depth + 1,
                            &mut danglings,
                            &mut to_visit_next,
                        );
                    }
                }
            }
        }

        if danglings.len() >= config.max_dangling {
            capped = true;
            break;
        }
    }

    let resume_frontier: Vec<Frontier> = to_visit.into_iter().chain(to_visit_next).collect();
    let resume = if capped && !resume_frontier.is_empty() {
        Some(ResumeContext {
            to_visit: resume_frontier,
        })
    } else {
        None
    };

    debug!(
        visited,
        danglings = danglings.len(),
        stopped,
        resumable = resume.is_some(),
        "inspect: run complete"
    );

    Ok(InspectReport {
        danglings,
        visited,
        max_depth: max_depth_reached,
        stopped,
        resume,
    })
}

fn classify_and_queue(
    store: &TrieStore,
    child_key: Key,
    child_path: Nibbles,
    depth: usize,
    danglings: &mut Vec<Dangling>,
    to_visit_next: &mut VecDeque<Frontier>,
) {
    if child_key.is_provisional() {
        danglings.push(Dangling {
            partial_path: child_path,
            child_key: None,
        });
    } else if !store.contains(&child_key) {
        danglings.push(Dangling {
            partial_path: child_path,
            child_key: Some(child_key),
        });
    } else {
        to_visit_next.push_back(Frontier {
            key: child_key,
            path: child_path,
            depth,
        });
    }
}
