//! # Trie Core Error Types
//!
//! Defines all error conditions for the hexary trie core. Each is
//! recoverable; nothing in this crate panics in non-production code paths.

use thiserror::Error;

/// Errors produced by the hexary trie core.
///
/// Grouped as in the design's error taxonomy: structural, path/navigation,
/// envelope arithmetic, interpolation, range/proof, and backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrieError {
    // --- Structural ---
    /// A node could not be RLP-encoded (e.g. it still references a provisional key).
    #[error("node could not be RLP-encoded")]
    RlpEncoding,

    /// RLP bytes did not decode into one of the three node shapes.
    #[error("garbled node: RLP list has invalid arity")]
    GarbledNode,

    /// A key was looked up and was absent from the store/backend.
    #[error("node not found for key")]
    NodeNotFound,

    // --- Path / Navigation ---
    /// A path had no steps where at least one was required.
    #[error("empty path")]
    EmptyPath,

    /// A path's tail was not in the shape an operation required.
    #[error("unexpected path tail")]
    PathTail,

    /// A child link pointed at a key absent from the store.
    #[error("dangling link encountered")]
    DanglingLink,

    /// Malformed extension encountered during traversal.
    #[error("extension node traversal error")]
    ExtensionError,

    /// Malformed branch encountered during traversal.
    #[error("branch node traversal error")]
    BranchError,

    /// A walk exceeded the maximum permitted nesting depth.
    #[error("nesting too deep: max {max}, reached {reached}")]
    NestingTooDeep {
        /// Configured maximum depth.
        max: usize,
        /// Depth actually reached.
        reached: usize,
    },

    /// Navigation could not find a qualifying leaf (e.g. no leaf to the right).
    #[error("navigation failed: no qualifying leaf")]
    Failed,

    /// A leaf node was expected at this step but a different kind was found.
    #[error("leaf node expected")]
    LeafExpected,

    // --- Envelope ---
    /// The supplied interval is disjoint from the envelope under consideration.
    #[error("interval disjoint from envelope")]
    Disjunct,

    /// The envelope is fully contained in the proven interval; nothing to decompose.
    #[error("envelope degenerated: fully covered by proven interval")]
    Degenerated,

    // --- Interpolation ---
    /// A single leaf could not be finalized this pass; retry after other leaves progress.
    #[error("leaf repair blocked, retry on next pass")]
    AccountRepairBlocked,

    /// The interpolation batch made no progress across a retry pass; reject it.
    #[error("boundary proof failed to reconcile")]
    BoundaryProofFailed,

    /// A commit was attempted while provisional keys remained in the store.
    #[error("unresolved repair node: provisional key present at commit time")]
    UnresolvedRepairNode,

    // --- Range / Proof ---
    /// `hexary_nearby_right` made no forward progress while assembling a range.
    #[error("failed to advance to next node while paging leaves")]
    FailedNextNode,

    /// The lower-bound proof for a range could not be established.
    #[error("lower bound proof error")]
    LowerBoundProofError,

    // --- Backend ---
    /// No persistent backend was configured for an operation that required one.
    #[error("no persistent backend configured")]
    NoPersistentBackend,

    /// Opening a bulk-ingest session against the backend failed.
    #[error("failed to open bulk ingest session")]
    OpenBulkSessionFailed,

    /// Adding an item to an open bulk-ingest session failed.
    #[error("failed to add item to bulk ingest session")]
    AddBulkItemFailed,

    /// Committing a bulk-ingest session failed.
    #[error("failed to commit bulk ingest session")]
    CommitBulkItemsFailed,

    /// The backend returned a value whose keccak256 did not match the requested key.
    #[error("backend returned value with mismatched hash")]
    BackendHashMismatch,
}
