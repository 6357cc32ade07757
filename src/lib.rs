//! # hexary-trie-sync
//!
//! Core of an Ethereum-state synchronization subsystem: an in-memory hexary
//! Merkle-Patricia trie engine built for incremental construction from
//! partially-delivered range proofs (snap-sync style).
//!
//! ## Components
//!
//! - **Node/Store** (`domain::node`, `domain::store`): the three node kinds
//!   (Branch, Extension, Leaf) per Ethereum Yellow Paper Appendix D, and the
//!   record store tracking which keys are finalized vs. still mutable.
//! - **Path/Nearby** (`domain::path`, `domain::nearby`): resolve a nibble
//!   path as far as the current trie allows, and find the nearest leaf in
//!   nibble order when the exact path is missing.
//! - **Envelope algebra** (`domain::envelope`): a partial path covers a
//!   closed interval of the 256-bit leaf-path space; this builds, merges,
//!   and decomposes those intervals against proven coverage.
//! - **Interpolator** (`domain::interpolate`): incrementally grows the trie
//!   from delivered leaves, then finalizes hashes bottom-up once a subtree
//!   is fully resolved.
//! - **Range engine** (`domain::range`): pages through leaves within an
//!   interval, bounded by an RLP byte budget, co-producing the boundary
//!   proof needed to validate the page.
//!
//! ## Patricia Merkle Trie
//!
//! The implementation follows Ethereum Yellow Paper Appendix D:
//!
//! - **Node Types**: Leaf, Extension, Branch (no explicit Empty variant;
//!   absence is modeled by `Option<Key>`)
//! - **Path Encoding**: Hex-prefix (HP) encoding for nibble paths
//! - **Serialization**: RLP encoding for canonical representation

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::*;
pub use domain::*;
pub use ports::*;
