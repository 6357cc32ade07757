//! # Trie core configuration
//!
//! Tunable caps for the inspector and range engine, plus an anti-DoS depth
//! cap shared by path navigation. Mirrors the teacher crate's `StateConfig`
//! convention: one struct, `Default` impl, callers override per-call.

/// Tunable defaults for the trie core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrieConfig {
    /// Default number of nodes the inspector visits before suspending.
    pub suspend_after: usize,
    /// Default depth at which the inspector stops descending.
    pub stop_at_level: usize,
    /// Default number of danglings the inspector accumulates before stopping.
    pub max_dangling: usize,
    /// Default RLP byte budget for one range-engine page.
    pub range_byte_budget: usize,
    /// Maximum nesting depth permitted during path navigation (anti-DoS).
    pub max_proof_depth: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            suspend_after: 1_000,
            stop_at_level: 64,
            max_dangling: 10_000,
            range_byte_budget: 512 * 1024,
            max_proof_depth: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_and_nonzero() {
        let cfg = TrieConfig::default();
        assert!(cfg.suspend_after > 0);
        assert!(cfg.stop_at_level > 0);
        assert!(cfg.max_dangling > 0);
        assert!(cfg.range_byte_budget > 0);
        assert_eq!(cfg.max_proof_depth, 64);
    }
}
