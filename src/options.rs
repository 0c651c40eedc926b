//! Generation limits.
//!
//! The stacks these bound are growable; the limits exist to catch runaway
//! input, not as architectural constants, and the driver can override
//! them.

/// Bounds applied during one generation pass.
#[derive(Debug, Clone, Copy)]
pub struct GenOptions {
    /// Maximum nesting depth of conditional-compilation blocks.
    pub max_cond_depth: usize,
    /// Maximum number of call declarations per input file.
    pub max_calls: usize,
    /// Maximum number of type pairs visited by one template-substitution walk.
    pub max_subst_pairs: usize,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            max_cond_depth: 16,
            max_calls: 4096,
            max_subst_pairs: 128,
        }
    }
}
