//! Configuration for the body pipeline.
//!
//! [`BuildConfig`] switches individual stages and checks on or off. The presets cover the usual
//! combinations: [`BuildConfig::cfg_only`] when only the graph is needed, [`BuildConfig::fast`]
//! for batch runs, and [`BuildConfig::strict`] for testing passes.

/// Configuration for [`crate::BodyBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildConfig {
    /// Fold ternary result temporaries into their consumers (default: true).
    ///
    /// When set, `x = c ? a : b` ends with both branches assigning `x` directly instead of a
    /// shared temporary followed by `x = t`.
    pub eliminate_temporaries: bool,

    /// Duplicate finally blocks for the exceptional path (default: true).
    ///
    /// When unset, the original finally entry becomes the handler of the region.
    pub duplicate_finally: bool,

    /// Run the SSA former after finalization (default: true).
    pub build_ssa: bool,

    /// Remove phis that merge fewer than two distinct values (default: true).
    pub prune_trivial_phis: bool,

    /// Check edge symmetry and the terminator rule after every normalizer (default: true).
    pub verify_passes: bool,

    /// Run SSA verification on the finished body (default: false).
    pub verify_ssa: bool,

    /// Maximum nesting depth before a body is rejected, counting statement levels plus the
    /// expression levels below them (default: 256).
    pub max_nesting_depth: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            eliminate_temporaries: true,
            duplicate_finally: true,
            build_ssa: true,
            prune_trivial_phis: true,
            verify_passes: true,
            verify_ssa: false,
            max_nesting_depth: 256,
        }
    }
}

impl BuildConfig {
    /// Stops after finalization; no SSA is formed.
    #[must_use]
    pub fn cfg_only() -> Self {
        Self {
            build_ssa: false,
            prune_trivial_phis: false,
            ..Self::default()
        }
    }

    /// No inter-pass verification and no trivial-phi pruning.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            prune_trivial_phis: false,
            verify_passes: false,
            ..Self::default()
        }
    }

    /// Every stage and every check enabled.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            verify_ssa: true,
            ..Self::default()
        }
    }
}
