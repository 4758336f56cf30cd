//! Structural normalizers.
//!
//! Each normalizer rewrites one kind of structure that lowering left in a compact form into plain
//! blocks and two-way branches:
//!
//! | Pass | Input | Output |
//! |------|-------|--------|
//! | [`LoopNormalizer`] | `for` header with init/update | pre-header and increment blocks |
//! | [`SwitchNormalizer`] | `Switch` terminator | chain of `If` comparisons |
//! | [`ConditionalNormalizer`] | ternary/short-circuit markers | diamonds of blocks |
//! | [`TrapNormalizer`] | try regions | finally copies, traps and exceptional edges |
//!
//! Passes run in that order. Each takes the draft by value and hands it back, so a failing pass
//! drops the half-rewritten graph with it.

mod conditional;
mod loops;
mod switch;
mod trap;

pub use conditional::ConditionalNormalizer;
pub use loops::LoopNormalizer;
pub use switch::SwitchNormalizer;
pub use trap::TrapNormalizer;

use log::debug;

use crate::{analysis::cfg::CfgDraft, ir::InstructionLowering, BuildConfig, Result};

/// A rewrite of the draft between lowering and finalization.
pub trait NormalizePass: Send + Sync {
    /// Unique name for logging.
    fn name(&self) -> &'static str;

    /// Runs the pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft violates an invariant the pass relies on.
    fn run(
        &self,
        draft: CfgDraft,
        lowering: &dyn InstructionLowering,
        config: &BuildConfig,
    ) -> Result<CfgDraft>;
}

/// Runs all normalizers in order.
///
/// # Errors
///
/// Propagates the first pass error, and with [`BuildConfig::verify_passes`] any symmetry or
/// terminator violation found after a pass.
pub fn normalize(
    mut draft: CfgDraft,
    lowering: &dyn InstructionLowering,
    config: &BuildConfig,
) -> Result<CfgDraft> {
    let passes: [&dyn NormalizePass; 4] = [
        &LoopNormalizer,
        &SwitchNormalizer,
        &ConditionalNormalizer,
        &TrapNormalizer,
    ];
    for pass in passes {
        draft = pass.run(draft, lowering, config)?;
        if config.verify_passes {
            draft.check()?;
        }
        debug!("{}: {} live blocks", pass.name(), draft.live_count());
    }
    Ok(draft)
}
