//! Compilation settings, threaded explicitly through lowering and
//! optimization instead of read from globals. Replaces the legacy
//! `gl_optimize_flags`/`current`-style module statics (§9's design note
//! on removing implicit global compiler state) with one struct a caller
//! builds once and passes by reference.

/// Individually toggleable optimizer passes, plus the handful of
/// compile-wide flags the lowering layer and listing writer consult.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Run the dead-code-after-terminal pass (§4.5 pass 1).
    pub opt_deadcode: bool,
    /// Run the peephole passes (§4.5 passes 2-10).
    pub opt_peephole: bool,
    /// Gates density-based jump-table lowering for `case` (§4.6). When
    /// unset, every `case` with a non-constant selector lowers to a
    /// compare-and-branch chain regardless of how dense its values are.
    pub opt_casetable: bool,
    /// Favor code size over the move-single-jump-tail-block threshold
    /// (§4.5 pass 4): shrinks the default 18-op block-size cap.
    pub extra_small: bool,
    /// Case-label comparisons and named-label matching are case-sensitive.
    pub case_sensitive: bool,
    /// Keep `srcloc` on every emitted op and retain label names past
    /// resolution, for richer diagnostics.
    pub debug: bool,
    /// Emit a listing (`HHHH: bb bb ... ' comment`) alongside the image.
    pub listing: bool,
    /// Hard cap on peephole/size-resolution fixpoint iterations before
    /// bailing out with `CodegenError::OptimizerDidNotConverge` /
    /// `SizeResolutionDidNotConverge` (§4.5, §4.7).
    pub max_fixpoint_iterations: u32,
    /// Block-size threshold (in ops) for the move-single-jump-tail-block
    /// pass (§4.5 pass 4); default 18, per spec.
    pub move_block_threshold: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            opt_deadcode: true,
            opt_peephole: true,
            opt_casetable: true,
            extra_small: false,
            case_sensitive: false,
            debug: false,
            listing: false,
            max_fixpoint_iterations: 50,
            move_block_threshold: 18,
        }
    }
}

impl Settings {
    /// All optimizations disabled, matching a `-O0`-style debug build.
    pub fn unoptimized() -> Self {
        Settings {
            opt_deadcode: false,
            opt_peephole: false,
            opt_casetable: false,
            ..Settings::default()
        }
    }

    pub fn effective_move_block_threshold(&self) -> u32 {
        if self.extra_small {
            self.move_block_threshold.min(8)
        } else {
            self.move_block_threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_small_shrinks_move_block_threshold() {
        let mut s = Settings::default();
        assert_eq!(s.effective_move_block_threshold(), 18);
        s.extra_small = true;
        assert_eq!(s.effective_move_block_threshold(), 8);
    }

    #[test]
    fn unoptimized_disables_all_passes() {
        let s = Settings::unoptimized();
        assert!(!s.opt_deadcode);
        assert!(!s.opt_peephole);
        assert!(!s.opt_casetable);
    }
}
