//! The optimizer: ten peephole/flow passes (§4.5) run in a fixpoint
//! driven by a per-function `didWork` flag, followed by one pass that
//! mops up pushes/pops left dangling right before a plain return/abort.

pub mod passes;

use crate::ir::buf::Buf;
use crate::result::{CodegenError, CodegenResult};
use crate::settings::Settings;

/// Runs every enabled pass to a fixpoint on one function's buffer.
/// `settings.opt_deadcode` gates pass 1; `settings.opt_peephole` gates
/// passes 2-10 and the final cleanup pass together, matching how the
/// two flags are documented on `Settings`.
pub fn optimize(buf: &mut Buf, settings: &Settings) -> CodegenResult<()> {
    let mut iterations = 0u32;
    loop {
        if iterations >= settings.max_fixpoint_iterations {
            return Err(CodegenError::OptimizerDidNotConverge { iterations });
        }
        iterations += 1;

        let mut did_work = false;
        if settings.opt_deadcode {
            did_work |= passes::dead_code_after_terminal(buf);
        }
        if settings.opt_peephole {
            did_work |= passes::pointless_jump(buf);
            did_work |= passes::unused_label(buf);
            did_work |= passes::move_single_jump_tail_block(
                buf,
                settings.effective_move_block_threshold(),
            );
            did_work |= passes::write_then_read_contraction(buf);
            did_work |= passes::modify_then_read_contraction(buf);
            did_work |= passes::return_contraction(buf);
            did_work |= passes::jump_over_jump(buf);
            did_work |= passes::jump_to_jump(buf);
            did_work |= passes::replace_jump_to_terminal(buf);
        }
        if !did_work {
            break;
        }
        log::trace!("optimize: fixpoint round {} changed the buffer, iterating", iterations);
    }

    if settings.opt_peephole {
        loop {
            if iterations >= settings.max_fixpoint_iterations {
                return Err(CodegenError::OptimizerDidNotConverge { iterations });
            }
            iterations += 1;
            if !passes::cleanup_pop_before_terminal(buf) {
                break;
            }
        }
    }

    log::debug!("optimize: converged after {} iteration(s)", iterations);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::{Op, OpKind};

    #[test]
    fn fixpoint_chains_pointless_jump_and_unused_label() {
        let mut buf = Buf::new();
        let label = buf.append(Op::label());
        let jump = buf.append(Op::jump(label));
        buf.move_block(None, jump, jump);
        let settings = Settings::default();
        optimize(&mut buf, &settings).unwrap();
        // The pointless jump goes; the now-zero-ref label goes too.
        assert!(buf.is_empty());
    }

    #[test]
    fn disabling_peephole_leaves_pointless_jump_in_place() {
        let mut buf = Buf::new();
        let label = buf.append(Op::label());
        let jump = buf.append(Op::jump(label));
        buf.move_block(None, jump, jump);
        let settings = Settings::unoptimized();
        optimize(&mut buf, &settings).unwrap();
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn cleanup_runs_after_peephole_settles() {
        let mut buf = Buf::new();
        buf.append(Op::new(OpKind::Pop));
        buf.append(Op::new(OpKind::ReturnPlain));
        let settings = Settings::default();
        optimize(&mut buf, &settings).unwrap();
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.get(buf.head().unwrap()).kind, OpKind::ReturnPlain);
    }
}
