//! The ten peephole/flow passes from §4.5, plus the post-peephole
//! push/pop cleanup. Each pass takes one pass over `buf`, applies at most
//! one rewrite per call where the rewrite could invalidate the op list
//! it's scanning (moves, replacements that change neighbor ops), and
//! returns whether it did anything, the fixpoint driver in `mod.rs`
//! keeps calling passes until a whole round does nothing.

use crate::ir::buf::Buf;
use crate::ir::entities::OpRef;
use crate::ir::op::{ModifyOp, Op, OpKind};
use std::collections::HashSet;

/// Pass 1: remove everything between a terminal op and the next label,
/// since it can never execute.
pub fn dead_code_after_terminal(buf: &mut Buf) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    let mut changed = false;
    let mut i = 0;
    while i < ops.len() {
        let op = buf.get(ops[i]);
        let terminal = op.kind.is_unconditional_terminal() || is_logically_terminal_cond_jump(op);
        if !terminal {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < ops.len() {
            let k = buf.get(ops[j]).kind;
            if k == OpKind::Label || k == OpKind::NamedLabel {
                break;
            }
            j += 1;
        }
        if j > i + 1 {
            buf.remove_block(ops[i + 1], ops[j - 1]);
            changed = true;
        }
        i = j;
    }
    changed
}

fn is_logically_terminal_cond_jump(op: &Op) -> bool {
    if !op.kind.is_conditional_jump() {
        return false;
    }
    matches!(&op.attrs, crate::ir::op::Attrs::CondJump(c) if c.logically_terminal)
}

/// Pass 2: `jump L; L:`, the jump falls straight into its own target.
pub fn pointless_jump(buf: &mut Buf) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    let mut changed = false;
    for r in ops {
        if buf.get(r).kind != OpKind::Jump {
            continue;
        }
        if let Some(target) = buf.get(r).jump_to {
            if buf.next(r) == Some(target) {
                buf.remove(r);
                changed = true;
            }
        }
    }
    changed
}

/// Pass 3: drop zero-reference labels; merge chains of adjacent labels by
/// retargeting every jump at the chain to its last member.
pub fn unused_label(buf: &mut Buf) -> bool {
    let mut changed = false;
    let ops: Vec<OpRef> = buf.iter().collect();
    for r in ops {
        if buf.get(r).kind == OpKind::Label && buf.ref_count(r) == 0 {
            buf.remove(r);
            changed = true;
        }
    }
    loop {
        let ops: Vec<OpRef> = buf.iter().collect();
        let mut merged = false;
        for r in ops {
            if buf.get(r).kind != OpKind::Label {
                continue;
            }
            if let Some(n) = buf.next(r) {
                if buf.get(n).kind == OpKind::Label {
                    buf.retarget_jumps(r, n);
                    buf.remove(r);
                    merged = true;
                    changed = true;
                    break;
                }
            }
        }
        if !merged {
            break;
        }
    }
    changed
}

/// Pass 4: a label with exactly one referencing unconditional jump, whose
/// terminal-gated block fits under `threshold` ops, is relocated to sit
/// right after that jump (which then becomes pointless and is dropped
/// here directly rather than waiting for pass 2 to notice).
pub fn move_single_jump_tail_block(buf: &mut Buf, threshold: u32) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    for &l in &ops {
        if buf.get(l).kind != OpKind::Label {
            continue;
        }
        if buf.ref_count(l) != 1 {
            continue;
        }
        let Some(jr) = ops.iter().copied().find(|&r| buf.get(r).jump_to == Some(l)) else {
            continue;
        };
        if buf.get(jr).kind != OpKind::Jump {
            continue;
        }
        if buf.next(jr) == Some(l) {
            continue; // already adjacent; pass 2's job
        }

        let mut last = l;
        let mut size = 0u32;
        let mut cur = Some(l);
        let mut terminated = false;
        while let Some(c) = cur {
            size += 1;
            last = c;
            if buf.get(c).kind.is_unconditional_terminal() {
                terminated = true;
                break;
            }
            if size > threshold {
                break;
            }
            cur = buf.next(c);
        }
        if !terminated || size > threshold {
            continue;
        }

        buf.move_block(Some(jr), l, last);
        buf.remove(jr);
        return true;
    }
    false
}

/// Pass 5: `write X; read X` (same constant long address) → one
/// modify-write that leaves its value on the stack.
pub fn write_then_read_contraction(buf: &mut Buf) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    for w in ops {
        if buf.get(w).kind != OpKind::MemWrite {
            continue;
        }
        let wa = *buf.get(w).memop_attrs();
        if wa.pop_index {
            continue;
        }
        let Some(r) = buf.next(w) else {
            continue;
        };
        if buf.get(r).kind != OpKind::MemRead {
            continue;
        }
        let ra = *buf.get(r).memop_attrs();
        if ra.pop_index {
            continue;
        }
        if wa.base != ra.base || wa.mem_size != ra.mem_size || buf.get(w).data != buf.get(r).data {
            continue;
        }

        let mut new_op = buf.get(w).clone();
        new_op.kind = OpKind::MemModify;
        new_op.modify_kind = Some(ModifyOp::Write);
        new_op.memop_attrs_mut().push_modify_result = true;
        buf.replace_in_place(w, new_op);
        buf.remove(r);
        return true;
    }
    false
}

/// Pass 6: a modify that already pushes its result, followed by a read of
/// the same location, makes the read redundant.
pub fn modify_then_read_contraction(buf: &mut Buf) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    for m in ops {
        let mk = buf.get(m).kind;
        if mk != OpKind::MemModify && mk != OpKind::RegModify {
            continue;
        }
        let ma = *buf.get(m).memop_attrs();
        let pushes = ma.push_modify_result
            || buf
                .get(m)
                .modify_kind
                .map(|k| k.pushes_result_by_default())
                .unwrap_or(false);
        if !pushes {
            continue;
        }
        let Some(r) = buf.next(m) else {
            continue;
        };
        let read_kind = if mk == OpKind::MemModify {
            OpKind::MemRead
        } else {
            OpKind::RegRead
        };
        if buf.get(r).kind != read_kind {
            continue;
        }
        let ra = *buf.get(r).memop_attrs();
        if ma.base == ra.base && ma.mem_size == ra.mem_size && buf.get(m).data == buf.get(r).data {
            buf.get_mut(m).memop_attrs_mut().push_modify_result = true;
            buf.remove(r);
            return true;
        }
    }
    false
}

/// Pass 7: `write result; return` → `return-pop`; the symmetric read
/// case collapses `return-pop` back to a plain `return`.
pub fn return_contraction(buf: &mut Buf) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    for w in ops {
        let wk = buf.get(w).kind;
        let Some(n) = buf.next(w) else { continue };
        if wk == OpKind::MemWrite && buf.get(n).kind == OpKind::ReturnPlain {
            let mut new_op = Op::new(OpKind::ReturnPop);
            new_op.srcloc = buf.get(n).srcloc;
            buf.replace_in_place(w, new_op);
            buf.remove(n);
            return true;
        }
        if wk == OpKind::MemRead && buf.get(n).kind == OpKind::ReturnPop {
            let mut new_op = Op::new(OpKind::ReturnPlain);
            new_op.srcloc = buf.get(n).srcloc;
            buf.replace_in_place(w, new_op);
            buf.remove(n);
            return true;
        }
    }
    false
}

/// Pass 8: `if cond jump over; jump L; over:` → `if !cond jump L`.
/// Only `JumpIfZ`/`JumpIfNz` have a direct negation; the test-and-branch
/// forms (`JumpTjz`, `JumpDjnz`) are left alone.
pub fn jump_over_jump(buf: &mut Buf) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    for c in ops {
        let ck = buf.get(c).kind;
        if ck != OpKind::JumpIfZ && ck != OpKind::JumpIfNz {
            continue;
        }
        let Some(l2) = buf.get(c).jump_to else { continue };
        let Some(j) = buf.next(c) else { continue };
        if buf.get(j).kind != OpKind::Jump {
            continue;
        }
        let Some(l1) = buf.get(j).jump_to else { continue };
        if buf.next(j) != Some(l2) {
            continue;
        }
        let negated = if ck == OpKind::JumpIfZ {
            OpKind::JumpIfNz
        } else {
            OpKind::JumpIfZ
        };
        buf.get_mut(c).kind = negated;
        buf.get_mut(c).jump_to = Some(l1);
        buf.remove(j);
        return true;
    }
    false
}

/// Pass 9: any jump whose target label is immediately followed by an
/// unconditional jump retargets to that jump's own destination, chasing
/// the whole chain (with a cycle guard for self-referencing loops).
pub fn jump_to_jump(buf: &mut Buf) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    let mut changed = false;
    for r in ops {
        if !buf.get(r).kind.uses_jump_to() {
            continue;
        }
        let Some(original) = buf.get(r).jump_to else {
            continue;
        };
        let mut target = original;
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(target) {
                break;
            }
            let Some(after) = buf.next(target) else { break };
            if buf.get(after).kind != OpKind::Jump {
                break;
            }
            let Some(next_target) = buf.get(after).jump_to else {
                break;
            };
            if next_target == target {
                break;
            }
            target = next_target;
        }
        if target != original {
            buf.get_mut(r).jump_to = Some(target);
            changed = true;
        }
    }
    changed
}

/// Pass 10: an unconditional jump to a one-byte terminal op is replaced
/// in place by that op.
pub fn replace_jump_to_terminal(buf: &mut Buf) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    for r in ops {
        if buf.get(r).kind != OpKind::Jump {
            continue;
        }
        let Some(l) = buf.get(r).jump_to else { continue };
        let Some(t) = buf.next(l) else { continue };
        if !buf.get(t).kind.is_one_byte_terminal() {
            continue;
        }
        let mut new_op = Op::new(buf.get(t).kind);
        new_op.srcloc = buf.get(r).srcloc;
        buf.replace_in_place(r, new_op);
        return true;
    }
    false
}

/// Post-peephole cleanup: a `pop` immediately before a plain return/abort
/// discards nothing those ops would have looked at.
pub fn cleanup_pop_before_terminal(buf: &mut Buf) -> bool {
    let ops: Vec<OpRef> = buf.iter().collect();
    let mut changed = false;
    for r in ops {
        if buf.get(r).kind != OpKind::Pop {
            continue;
        }
        if let Some(n) = buf.next(r) {
            let k = buf.get(n).kind;
            if k == OpKind::ReturnPlain || k == OpKind::AbortPlain {
                buf.remove(r);
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::{Attrs, CondJumpAttrs, MemOpAttrs};

    #[test]
    fn pointless_jump_is_removed() {
        let mut buf = Buf::new();
        let label = buf.append(Op::label());
        let jump = buf.append(Op::jump(label));
        buf.move_block(None, jump, jump); // jump now sits right before its target
        assert!(pointless_jump(&mut buf));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn dead_code_after_unconditional_jump_is_removed() {
        let mut buf = Buf::new();
        let l = buf.append(Op::label());
        let jmp = buf.append(Op::jump(l));
        buf.append(Op::constant(1));
        buf.append(Op::constant(2));
        let after = buf.append(Op::label());
        assert!(dead_code_after_terminal(&mut buf));
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(kinds, vec![OpKind::Label, OpKind::Jump, OpKind::Label]);
        assert_eq!(buf.next(jmp), Some(after));
    }

    #[test]
    fn dead_code_respects_logically_terminal_cond_jump() {
        let mut buf = Buf::new();
        let l = buf.append(Op::label());
        let mut cj = Op::new(OpKind::JumpIfZ);
        cj.jump_to = Some(l);
        cj.attrs = Attrs::CondJump(CondJumpAttrs { logically_terminal: true });
        buf.append(cj);
        buf.append(Op::constant(7));
        assert!(dead_code_after_terminal(&mut buf));
        assert_eq!(buf.len(), 2); // label + cond jump; the dangling constant is gone
    }

    #[test]
    fn unused_label_drops_zero_ref_and_merges_chains() {
        let mut buf = Buf::new();
        let orphan = buf.append(Op::label());
        let a = buf.append(Op::label());
        let b = buf.append(Op::label());
        let j = buf.append(Op::jump(a));
        let _ = orphan;
        assert!(unused_label(&mut buf));
        // orphan gone, a merged into b
        assert_eq!(buf.len(), 2); // b, jump
        assert_eq!(buf.get(j).jump_to, Some(b));
    }

    #[test]
    fn write_then_read_contracts_to_modify() {
        let mut buf = Buf::new();
        let attrs = MemOpAttrs::default();
        let w = buf.append(Op::memop(OpKind::MemWrite, attrs, 4));
        buf.append(Op::memop(OpKind::MemRead, attrs, 4));
        assert!(write_then_read_contraction(&mut buf));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.get(w).kind, OpKind::MemModify);
        assert!(buf.get(w).memop_attrs().push_modify_result);
    }

    #[test]
    fn jump_to_jump_chases_the_chain() {
        let mut buf = Buf::new();
        let final_label = buf.append(Op::label());
        buf.append(Op::new(OpKind::ReturnPlain));
        let mid_label = buf.append(Op::label());
        buf.append(Op::jump(final_label));
        let r = buf.append(Op::jump(mid_label));
        assert!(jump_to_jump(&mut buf));
        assert_eq!(buf.get(r).jump_to, Some(final_label));
    }

    #[test]
    fn replace_jump_to_terminal_substitutes_in_place() {
        let mut buf = Buf::new();
        let l = buf.append(Op::label());
        buf.append(Op::new(OpKind::ReturnPlain));
        let r = buf.append(Op::jump(l));
        assert!(replace_jump_to_terminal(&mut buf));
        assert_eq!(buf.get(r).kind, OpKind::ReturnPlain);
        assert_eq!(buf.get(r).jump_to, None);
    }

    #[test]
    fn cleanup_drops_pop_before_return() {
        let mut buf = Buf::new();
        let mut pop = Op::new(OpKind::Pop);
        pop.data = crate::ir::op::OpData::Int(1);
        buf.append(pop);
        buf.append(Op::new(OpKind::ReturnPlain));
        assert!(cleanup_pop_before_terminal(&mut buf));
        assert_eq!(buf.len(), 1);
    }
}
