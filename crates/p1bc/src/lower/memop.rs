//! Classifying a resolved `Symbol` into one of the four addressable shapes
//! named in §4.4, plain memory, plain register, register single bit,
//! register bit range, and emitting the read/write/modify op for it.
//!
//! Grounded on `outbc.c`'s `MOT_MEM`/`MOT_REG`/`MOT_REGBIT`/
//! `MOT_REGBITRANGE` dispatch. One detail that only shows up in the
//! lowering side (not in `bc_spin1.c`'s already-lowered encoder, which has
//! no bit-selector handling at all): a bit or bit-range selector is not
//! encoded as bytes in the `RegBit*`/`RegBitRange*` op. It is compiled as
//! an ordinary pushed value immediately before that op, one value for a
//! single bit, two (`low` then `high`) for a range, exactly like
//! `BCCompileExpression(irbuf, bitExpr, ...)` does ahead of the op in the
//! original.

use crate::ir::ast::{BitSelector, Symbol, ValueSize};
use crate::ir::buf::Buf;
use crate::ir::op::{MathOpKind, MemBase, MemOpAttrs, MemSize, ModifyOp, Op, OpKind};

/// Where a value lives, resolved down to what `encode_op` needs. `Mem`
/// keeps the full `ValueSize`, not just the wire `MemSize`, so a `Long2`
/// target can still be told apart from a plain `Long` one once it gets to
/// `emit_read`/`emit_write`/`emit_modify`.
#[derive(Copy, Clone, Debug)]
pub enum Target {
    Mem {
        base: MemBase,
        offset: i32,
        size: ValueSize,
    },
    Reg {
        address: i32,
        bit: Option<BitSelector>,
    },
}

pub fn value_size_to_mem_size(v: ValueSize) -> MemSize {
    match v {
        ValueSize::Byte => MemSize::Byte,
        ValueSize::Word => MemSize::Word,
        ValueSize::Long | ValueSize::Long2 => MemSize::Long,
    }
}

/// How many stack cells a value of this size takes: one for everything
/// except `Long2`, which is two consecutive longs (low word pushed first,
/// high word second, per §4.4 "Memory operations").
pub fn value_size_cells(v: ValueSize) -> u32 {
    match v {
        ValueSize::Long2 => 2,
        _ => 1,
    }
}

/// Classifies a resolved symbol. Panics on `Function`/`Builtin`: those are
/// call targets, not addressable memory, and `lower::expr` never routes
/// them here.
pub fn classify_symbol(sym: &Symbol) -> Target {
    match sym {
        Symbol::DatLabel { offset } => Target::Mem {
            base: MemBase::PBase,
            offset: *offset,
            size: ValueSize::Long,
        },
        Symbol::ModuleVar { offset, size } => Target::Mem {
            base: MemBase::VBase,
            offset: *offset,
            size: *size,
        },
        Symbol::Local { offset, size } => Target::Mem {
            base: MemBase::DBase,
            offset: *offset,
            size: *size,
        },
        Symbol::HwRegister { address, bit } => Target::Reg {
            address: *address as i32,
            bit: *bit,
        },
        Symbol::Function { .. } | Symbol::Builtin(_) => {
            panic!("{:?} is a call target, not an addressable operand", sym)
        }
    }
}

/// `(mem_size, offset)` for each word a `Target::Mem` of this size takes,
/// in stack order (the order `emit_read` pushes and `emit_write`/
/// `emit_modify` pop). `Long2` duplicates the op with a +4 base offset
/// between the two halves (§4.4); every other size is just itself.
fn mem_words(size: ValueSize, offset: i32) -> Vec<(MemSize, i32)> {
    if size == ValueSize::Long2 {
        vec![(MemSize::Long, offset), (MemSize::Long, offset + 4)]
    } else {
        vec![(value_size_to_mem_size(size), offset)]
    }
}

/// Pushes the bit-selector operand(s) a `RegBit*`/`RegBitRange*` op needs
/// ahead of itself: `low` alone for a single bit, `low` then `high` for a
/// range.
fn push_bit_operands(buf: &mut Buf, bit: Option<BitSelector>) {
    if let Some(b) = bit {
        buf.append(Op::constant(b.low as i32));
        if let Some(high) = b.high {
            buf.append(Op::constant(high as i32));
        }
    }
}

fn reg_kind(plain: OpKind, bit_kind: OpKind, range_kind: OpKind, bit: Option<BitSelector>) -> OpKind {
    match bit {
        None => plain,
        Some(b) if b.high.is_none() => bit_kind,
        Some(_) => range_kind,
    }
}

/// Reads `target` onto the stack, low word first for a `Long2`. `pop_index`
/// callers must supply `repush_index`, which re-emits the index expression
/// so the second half of a `Long2` array element still has an index to
/// pop; everyone else can pass a no-op closure, since it's only invoked
/// between the two halves of an indexed `Long2`.
pub fn emit_read(buf: &mut Buf, target: Target, pop_index: bool, mut repush_index: impl FnMut(&mut Buf)) {
    match target {
        Target::Mem { base, offset, size } => {
            for (i, (mem_size, word_offset)) in mem_words(size, offset).into_iter().enumerate() {
                if pop_index && i > 0 {
                    repush_index(buf);
                }
                let attrs = MemOpAttrs {
                    base,
                    mem_size,
                    mod_size: mem_size,
                    pop_index,
                    ..MemOpAttrs::default()
                };
                buf.append(Op::memop(OpKind::MemRead, attrs, word_offset));
            }
        }
        Target::Reg { address, bit } => {
            push_bit_operands(buf, bit);
            let kind = reg_kind(OpKind::RegRead, OpKind::RegBitRead, OpKind::RegBitRangeRead, bit);
            buf.append(Op::memop(kind, MemOpAttrs::default(), address));
        }
    }
}

/// Writes `target` from the stack, low word first for a `Long2` (mirrors
/// `emit_read`'s push order). See `emit_read` for `repush_index`.
pub fn emit_write(buf: &mut Buf, target: Target, pop_index: bool, mut repush_index: impl FnMut(&mut Buf)) {
    match target {
        Target::Mem { base, offset, size } => {
            for (i, (mem_size, word_offset)) in mem_words(size, offset).into_iter().enumerate() {
                if pop_index && i > 0 {
                    repush_index(buf);
                }
                let attrs = MemOpAttrs {
                    base,
                    mem_size,
                    mod_size: mem_size,
                    pop_index,
                    ..MemOpAttrs::default()
                };
                buf.append(Op::memop(OpKind::MemWrite, attrs, word_offset));
            }
        }
        Target::Reg { address, bit } => {
            push_bit_operands(buf, bit);
            let kind = reg_kind(OpKind::RegWrite, OpKind::RegBitWrite, OpKind::RegBitRangeWrite, bit);
            buf.append(Op::memop(kind, MemOpAttrs::default(), address));
        }
    }
}

/// Emits a `MemModify`/`RegModify`-family op. `math_kind` is `None` for the
/// non-math `ModifyOp` variants (`Write`, `PreInc`, ...). A `Long2` target
/// modifies each word independently, low then high, with no carry between
/// them: §4.4 only specifies the duplicated-op addressing, not 64-bit
/// carry propagation, so arithmetic modify ops on a `Long2` are exact only
/// when the math op doesn't overflow a single word (increment/decrement
/// included; this mirrors a plain `Write` modify, which needs no carry at
/// all). See `emit_read` for `repush_index`.
#[allow(clippy::too_many_arguments)]
pub fn emit_modify(
    buf: &mut Buf,
    target: Target,
    pop_index: bool,
    modify_kind: ModifyOp,
    math_kind: Option<MathOpKind>,
    push_modify_result: bool,
    reverse_math: bool,
    mut repush_index: impl FnMut(&mut Buf),
) {
    match target {
        Target::Mem { base, offset, size } => {
            for (i, (mem_size, word_offset)) in mem_words(size, offset).into_iter().enumerate() {
                if pop_index && i > 0 {
                    repush_index(buf);
                }
                let attrs = MemOpAttrs {
                    base,
                    mem_size,
                    mod_size: mem_size,
                    pop_index,
                    push_modify_result,
                    reverse_math,
                    ..MemOpAttrs::default()
                };
                let mut op = Op::memop(OpKind::MemModify, attrs, word_offset);
                op.modify_kind = Some(modify_kind);
                op.math_kind = math_kind;
                buf.append(op);
            }
        }
        Target::Reg { address, bit } => {
            push_bit_operands(buf, bit);
            let kind = reg_kind(
                OpKind::RegModify,
                OpKind::RegBitModify,
                OpKind::RegBitRangeModify,
                bit,
            );
            let attrs = MemOpAttrs {
                push_modify_result,
                reverse_math,
                ..MemOpAttrs::default()
            };
            let mut op = Op::memop(kind, attrs, address);
            op.modify_kind = Some(modify_kind);
            op.math_kind = math_kind;
            buf.append(op);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_symbol_shape() {
        assert!(matches!(
            classify_symbol(&Symbol::DatLabel { offset: 4 }),
            Target::Mem { base: MemBase::PBase, offset: 4, .. }
        ));
        assert!(matches!(
            classify_symbol(&Symbol::Local { offset: 0, size: ValueSize::Byte }),
            Target::Mem { base: MemBase::DBase, size: ValueSize::Byte, .. }
        ));
        assert!(matches!(
            classify_symbol(&Symbol::HwRegister { address: 0x1F0, bit: None }),
            Target::Reg { address: 0x1F0, bit: None }
        ));
    }

    #[test]
    fn bit_range_read_pushes_both_bounds_before_the_op() {
        let mut buf = Buf::new();
        let target = Target::Reg {
            address: 0x1F2,
            bit: Some(BitSelector { low: 3, high: Some(7) }),
        };
        emit_read(&mut buf, target, false, |_| {});
        let ops: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(ops, vec![OpKind::Constant, OpKind::Constant, OpKind::RegBitRangeRead]);
    }

    #[test]
    fn single_bit_write_pushes_one_operand() {
        let mut buf = Buf::new();
        let target = Target::Reg {
            address: 0x1F2,
            bit: Some(BitSelector { low: 3, high: None }),
        };
        emit_write(&mut buf, target, false, |_| {});
        let ops: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(ops, vec![OpKind::Constant, OpKind::RegBitWrite]);
    }

    #[test]
    fn long2_read_duplicates_with_plus_four_offset() {
        let mut buf = Buf::new();
        let target = Target::Mem { base: MemBase::DBase, offset: 8, size: ValueSize::Long2 };
        emit_read(&mut buf, target, false, |_| {});
        let ops: Vec<(OpKind, i32)> = buf.iter().map(|r| (buf.get(r).kind, buf.get(r).data.as_int())).collect();
        assert_eq!(ops, vec![(OpKind::MemRead, 8), (OpKind::MemRead, 12)]);
    }

    #[test]
    fn long2_indexed_write_repushes_the_index_for_the_second_word() {
        let mut buf = Buf::new();
        let target = Target::Mem { base: MemBase::VBase, offset: 0, size: ValueSize::Long2 };
        let mut repushes = 0;
        emit_write(&mut buf, target, true, |buf| {
            repushes += 1;
            buf.append(Op::constant(2));
        });
        assert_eq!(repushes, 1);
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(kinds, vec![OpKind::MemWrite, OpKind::Constant, OpKind::MemWrite]);
    }
}
