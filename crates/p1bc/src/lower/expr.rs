//! Expression lowering (§4.4): constants, string literals, reads, binary
//! and unary operators, calls, and builtins.

use crate::ir::ast::{BinOp, Expr, UnOp};
use crate::ir::buf::Buf;
use crate::ir::op::{Attrs, MathOpKind, ModifyOp, Op, OpData, OpKind, PushAddressAttrs};
use crate::lower::call;
use crate::lower::memop;
use crate::lower::LowerContext;
use crate::result::LowerError;

/// Maximum string literal length this back end's size-bounds routines
/// accept in one `FundataString` record (matches the legacy parser's
/// string-table slot width).
const MAX_STRING_LEN: usize = 65535;

/// How many stack cells an expression leaves behind once lowered: used by
/// statement lowering to know how many `Pop`s to emit for a bare
/// expression statement whose value is unused.
pub fn stack_effect(e: &Expr) -> u32 {
    match e {
        Expr::Call { num_results, .. } => *num_results as u32,
        Expr::CallIndirect { num_results, .. } => *num_results as u32,
        Expr::Read(sym) => memop::value_size_cells(read_symbol_size(sym)),
        Expr::Index { base, .. } => match &**base {
            Expr::Read(sym) => memop::value_size_cells(read_symbol_size(sym)),
            _ => 1,
        },
        _ => 1,
    }
}

fn read_symbol_size(sym: &crate::ir::ast::Symbol) -> crate::ir::ast::ValueSize {
    use crate::ir::ast::{Symbol, ValueSize};
    match sym {
        Symbol::ModuleVar { size, .. } | Symbol::Local { size, .. } => *size,
        _ => ValueSize::Long,
    }
}

pub fn lower_expr(ctx: &mut LowerContext, buf: &mut Buf, expr: &Expr) {
    match expr {
        Expr::IntConst(v) => {
            buf.append(Op::constant(*v));
        }
        Expr::StringConst(s) => lower_string_literal(ctx, buf, s),
        Expr::Read(sym) => {
            let target = memop::classify_symbol(sym);
            memop::emit_read(buf, target, false, |_| {});
        }
        Expr::Index { base, index } => {
            let sym = match &**base {
                Expr::Read(sym) => sym,
                _ => panic!("Index base must already be resolved to a Read by the front end"),
            };
            lower_expr(ctx, buf, index);
            memop::emit_read(buf, memop::classify_symbol(sym), true, |buf| lower_expr(ctx, buf, index));
        }
        Expr::ObjIndex { obj, index } => call::lower_obj_index_call(ctx, buf, obj, index),
        Expr::Unary { op, operand } => lower_unary(ctx, buf, *op, operand),
        Expr::Binary { op, lhs, rhs } => lower_binary(ctx, buf, *op, lhs, rhs),
        Expr::Call { callee, args, num_results } => call::lower_call(ctx, buf, callee, args, *num_results),
        Expr::CallIndirect { pointer, args, num_results } => {
            call::lower_call_indirect(ctx, buf, pointer, args, *num_results)
        }
        Expr::Builtin { builtin, args } => call::lower_builtin(ctx, buf, *builtin, args),
    }
}

fn lower_string_literal(ctx: &mut LowerContext, buf: &mut Buf, s: &std::rc::Rc<str>) {
    if s.len() > MAX_STRING_LEN {
        let loc = ctx.loc();
        ctx.sink.error(loc, LowerError::StringTooLong { len: s.len() });
        buf.append(Op::constant(0));
        return;
    }
    let mut str_op = Op::new(OpKind::FundataString);
    str_op.data = OpData::Str(s.clone());
    str_op.attrs = Attrs::StringLength(s.len());
    let string_ref = buf.pending_append(str_op);

    let mut push = Op::new(OpKind::FundataPushAddress);
    push.jump_to = Some(string_ref);
    push.attrs = Attrs::PushAddress(PushAddressAttrs { add_pbase: true, for_jump: false });
    buf.append(push);
}

/// Maps a signed binary comparison to its unsigned wire op plus whether
/// both operands need the sign-bit bias (`XOR 0x8000_0000`) applied first:
/// the P1 bytecode only has unsigned comparison opcodes, so a signed
/// compare is computed by biasing both operands into unsigned order first.
fn cmp_mapping(op: BinOp) -> Option<(MathOpKind, bool)> {
    use BinOp::*;
    Some(match op {
        CmpEq => (MathOpKind::CmpE, false),
        CmpNe => (MathOpKind::CmpNe, false),
        CmpLtU => (MathOpKind::CmpB, false),
        CmpLeU => (MathOpKind::CmpBe, false),
        CmpGtU => (MathOpKind::CmpA, false),
        CmpGeU => (MathOpKind::CmpAe, false),
        CmpLtS => (MathOpKind::CmpB, true),
        CmpLeS => (MathOpKind::CmpBe, true),
        CmpGtS => (MathOpKind::CmpA, true),
        CmpGeS => (MathOpKind::CmpAe, true),
        _ => return None,
    })
}

/// Maps every other binary operator straight to its `MathOpKind`. Signed
/// and unsigned division/remainder share one wire opcode; this back end
/// does not attempt the sign-correction sequence real signed division
/// would need and instead lowers both the same way (a documented
/// simplification, see DESIGN.md).
pub(crate) fn plain_mapping(op: BinOp) -> MathOpKind {
    use BinOp::*;
    match op {
        Add => MathOpKind::Add,
        Sub => MathOpKind::Sub,
        Mul => MathOpKind::MulLow,
        DivS | DivU => MathOpKind::Divide,
        RemS | RemU => MathOpKind::Remainder,
        Shl => MathOpKind::Shl,
        ShrS => MathOpKind::Sar,
        ShrU => MathOpKind::Shr,
        Rol => MathOpKind::Rol,
        Rev => MathOpKind::Rev,
        BitAnd => MathOpKind::BitAnd,
        BitOr => MathOpKind::BitOr,
        BitXor => MathOpKind::BitXor,
        LogicAnd => MathOpKind::LogicAnd,
        LogicOr => MathOpKind::LogicOr,
        Min => MathOpKind::Min,
        Max => MathOpKind::Max,
        LimitMin => MathOpKind::Min,
        LimitMax => MathOpKind::Max,
        CmpEq | CmpNe | CmpLtS | CmpLtU | CmpLeS | CmpLeU | CmpGtS | CmpGtU | CmpGeS | CmpGeU => {
            unreachable!("comparisons go through cmp_mapping")
        }
    }
}

fn push_sign_bias(buf: &mut Buf) {
    buf.append(Op::constant(i32::MIN));
    let mut op = Op::new(OpKind::MathOp);
    op.math_kind = Some(MathOpKind::BitXor);
    buf.append(op);
}

fn lower_binary(ctx: &mut LowerContext, buf: &mut Buf, op: BinOp, lhs: &Expr, rhs: &Expr) {
    lower_expr(ctx, buf, lhs);
    if let Some((math_kind, bias)) = cmp_mapping(op) {
        if bias {
            push_sign_bias(buf);
        }
        lower_expr(ctx, buf, rhs);
        if bias {
            push_sign_bias(buf);
        }
        let mut mop = Op::new(OpKind::MathOp);
        mop.math_kind = Some(math_kind);
        buf.append(mop);
        return;
    }
    lower_expr(ctx, buf, rhs);
    let mut mop = Op::new(OpKind::MathOp);
    mop.math_kind = Some(plain_mapping(op));
    buf.append(mop);
}

fn lower_unary(ctx: &mut LowerContext, buf: &mut Buf, op: UnOp, operand: &Expr) {
    match op {
        UnOp::PreInc | UnOp::PostInc | UnOp::PreDec | UnOp::PostDec
        | UnOp::RandForward | UnOp::RandBackward
        | UnOp::SignExtendByte | UnOp::SignExtendWord => {
            let sym = match operand {
                Expr::Read(sym) => sym,
                _ => panic!("{:?} operand must be an lvalue Read", op),
            };
            let target = memop::classify_symbol(sym);
            let modify_kind = match op {
                UnOp::PreInc => ModifyOp::PreInc,
                UnOp::PostInc => ModifyOp::PostInc,
                UnOp::PreDec => ModifyOp::PreDec,
                UnOp::PostDec => ModifyOp::PostDec,
                UnOp::RandForward => ModifyOp::RandForward,
                UnOp::RandBackward => ModifyOp::RandBackward,
                UnOp::SignExtendByte => ModifyOp::SignExtendByte,
                UnOp::SignExtendWord => ModifyOp::SignExtendWord,
                _ => unreachable!(),
            };
            memop::emit_modify(buf, target, false, modify_kind, None, true, false, |_| {});
        }
        UnOp::Neg | UnOp::Abs | UnOp::BitNot | UnOp::Sqrt | UnOp::Encode | UnOp::Decode => {
            lower_expr(ctx, buf, operand);
            let math_kind = match op {
                UnOp::Neg => MathOpKind::Neg,
                UnOp::Abs => MathOpKind::Abs,
                UnOp::BitNot => MathOpKind::BitNot,
                UnOp::Sqrt => MathOpKind::Sqrt,
                UnOp::Encode => MathOpKind::Encode,
                UnOp::Decode => MathOpKind::Decode,
                _ => unreachable!(),
            };
            let mut mop = Op::new(OpKind::MathOp);
            mop.math_kind = Some(math_kind);
            buf.append(mop);
        }
        UnOp::LogicNot => {
            lower_expr(ctx, buf, operand);
            let mut mop = Op::new(OpKind::MathOp);
            mop.math_kind = Some(MathOpKind::BoolNot);
            buf.append(mop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::entities::{FuncId, ModuleId};
    use crate::settings::Settings;
    use p1bc_entity::EntityRef;

    fn ctx() -> LowerContext {
        LowerContext::new(ModuleId::new(0), FuncId::new(0), &Settings::default())
    }

    #[test]
    fn signed_less_than_biases_both_operands() {
        let mut c = ctx();
        let mut buf = Buf::new();
        lower_binary(
            &mut c,
            &mut buf,
            BinOp::CmpLtS,
            &Expr::IntConst(1),
            &Expr::IntConst(2),
        );
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(
            kinds,
            vec![
                OpKind::Constant,
                OpKind::Constant,
                OpKind::MathOp,
                OpKind::Constant,
                OpKind::Constant,
                OpKind::MathOp,
                OpKind::MathOp,
            ]
        );
    }

    #[test]
    fn unsigned_less_than_skips_bias() {
        let mut c = ctx();
        let mut buf = Buf::new();
        lower_binary(&mut c, &mut buf, BinOp::CmpLtU, &Expr::IntConst(1), &Expr::IntConst(2));
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(kinds, vec![OpKind::Constant, OpKind::Constant, OpKind::MathOp]);
    }

    #[test]
    fn string_literal_defers_to_pending_and_pushes_address() {
        let mut c = ctx();
        let mut buf = Buf::new();
        lower_string_literal(&mut c, &mut buf, &std::rc::Rc::from("hi"));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.get(buf.head().unwrap()).kind, OpKind::FundataPushAddress);
        assert!(!buf.pending_is_empty());
    }
}
