//! Assignment lowering (§4.4 "Assignments").
//!
//! A plain `x := y` evaluates `y` then writes it to `x`. A compound
//! `x := x op y` (or, with `reverse`, `x := y op x`) collapses into a
//! single read-modify-write `MemModify`/`RegModify` op instead of a
//! separate read, math op, and write, the target's own read is implicit
//! in the modify op, so only the other operand is pushed first. A
//! multi-target assignment (`a, b := f()`) evaluates the right-hand side
//! once and writes each target in reverse declaration order, since the
//! last call result sits on top of the stack.

use crate::ir::ast::{BinOp, Expr, LValue, Symbol};
use crate::ir::buf::Buf;
use crate::ir::op::ModifyOp;
use crate::lower::expr::{lower_expr, plain_mapping};
use crate::lower::memop;
use crate::lower::LowerContext;

pub fn lower_assign(ctx: &mut LowerContext, buf: &mut Buf, targets: &[LValue], op: Option<BinOp>, reverse: bool, value: &Expr) {
    if let Some(bin_op) = op {
        assert_eq!(targets.len(), 1, "compound assignment must have exactly one target");
        lower_compound(ctx, buf, &targets[0], bin_op, reverse, value);
        return;
    }

    if targets.len() == 1 {
        lower_plain_single(ctx, buf, &targets[0], value);
        return;
    }

    lower_expr(ctx, buf, value);
    for lv in targets.iter().rev() {
        let sym = read_symbol(lv);
        memop::emit_write(buf, memop::classify_symbol(sym), false, |_| {});
    }
}

fn lower_plain_single(ctx: &mut LowerContext, buf: &mut Buf, target: &LValue, value: &Expr) {
    match target {
        Expr::Read(sym) => {
            lower_expr(ctx, buf, value);
            memop::emit_write(buf, memop::classify_symbol(sym), false, |_| {});
        }
        Expr::Index { base, index } => {
            let sym = read_symbol(base);
            lower_expr(ctx, buf, value);
            lower_expr(ctx, buf, index);
            memop::emit_write(buf, memop::classify_symbol(sym), true, |buf| lower_expr(ctx, buf, index));
        }
        _ => panic!("assignment target must be a Read or Index, got {:?}", target),
    }
}

fn lower_compound(ctx: &mut LowerContext, buf: &mut Buf, target: &LValue, bin_op: BinOp, reverse: bool, value: &Expr) {
    let math_kind = plain_mapping(bin_op);
    match target {
        Expr::Read(sym) => {
            lower_expr(ctx, buf, value);
            let t = memop::classify_symbol(sym);
            memop::emit_modify(buf, t, false, ModifyOp::Math(math_kind), Some(math_kind), false, reverse, |_| {});
        }
        Expr::Index { base, index } => {
            let sym = read_symbol(base);
            lower_expr(ctx, buf, value);
            lower_expr(ctx, buf, index);
            let t = memop::classify_symbol(sym);
            memop::emit_modify(buf, t, true, ModifyOp::Math(math_kind), Some(math_kind), false, reverse, |buf| {
                lower_expr(ctx, buf, index)
            });
        }
        _ => panic!("compound assignment target must be a Read or Index, got {:?}", target),
    }
}

fn read_symbol(e: &Expr) -> &Symbol {
    match e {
        Expr::Read(sym) => sym,
        _ => panic!("Index base must already be resolved to a Read by the front end"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::entities::{FuncId, ModuleId};
    use crate::ir::ast::ValueSize;
    use crate::ir::op::OpKind;
    use crate::settings::Settings;
    use p1bc_entity::EntityRef;

    fn ctx() -> LowerContext {
        LowerContext::new(ModuleId::new(0), FuncId::new(0), &Settings::default())
    }

    fn local(offset: i32) -> Symbol {
        Symbol::Local { offset, size: ValueSize::Long }
    }

    #[test]
    fn plain_assign_evaluates_then_writes() {
        let mut c = ctx();
        let mut buf = Buf::new();
        lower_assign(&mut c, &mut buf, &[Expr::Read(local(0))], None, false, &Expr::IntConst(5));
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(kinds, vec![OpKind::Constant, OpKind::MemWrite]);
    }

    #[test]
    fn compound_assign_collapses_to_single_modify() {
        let mut c = ctx();
        let mut buf = Buf::new();
        lower_assign(&mut c, &mut buf, &[Expr::Read(local(0))], Some(BinOp::Add), false, &Expr::IntConst(1));
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(kinds, vec![OpKind::Constant, OpKind::MemModify]);
    }

    #[test]
    fn multi_target_writes_in_reverse_order() {
        let mut c = ctx();
        let mut buf = Buf::new();
        let targets = vec![Expr::Read(local(0)), Expr::Read(local(4))];
        lower_assign(&mut c, &mut buf, &targets, None, false, &Expr::IntConst(1));
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(kinds, vec![OpKind::Constant, OpKind::MemWrite, OpKind::MemWrite]);
    }
}
