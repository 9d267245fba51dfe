//! Statement and control-flow lowering (§4.4 "Control flow", "Conditional
//! jumps", "Hidden variables", "Named labels and `goto`").

use crate::ir::ast::{BinOp, Expr, Stmt, UnOp};
use crate::ir::buf::Buf;
use crate::ir::entities::OpRef;
use crate::ir::op::{Op, OpData, OpKind};
use crate::lower::{assign, case, expr};
use crate::lower::LowerContext;

pub fn lower_block(ctx: &mut LowerContext, buf: &mut Buf, stmts: &[Stmt]) {
    for s in stmts {
        lower_stmt(ctx, buf, s);
    }
}

fn lower_stmt(ctx: &mut LowerContext, buf: &mut Buf, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(e) => {
            expr::lower_expr(ctx, buf, e);
            let n = expr::stack_effect(e);
            if n > 0 {
                let mut pop = Op::new(OpKind::Pop);
                pop.data = OpData::Int(n as i32);
                buf.append(pop);
            }
        }
        Stmt::Assign { targets, op, reverse, value } => {
            assign::lower_assign(ctx, buf, targets, *op, *reverse, value);
        }
        Stmt::If { cond, then_branch, else_branch } => lower_if(ctx, buf, cond, then_branch, else_branch),
        Stmt::While { cond, body } => lower_while(ctx, buf, cond, body),
        Stmt::DoWhile { body, cond } => lower_do_while(ctx, buf, body, cond),
        Stmt::For { init, cond, next, body } => lower_for(ctx, buf, init, cond, next, body),
        Stmt::RepeatCount { count, body } => lower_repeat_count(ctx, buf, count, body),
        Stmt::RepeatRange { var, from, to, step, body } => {
            lower_repeat_range(ctx, buf, var, from, to, step.as_ref(), body)
        }
        Stmt::RepeatForever { body } => lower_repeat_forever(ctx, buf, body),
        Stmt::Case { selector, arms, other } => {
            case::lower_case(ctx, buf, selector, arms, other.as_deref())
        }
        Stmt::Label(name) => {
            let mut label = Op::new(OpKind::NamedLabel);
            label.data = OpData::Str(name.clone());
            label.attrs = crate::ir::op::Attrs::LabelDepth(ctx.hidden_depth());
            buf.append(label);
        }
        Stmt::Goto(name) => {
            let mut jump = Op::new(OpKind::Jump);
            jump.jump_to = None;
            let r = buf.append(jump);
            ctx.record_goto(r, name.clone());
        }
        Stmt::Return(value) => {
            match value {
                Some(e) => {
                    expr::lower_expr(ctx, buf, e);
                    buf.append(Op::new(OpKind::ReturnPop));
                }
                None => {
                    buf.append(Op::new(OpKind::ReturnPlain));
                }
            }
        }
        Stmt::Abort(value) => match value {
            Some(e) => {
                expr::lower_expr(ctx, buf, e);
                buf.append(Op::new(OpKind::AbortPop));
            }
            None => {
                buf.append(Op::new(OpKind::AbortPlain));
            }
        },
        Stmt::Quit => ctx.lower_quit(buf),
        Stmt::Next => ctx.lower_next(buf),
    }
}

/// Emits the code for `cond`, appending a jump (with no target yet) to
/// `collect` for every place that should land past the construct being
/// guarded when `sense` doesn't match the evaluated value: `sense = false`
/// means "jump when the condition is false" (the `if`/`while` skip case),
/// `sense = true` means "jump when true". `and`/`or`/`not` are handled
/// structurally rather than by evaluating a boolean and comparing, per
/// §4.4; opposite-sense `and`/`or` combinations go through an intermediate
/// fall-through label rather than short-circuiting directly.
fn lower_branch(ctx: &mut LowerContext, buf: &mut Buf, cond: &Expr, sense: bool, collect: &mut Vec<OpRef>) {
    match cond {
        Expr::Unary { op: UnOp::LogicNot, operand } => lower_branch(ctx, buf, operand, !sense, collect),
        Expr::Binary { op: BinOp::LogicAnd, lhs, rhs } if !sense => {
            lower_branch(ctx, buf, lhs, false, collect);
            lower_branch(ctx, buf, rhs, false, collect);
        }
        Expr::Binary { op: BinOp::LogicOr, lhs, rhs } if sense => {
            lower_branch(ctx, buf, lhs, true, collect);
            lower_branch(ctx, buf, rhs, true, collect);
        }
        Expr::Binary { op: BinOp::LogicAnd, lhs, rhs } if sense => {
            let mut skip = Vec::new();
            lower_branch(ctx, buf, lhs, false, &mut skip);
            lower_branch(ctx, buf, rhs, true, collect);
            let ft = buf.append(Op::label());
            for r in skip {
                buf.get_mut(r).jump_to = Some(ft);
            }
        }
        Expr::Binary { op: BinOp::LogicOr, lhs, rhs } if !sense => {
            let mut skip = Vec::new();
            lower_branch(ctx, buf, lhs, true, &mut skip);
            lower_branch(ctx, buf, rhs, false, collect);
            let ft = buf.append(Op::label());
            for r in skip {
                buf.get_mut(r).jump_to = Some(ft);
            }
        }
        Expr::IntConst(0) => {
            if !sense {
                let j = buf.append(Op::new(OpKind::Jump));
                collect.push(j);
            }
        }
        Expr::IntConst(_) => {
            if sense {
                let j = buf.append(Op::new(OpKind::Jump));
                collect.push(j);
            }
        }
        _ => {
            expr::lower_expr(ctx, buf, cond);
            let kind = if sense { OpKind::JumpIfNz } else { OpKind::JumpIfZ };
            let r = buf.append(Op::new(kind));
            collect.push(r);
        }
    }
}

fn patch_all(buf: &mut Buf, refs: &[OpRef], target: OpRef) {
    for r in refs {
        buf.get_mut(*r).jump_to = Some(target);
    }
}

fn lower_if(ctx: &mut LowerContext, buf: &mut Buf, cond: &Expr, then_branch: &[Stmt], else_branch: &[Stmt]) {
    let mut to_else = Vec::new();
    lower_branch(ctx, buf, cond, false, &mut to_else);
    lower_block(ctx, buf, then_branch);
    if else_branch.is_empty() {
        let lbot = buf.append(Op::label());
        patch_all(buf, &to_else, lbot);
    } else {
        let mut to_end = Vec::new();
        let skip_else = buf.append(Op::new(OpKind::Jump));
        to_end.push(skip_else);
        let lelse = buf.append(Op::label());
        patch_all(buf, &to_else, lelse);
        lower_block(ctx, buf, else_branch);
        let lend = buf.append(Op::label());
        patch_all(buf, &to_end, lend);
    }
}

fn lower_while(ctx: &mut LowerContext, buf: &mut Buf, cond: &Expr, body: &[Stmt]) {
    let ltop = buf.append(Op::label());
    ctx.push_loop();
    ctx.resolve_next_target(buf, ltop);
    let mut to_bot = Vec::new();
    lower_branch(ctx, buf, cond, false, &mut to_bot);
    lower_block(ctx, buf, body);
    buf.append(Op::jump(ltop));
    let lbot = buf.append(Op::label());
    patch_all(buf, &to_bot, lbot);
    let frame = ctx.pop_loop();
    patch_pending_quit(buf, &frame, lbot);
}

fn lower_do_while(ctx: &mut LowerContext, buf: &mut Buf, body: &[Stmt], cond: &Expr) {
    let ltop = buf.append(Op::label());
    ctx.push_loop();
    lower_block(ctx, buf, body);
    let lnext = buf.append(Op::label());
    ctx.resolve_next_target(buf, lnext);
    let mut to_top = Vec::new();
    lower_branch(ctx, buf, cond, true, &mut to_top);
    patch_all(buf, &to_top, ltop);
    let lbot = buf.append(Op::label());
    let frame = ctx.pop_loop();
    patch_pending_quit(buf, &frame, lbot);
}

fn lower_for(ctx: &mut LowerContext, buf: &mut Buf, init: &Stmt, cond: &Expr, next: &Stmt, body: &[Stmt]) {
    lower_stmt(ctx, buf, init);
    let ltop = buf.append(Op::label());
    ctx.push_loop();
    let mut to_quit = Vec::new();
    lower_branch(ctx, buf, cond, false, &mut to_quit);
    lower_block(ctx, buf, body);
    let lnext = buf.append(Op::label());
    ctx.resolve_next_target(buf, lnext);
    lower_stmt(ctx, buf, next);
    buf.append(Op::jump(ltop));
    let lquit = buf.append(Op::label());
    patch_all(buf, &to_quit, lquit);
    let frame = ctx.pop_loop();
    patch_pending_quit(buf, &frame, lquit);
}

/// `repeat N times` (§4.4): the trip count lives in one hidden stack cell
/// decremented by `djnz` each iteration; `N == 0` skips the body entirely
/// via a leading jump straight to the pop-variant of quit.
fn lower_repeat_count(ctx: &mut LowerContext, buf: &mut Buf, count: &Expr, body: &[Stmt]) {
    expr::lower_expr(ctx, buf, count);
    ctx.enter_hidden();
    ctx.push_loop();
    ctx.set_loop_body_depth();

    let mut to_quit_nonempty = Vec::new();
    let skip_if_zero = buf.append(Op::new(OpKind::JumpTjz));
    to_quit_nonempty.push(skip_if_zero);

    let ltop = buf.append(Op::label());
    lower_block(ctx, buf, body);
    let lnext = buf.append(Op::label());
    ctx.resolve_next_target(buf, lnext);
    buf.append(Op::jump(ltop));

    let lquit = buf.append(Op::label());
    patch_all(buf, &to_quit_nonempty, lquit);
    ctx.exit_hidden();
    let frame = ctx.pop_loop();
    patch_pending_quit(buf, &frame, lquit);
}

fn lower_repeat_range(
    ctx: &mut LowerContext,
    buf: &mut Buf,
    var: &crate::ir::ast::Symbol,
    from: &Expr,
    to: &Expr,
    step: Option<&Expr>,
    body: &[Stmt],
) {
    use crate::lower::memop;

    expr::lower_expr(ctx, buf, from);
    let target = memop::classify_symbol(var);
    memop::emit_write(buf, target, false, |_| {});

    ctx.push_loop();
    let ltop = buf.append(Op::label());
    lower_block(ctx, buf, body);
    let lnext = buf.append(Op::label());
    ctx.resolve_next_target(buf, lnext);

    // The step (if explicit), then `from` again, then `to`: the modify op
    // needs both bounds to tell ascending from descending counts, not just
    // the step sign, matching outbc.c's REPEAT FROM TO compilation.
    if let Some(s) = step {
        expr::lower_expr(ctx, buf, s);
    }
    expr::lower_expr(ctx, buf, from);
    expr::lower_expr(ctx, buf, to);

    let (base, offset, size) = match target {
        memop::Target::Mem { base, offset, size } => (base, offset, memop::value_size_to_mem_size(size)),
        memop::Target::Reg { .. } => panic!("repeat-range loop variable must be addressable memory"),
    };
    let mut step_op = Op::memop(
        OpKind::MemModify,
        crate::ir::op::MemOpAttrs {
            base,
            mem_size: size,
            mod_size: size,
            repeat_pop_step: step.is_some(),
            ..crate::ir::op::MemOpAttrs::default()
        },
        offset,
    );
    step_op.modify_kind = Some(crate::ir::op::ModifyOp::RepeatStep);
    step_op.jump_to = Some(ltop);
    buf.append(step_op);

    let lquit = buf.append(Op::label());
    let frame = ctx.pop_loop();
    patch_pending_quit(buf, &frame, lquit);
}

fn lower_repeat_forever(ctx: &mut LowerContext, buf: &mut Buf, body: &[Stmt]) {
    let ltop = buf.append(Op::label());
    ctx.push_loop();
    ctx.resolve_next_target(buf, ltop);
    lower_block(ctx, buf, body);
    buf.append(Op::jump(ltop));
    let lquit = buf.append(Op::label());
    let frame = ctx.pop_loop();
    patch_pending_quit(buf, &frame, lquit);
}

/// `resolve_quit_target` isn't called mid-loop the way `resolve_next_target`
/// is (the quit label is, in every construct here, the very last thing
/// appended), so any `quit` emitted before that point stays queued on the
/// frame until it's popped, and this sweeps it once `Lquit`/`Lbot` exists.
fn patch_pending_quit(buf: &mut Buf, frame: &super::LoopFrame, lbot: OpRef) {
    for r in &frame.pending_quit {
        buf.get_mut(*r).jump_to = Some(lbot);
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
    fn if_with_no_else_jumps_false_past_body() {
        let mut c = ctx();
        let mut buf = Buf::new();
        lower_if(&mut c, &mut buf, &Expr::IntConst(1), &[Stmt::Expr(Expr::IntConst(5))], &[]);
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        // A constant-true condition never jumps at all; the body lowers
        // straight through with no trailing jump-false to patch.
        assert!(kinds.contains(&OpKind::Label));
    }

    #[test]
    fn while_loop_next_targets_top_and_quit_targets_bottom() {
        let mut c = ctx();
        let mut buf = Buf::new();
        lower_while(&mut c, &mut buf, &Expr::IntConst(1), &[Stmt::Next, Stmt::Quit]);
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert_eq!(kinds.iter().filter(|k| **k == OpKind::Label).count(), 2);
        assert_eq!(kinds.iter().filter(|k| **k == OpKind::Jump).count(), 3);
    }
}
