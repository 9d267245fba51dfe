//! `case` statement lowering (§4.4/§4.6).
//!
//! Grounded on `outbc.c`'s `AST_CASE`: push the switch's end address once
//! (a hidden variable `CaseDone` later pops and jumps to), push the
//! selector once (a second hidden variable that stays live across every
//! comparison), then for each arm a `Case`/`CaseRange` comparison jumping
//! straight to that arm's label. No match falls through to an explicit
//! jump to `other`'s label, or to `CaseDone` if there is none. Every arm
//! body (and the `other` body) ends in its own `CaseDone`, which is how
//! every arm exits through the switch's end label.
//!
//! `CaseDone` always pops exactly two stack cells and jumps to the second
//! one: in the compare-chain form above, that's the unconsumed selector
//! (discarded) and the pushed end address (the jump target). §4.6's
//! jump-table form reuses the very same opcode with the same two-pop
//! shape, grounded on `outbc.c`'s `AST_JUMPTABLE` (lines ~2953-2989): push
//! the end address, push a placeholder "fake index" cell so the two
//! hidden slots line up with the compare-chain form, compute and bias the
//! selector, `FundataLookupJump` against a word-aligned table living in
//! the function's pending chain, push a dummy value, then `CaseDone` pops
//! the dummy and jumps to the address the lookup produced. Each table
//! entry (and the `other`/default entry) ends its own body in `CaseDone`
//! too, popping the leftover fake-index cell and the end address exactly
//! like a compare-chain arm does. `frontends/case.c`'s `CreateJumpTable`
//! supplies the density gate (`maxrange = 255`, `minrange = 5`, and "at
//! least half the entries must be non-default").

use crate::ir::ast::{CaseArm, Expr, Stmt};
use crate::ir::buf::Buf;
use crate::ir::entities::OpRef;
use crate::ir::op::{Attrs, MathOpKind, Op, OpData, OpKind, PushAddressAttrs};
use crate::lower::expr::lower_expr;
use crate::lower::stmt::lower_block;
use crate::lower::LowerContext;
use crate::result::LowerError;
use std::collections::{HashMap, HashSet};

pub fn lower_case(ctx: &mut LowerContext, buf: &mut Buf, selector: &Expr, arms: &[CaseArm], other: Option<&[Stmt]>) {
    if let Expr::IntConst(value) = selector {
        lower_constant_case(ctx, buf, *value, arms, other);
        return;
    }

    check_duplicate_values(ctx, arms);

    if ctx.settings.opt_casetable {
        if let Some(plan) = plan_jump_table(arms) {
            lower_jump_table_case(ctx, buf, selector, arms, other, plan);
            return;
        }
    }

    lower_compare_chain_case(ctx, buf, selector, arms, other);
}

fn lower_compare_chain_case(ctx: &mut LowerContext, buf: &mut Buf, selector: &Expr, arms: &[CaseArm], other: Option<&[Stmt]>) {
    let mut push_end = Op::new(OpKind::FundataPushAddress);
    push_end.attrs = Attrs::PushAddress(PushAddressAttrs { add_pbase: false, for_jump: true });
    let push_end_ref = buf.append(push_end);
    ctx.enter_hidden();

    lower_expr(ctx, buf, selector);
    ctx.enter_hidden();

    let mut arm_match_refs: Vec<Vec<OpRef>> = vec![Vec::new(); arms.len()];
    for (i, arm) in arms.iter().enumerate() {
        for v in &arm.values {
            buf.append(Op::constant(*v));
            let op = Op::new(OpKind::Case);
            arm_match_refs[i].push(buf.append(op));
        }
        if let Some((lo, hi)) = arm.range {
            buf.append(Op::constant(lo));
            buf.append(Op::constant(hi));
            let op = Op::new(OpKind::CaseRange);
            arm_match_refs[i].push(buf.append(op));
        }
    }

    let other_jump_ref = if other.is_some() {
        Some(buf.append(Op::new(OpKind::Jump)))
    } else {
        buf.append(Op::new(OpKind::CaseDone));
        None
    };

    for (i, arm) in arms.iter().enumerate() {
        let label = buf.append(Op::label());
        patch_all(buf, &arm_match_refs[i], label);
        lower_block(ctx, buf, &arm.body);
        buf.append(Op::new(OpKind::CaseDone));
    }
    if let (Some(other_stmts), Some(r)) = (other, other_jump_ref) {
        let label = buf.append(Op::label());
        buf.get_mut(r).jump_to = Some(label);
        lower_block(ctx, buf, other_stmts);
        buf.append(Op::new(OpKind::CaseDone));
    }

    let end_label = buf.append(Op::label());
    buf.get_mut(push_end_ref).jump_to = Some(end_label);
    ctx.exit_hidden();
    ctx.exit_hidden();
}

/// The legacy density gate (`frontends/case.c: CreateJumpTable`), adapted
/// to work over this crate's already-normalized `CaseArm` list instead of
/// a chain of `if`/`goto`s: range ≤ 255, range ≥ 5 (skip tiny switches,
/// where a compare chain is already cheap), and at least half the table's
/// entries, counting the always-appended trailing default slot, must be
/// non-default.
struct JumpTablePlan {
    min: i32,
    range: i32,
}

fn plan_jump_table(arms: &[CaseArm]) -> Option<JumpTablePlan> {
    const MAX_RANGE: i64 = 255;
    const MIN_RANGE: i64 = 5;

    if arms.is_empty() || arms.iter().any(|arm| arm.range.is_some()) {
        return None;
    }
    let values: Vec<i32> = arms.iter().flat_map(|arm| arm.values.iter().copied()).collect();
    if values.is_empty() {
        return None;
    }
    let min = *values.iter().min().unwrap();
    let max = *values.iter().max().unwrap();
    let range = i64::from(max) - i64::from(min) + 1;
    if range > MAX_RANGE || range < MIN_RANGE {
        return None;
    }

    let distinct: HashSet<i32> = values.into_iter().collect();
    let defaults_in_range = range - distinct.len() as i64;
    let defaults_seen = defaults_in_range + 1; // the trailing out-of-range slot is always a default
    if (defaults_seen * MAX_RANGE) / range > MAX_RANGE / 2 {
        return None;
    }

    Some(JumpTablePlan { min, range: range as i32 })
}

/// Bias the selector into a table index with a single unsigned `min`:
/// `min(selector - min_value, range)`. An in-range value passes through
/// unchanged; anything below `min_value` wraps to a huge unsigned number
/// and anything above `min_value + range - 1` already exceeds `range`, so
/// both land on the table's trailing default slot without a branch.
fn lower_jump_table_case(
    ctx: &mut LowerContext,
    buf: &mut Buf,
    selector: &Expr,
    arms: &[CaseArm],
    other: Option<&[Stmt]>,
    plan: JumpTablePlan,
) {
    let mut push_end = Op::new(OpKind::FundataPushAddress);
    push_end.attrs = Attrs::PushAddress(PushAddressAttrs { add_pbase: false, for_jump: true });
    let push_end_ref = buf.append(push_end);
    ctx.enter_hidden();

    buf.append(Op::constant(0)); // fake index cell, kept live so CaseDone's two-pop shape matches the compare-chain form
    ctx.enter_hidden();

    lower_expr(ctx, buf, selector);
    if plan.min != 0 {
        buf.append(Op::constant(plan.min));
        let mut sub = Op::new(OpKind::MathOp);
        sub.math_kind = Some(MathOpKind::Sub);
        buf.append(sub);
    }
    buf.append(Op::constant(plan.range));
    let mut clamp = Op::new(OpKind::MathOp);
    clamp.math_kind = Some(MathOpKind::Min);
    buf.append(clamp);

    let mut align = Op::new(OpKind::Align);
    align.data = OpData::Int(2);
    buf.pending_append(align);
    let table_label = buf.pending_append(Op::label());

    let mut entry_refs = Vec::with_capacity(plan.range as usize + 1);
    for _ in 0..=plan.range {
        entry_refs.push(buf.pending_append(Op::new(OpKind::FundataJumpEntry)));
    }

    let mut lookup = Op::new(OpKind::FundataLookupJump);
    lookup.jump_to = Some(table_label);
    buf.append(lookup);

    buf.append(Op::constant(0)); // dummy so CASE_DONE has two cells to pop
    buf.append(Op::new(OpKind::CaseDone));

    let mut value_to_arm: HashMap<i32, usize> = HashMap::new();
    for (i, arm) in arms.iter().enumerate() {
        for v in &arm.values {
            value_to_arm.insert(*v, i);
        }
    }

    let mut arm_labels = Vec::with_capacity(arms.len());
    for arm in arms {
        let label = buf.append(Op::label());
        arm_labels.push(label);
        lower_block(ctx, buf, &arm.body);
        buf.append(Op::new(OpKind::CaseDone));
    }
    let default_label = buf.append(Op::label());
    if let Some(other_stmts) = other {
        lower_block(ctx, buf, other_stmts);
    }
    buf.append(Op::new(OpKind::CaseDone));

    for i in 0..plan.range {
        let value = plan.min + i;
        let target = value_to_arm.get(&value).map(|&a| arm_labels[a]).unwrap_or(default_label);
        buf.get_mut(entry_refs[i as usize]).jump_to = Some(target);
    }
    buf.get_mut(entry_refs[plan.range as usize]).jump_to = Some(default_label);

    let end_label = buf.append(Op::label());
    buf.get_mut(push_end_ref).jump_to = Some(end_label);
    ctx.exit_hidden();
    ctx.exit_hidden();
}

/// A compile-time-constant selector picks exactly one arm (or `other`, or
/// nothing) at lowering time: no comparisons, no hidden variables, just
/// that one body.
fn lower_constant_case(ctx: &mut LowerContext, buf: &mut Buf, value: i32, arms: &[CaseArm], other: Option<&[Stmt]>) {
    for arm in arms {
        let matches = arm.values.contains(&value) || matches!(arm.range, Some((lo, hi)) if value >= lo && value <= hi);
        if matches {
            lower_block(ctx, buf, &arm.body);
            return;
        }
    }
    if let Some(other_stmts) = other {
        lower_block(ctx, buf, other_stmts);
    }
}

fn check_duplicate_values(ctx: &mut LowerContext, arms: &[CaseArm]) {
    let mut seen: HashSet<i32> = HashSet::new();
    for arm in arms {
        for v in &arm.values {
            if !seen.insert(*v) {
                let loc = ctx.loc();
                ctx.sink.error(loc, LowerError::DuplicateCaseValue { value: *v });
            }
        }
    }
}

fn patch_all(buf: &mut Buf, refs: &[OpRef], target: OpRef) {
    for &r in refs {
        buf.get_mut(r).jump_to = Some(target);
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

    fn selector() -> Expr {
        Expr::Read(crate::ir::ast::Symbol::Local { offset: 0, size: crate::ir::ast::ValueSize::Long })
    }

    #[test]
    fn constant_selector_picks_matching_arm_only() {
        let mut c = ctx();
        let mut buf = Buf::new();
        let arms = vec![
            CaseArm { values: vec![1], range: None, body: vec![Stmt::Expr(Expr::IntConst(10))] },
            CaseArm { values: vec![2], range: None, body: vec![Stmt::Expr(Expr::IntConst(20))] },
        ];
        lower_case(&mut c, &mut buf, &Expr::IntConst(2), &arms, None);
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        // Constant(20), Pop(1) -- the second arm's single statement, nothing else.
        assert_eq!(kinds, vec![OpKind::Constant, OpKind::Pop]);
    }

    #[test]
    fn sparse_arms_fall_back_to_compare_chain() {
        // Only two arms: too few for plan_jump_table's minimum range, so
        // this must take the compare-chain path regardless of opt_casetable.
        let mut c = ctx();
        assert!(c.settings.opt_casetable);
        let mut buf = Buf::new();
        let arms = vec![CaseArm { values: vec![5], range: None, body: vec![] }];
        lower_case(&mut c, &mut buf, &selector(), &arms, None);
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert!(kinds.contains(&OpKind::Case));
        assert!(!kinds.contains(&OpKind::FundataLookupJump));
        assert_eq!(kinds.iter().filter(|k| **k == OpKind::CaseDone).count(), 2);
        assert_eq!(kinds.iter().filter(|k| **k == OpKind::Label).count(), 2);
    }

    #[test]
    fn disabling_casetable_keeps_a_dense_case_as_a_compare_chain() {
        let mut settings = Settings::default();
        settings.opt_casetable = false;
        let mut c = LowerContext::new(ModuleId::new(0), FuncId::new(0), &settings);
        let mut buf = Buf::new();
        let arms: Vec<CaseArm> =
            (1..=6).map(|v| CaseArm { values: vec![v], range: None, body: vec![] }).collect();
        lower_case(&mut c, &mut buf, &selector(), &arms, None);
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert!(kinds.contains(&OpKind::Case));
        assert!(!kinds.contains(&OpKind::FundataLookupJump));
    }

    #[test]
    fn dense_runtime_selector_emits_jump_table_with_default_entries() {
        let mut c = ctx();
        let mut buf = Buf::new();
        // Values 1..6 dense, no gaps: range 6, all six slots non-default,
        // well above the "at least half non-default" density gate.
        let arms: Vec<CaseArm> =
            (1..=6).map(|v| CaseArm { values: vec![v], range: None, body: vec![] }).collect();
        lower_case(&mut c, &mut buf, &selector(), &arms, Some(&[]));
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert!(kinds.contains(&OpKind::FundataLookupJump));
        assert!(!kinds.contains(&OpKind::Case));
        // One CaseDone for the dispatch, one per arm, one for the default/other body.
        assert_eq!(kinds.iter().filter(|k| **k == OpKind::CaseDone).count(), 1 + arms.len() + 1);

        assert!(!buf.pending_is_empty());
        buf.append_pending();
        let all_kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        let align_pos = all_kinds.iter().position(|k| *k == OpKind::Align).expect("table should be word-aligned");
        assert_eq!(all_kinds[align_pos + 1], OpKind::Label);
        // 6 real entries plus the trailing out-of-range default entry.
        assert_eq!(all_kinds[align_pos + 2..].iter().filter(|k| **k == OpKind::FundataJumpEntry).count(), 7);
    }

    #[test]
    fn duplicate_case_values_are_diagnosed() {
        let mut c = ctx();
        let mut buf = Buf::new();
        let arms = vec![
            CaseArm { values: vec![1], range: None, body: vec![] },
            CaseArm { values: vec![1], range: None, body: vec![] },
        ];
        lower_case(&mut c, &mut buf, &selector(), &arms, None);
        assert_eq!(c.sink.diagnostics().len(), 1);
    }

    #[test]
    fn other_arm_gets_its_own_label_and_jump() {
        let mut c = ctx();
        let mut buf = Buf::new();
        let arms = vec![CaseArm { values: vec![1], range: None, body: vec![] }];
        lower_case(&mut c, &mut buf, &selector(), &arms, Some(&[]));
        let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
        assert!(kinds.contains(&OpKind::Jump));
        assert_eq!(kinds.iter().filter(|k| **k == OpKind::CaseDone).count(), 2);
    }
}
