//! Lowering: turning the front end's decorated AST (`ir::ast`) into BCIR
//! (`ir::{Buf, Module, Program}`), per §4.1-§4.6. Runs before optimization
//! and size resolution; nothing here assumes a final address is known.

pub mod assign;
pub mod call;
pub mod case;
pub mod expr;
pub mod labels;
pub mod memop;
pub mod stmt;

use crate::ir::ast::{AstModule, DatRelocKind};
use crate::ir::entities::{FuncId, ModuleId, OpRef};
use crate::ir::function::Function;
use crate::ir::module::{Module, RelocKind};
use crate::ir::op::Op;
use crate::ir::program::Program;
use crate::result::{DiagnosticSink, SourceLoc};
use crate::settings::Settings;
use p1bc_entity::EntityRef;
use std::collections::HashMap;
use std::rc::Rc;

/// Backpatch bookkeeping for one active loop: `Next`/`Quit` (continue/
/// break) jump to targets that are often positioned *after* the code that
/// references them (the step of a `for`, the label past a `while`), so
/// jumps to an as-yet-unplaced target are collected here and patched once
/// the target's `Label` op is finally appended.
#[derive(Default)]
struct LoopFrame {
    next_target: Option<OpRef>,
    pending_next: Vec<OpRef>,
    quit_target: Option<OpRef>,
    pending_quit: Vec<OpRef>,
    /// Hidden-variable depth just before this loop's own hidden state (a
    /// repeat counter, a `repeat from..to` bound pair) was pushed; `quit`
    /// pops back down to this depth before jumping clear of the loop.
    depth_at_entry: u32,
    /// Hidden-variable depth once the loop's own hidden state (if any) is
    /// in place and the body is about to run; `next` pops back down to
    /// this depth before jumping to re-enter the loop.
    depth_in_body: u32,
}

/// A `goto` awaiting resolution once every `Stmt::Label` in the function
/// has been lowered (labels in Spin may be declared after their first use).
struct PendingGoto {
    jump_op: OpRef,
    name: Rc<str>,
    loc: SourceLoc,
    depth_at_goto: u32,
}

/// Per-function lowering state: the hidden-variable depth counter and
/// loop/label bookkeeping that §4.1/§4.4 describe as process-wide context
/// threaded through statement lowering, scoped here to one function instead
/// of a global.
pub struct LowerContext {
    pub module_id: ModuleId,
    pub func_id: FuncId,
    pub sink: DiagnosticSink,
    loc: SourceLoc,
    /// Count of hidden values (case selectors, lookup return addresses,
    /// repeat-range bounds) currently live on the operand stack. A `goto`
    /// that crosses a depth change relative to its target is rejected
    /// (`LowerError::ConditionalDepthMismatch`) rather than silently popping
    /// an unknown number of values.
    hidden_depth: u32,
    loop_stack: Vec<LoopFrame>,
    pending_gotos: Vec<PendingGoto>,
    /// Set while lowering the body of a `RepeatCount`/`RepeatRange` whose
    /// trip count is a runtime value rather than a compile-time constant;
    /// `lower::case` and `lower::stmt` consult this to decide whether a
    /// nested `case` may safely assume the loop's hidden counter isn't
    /// disturbed by a jump table (supplemented feature, see SPEC_FULL.md).
    pub in_counted_repeat: bool,
    pub settings: Settings,
}

impl LowerContext {
    fn new(module_id: ModuleId, func_id: FuncId, settings: &Settings) -> Self {
        LowerContext {
            module_id,
            func_id,
            sink: DiagnosticSink::new(),
            loc: SourceLoc {
                module: Some(module_id),
                func: Some(func_id),
                line: 0,
            },
            hidden_depth: 0,
            loop_stack: Vec::new(),
            pending_gotos: Vec::new(),
            in_counted_repeat: false,
            settings: settings.clone(),
        }
    }

    pub fn loc(&self) -> SourceLoc {
        self.loc
    }

    pub fn enter_hidden(&mut self) {
        self.hidden_depth += 1;
    }

    pub fn exit_hidden(&mut self) {
        self.hidden_depth -= 1;
    }

    pub fn hidden_depth(&self) -> u32 {
        self.hidden_depth
    }

    fn push_loop(&mut self) {
        let depth = self.hidden_depth;
        self.loop_stack.push(LoopFrame {
            depth_at_entry: depth,
            depth_in_body: depth,
            ..LoopFrame::default()
        });
    }

    fn pop_loop(&mut self) -> LoopFrame {
        self.loop_stack.pop().expect("pop_loop without matching push_loop")
    }

    /// Records the hidden-variable depth once this loop's own hidden state
    /// (a repeat counter, a `repeat from..to` bound pair) is in place, for
    /// use by `lower_next`'s pop count. Loops with no hidden state of their
    /// own (`while`, `do..while`, `for`) never need to call this, the
    /// default from `push_loop` (same as `depth_at_entry`) is already right.
    fn set_loop_body_depth(&mut self) {
        let depth = self.hidden_depth;
        self.loop_stack.last_mut().expect("set_loop_body_depth outside a loop").depth_in_body = depth;
    }

    /// Sets the frame's continue target now that its `Label` has been
    /// appended, patching every jump emitted before the target existed.
    fn resolve_next_target(&mut self, buf: &mut crate::ir::buf::Buf, target: OpRef) {
        let frame = self.loop_stack.last_mut().expect("resolve_next_target outside a loop");
        frame.next_target = Some(target);
        for j in frame.pending_next.drain(..) {
            buf.get_mut(j).jump_to = Some(target);
        }
    }

    fn resolve_quit_target(&mut self, buf: &mut crate::ir::buf::Buf, target: OpRef) {
        let frame = self.loop_stack.last_mut().expect("resolve_quit_target outside a loop");
        frame.quit_target = Some(target);
        for j in frame.pending_quit.drain(..) {
            buf.get_mut(j).jump_to = Some(target);
        }
    }

    /// Emits (or reuses) a jump to the innermost loop's continue target,
    /// for `Stmt::Next`. If the target isn't positioned yet, the jump is
    /// left with no `jump_to` and queued for `resolve_next_target`.
    pub fn lower_next(&mut self, buf: &mut crate::ir::buf::Buf) {
        let hidden_now = self.hidden_depth;
        let frame = self.loop_stack.last().expect("Next statement outside a loop");
        let delta = hidden_now - frame.depth_in_body;
        let target = frame.next_target;
        emit_depth_pop(buf, delta);
        let mut op = Op::new(crate::ir::op::OpKind::Jump);
        op.jump_to = target;
        let r = buf.append(op);
        if target.is_none() {
            self.loop_stack.last_mut().unwrap().pending_next.push(r);
        }
    }

    /// Emits (or reuses) a jump to the innermost loop's quit target, for
    /// `Stmt::Quit`.
    pub fn lower_quit(&mut self, buf: &mut crate::ir::buf::Buf) {
        let hidden_now = self.hidden_depth;
        let frame = self.loop_stack.last().expect("Quit statement outside a loop");
        let delta = hidden_now - frame.depth_at_entry;
        let target = frame.quit_target;
        emit_depth_pop(buf, delta);
        let mut op = Op::new(crate::ir::op::OpKind::Jump);
        op.jump_to = target;
        let r = buf.append(op);
        if target.is_none() {
            self.loop_stack.last_mut().unwrap().pending_quit.push(r);
        }
    }

    pub fn record_goto(&mut self, jump_op: OpRef, name: Rc<str>) {
        let loc = self.loc;
        let depth = self.hidden_depth;
        self.pending_gotos.push(PendingGoto {
            jump_op,
            name,
            loc,
            depth_at_goto: depth,
        });
    }
}

/// Emits a single `Pop` covering `delta` hidden-variable cells, if any, to
/// restore the stack invariant a `next`/`quit`/`goto` jump must cross.
fn emit_depth_pop(buf: &mut crate::ir::buf::Buf, delta: u32) {
    if delta > 0 {
        let mut pop = Op::new(crate::ir::op::OpKind::Pop);
        pop.data = crate::ir::op::OpData::Int(delta as i32);
        buf.append(pop);
    }
}

/// Registers every module up front (so cross-module `OBJ` references and
/// sub-object tables resolve regardless of declaration order), then lowers
/// each module's functions and `DAT` relocations.
pub fn lower_program(ast_modules: &[AstModule], settings: &Settings) -> (Program, DiagnosticSink) {
    log::debug!("lowering {} module(s)", ast_modules.len());
    let mut program = Program::new();
    let mut name_to_id: HashMap<Rc<str>, ModuleId> = HashMap::new();
    let mut sink = DiagnosticSink::new();

    for ast in ast_modules {
        let mut module = Module::new(ast.name.clone());
        for f in &ast.functions {
            module.add_function(Function::new(f.name.clone(), f.num_params, f.num_results), f.is_public);
        }
        let id = program.add_module(module);
        name_to_id.insert(ast.name.clone(), id);
    }

    for (ast, module_id) in ast_modules.iter().zip(program.modules.keys().collect::<Vec<_>>()) {
        for obj in &ast.objects {
            let Some(&target) = name_to_id.get(&obj.target_module) else {
                continue; // unresolved sub-object name: front end's problem, not ours
            };
            let module = &mut program.modules[module_id];
            for array_index in 0..obj.count.max(1) {
                if module.add_sub_object(target, array_index).is_none() {
                    sink.error(
                        SourceLoc { module: Some(module_id), func: None, line: 0 },
                        crate::result::LowerError::TooManySubObjects,
                    );
                    break;
                }
            }
        }

        {
            let module = &mut program.modules[module_id];
            module.dat = ast.dat.bytes.clone();
            for reloc in &ast.dat.relocs {
                if reloc.kind == DatRelocKind::Debug {
                    continue; // debug-info only, not an address patched in the image
                }
                // A DAT-internal reloc carries no module reference of its
                // own; every one seen so far is a reference to a label
                // within the same DAT block, so it's resolved against this
                // module's own `compiled_address` once known.
                module.add_relocation(reloc.offset, module_id, RelocKind::DatBase);
            }
        }

        for (i, f) in ast.functions.iter().enumerate() {
            let func_id = FuncId::new(i);
            let mut ctx = LowerContext::new(module_id, func_id, settings);
            let mut buf = crate::ir::buf::Buf::new();
            stmt::lower_block(&mut ctx, &mut buf, &f.body);
            if !matches!(f.body.last(), Some(crate::ir::ast::Stmt::Return(_))) {
                buf.append(Op::new(crate::ir::op::OpKind::ReturnPlain));
            }
            labels::resolve_named_labels(&mut buf, &ctx.pending_gotos_view(), &mut ctx.sink);
            buf.append_pending();

            let module = &mut program.modules[module_id];
            let func = &mut module.functions[func_id];
            func.num_locals = f.num_locals;
            func.local_size = f.num_params + f.num_locals;
            func.body = buf;

            sink = merge_sink(sink, ctx.sink);
        }
    }

    if sink.has_errors() {
        log::warn!("lowering finished with {} error(s)", sink.error_count());
    }
    (program, sink)
}

fn merge_sink(mut a: DiagnosticSink, b: DiagnosticSink) -> DiagnosticSink {
    for d in b.diagnostics() {
        match d.severity {
            crate::result::Severity::Error => a.error(d.loc, clone_lower_error(&d.error)),
            crate::result::Severity::Warning => a.warning(d.loc, clone_lower_error(&d.error)),
        }
    }
    a
}

/// `LowerError` doesn't derive `Clone` (its `Fail` derive doesn't need it),
/// so diagnostics collected per-function are re-described when merged into
/// the program-wide sink.
fn clone_lower_error(e: &crate::result::LowerError) -> crate::result::LowerError {
    use crate::result::LowerError::*;
    match e {
        TooManyMethods => TooManyMethods,
        TooManySubObjects => TooManySubObjects,
        DuplicateCaseValue { value } => DuplicateCaseValue { value: *value },
        ConditionalDepthMismatch { label } => ConditionalDepthMismatch { label: label.clone() },
        UndefinedLabel { label } => UndefinedLabel { label: label.clone() },
        ValueOutOfRange { value } => ValueOutOfRange { value: *value },
        StringTooLong { len } => StringTooLong { len: *len },
    }
}

impl LowerContext {
    fn pending_gotos_view(&self) -> Vec<(OpRef, Rc<str>, SourceLoc, u32)> {
        self.pending_gotos
            .iter()
            .map(|g| (g.jump_op, g.name.clone(), g.loc, g.depth_at_goto))
            .collect()
    }
}
