//! End-to-end pipeline tests: small Spin-shaped programs built directly
//! against `ir::ast`, run through `lower::lower_program`, `optimize`, and
//! `binemit::emit_program`/`emit_module`, checked against the wire-level
//! opcode constants in `isa::spin1::constants`.

use p1bc::ir::ast::{AstFunction, AstModule, BinOp, DatBlock, Expr, ObjectDecl, Stmt, Symbol, UnOp, ValueSize};
use p1bc::ir::entities::{FuncId, ModuleId};
use p1bc::ir::op::OpKind;
use p1bc::isa::spin1::constants::{CALL_OTHER, RETURN_PLAIN};
use p1bc::lower::lower_program;
use p1bc::optimize::optimize;
use p1bc::settings::Settings;
use p1bc_entity::EntityRef;

fn local(offset: i32) -> Symbol {
    Symbol::Local { offset, size: ValueSize::Long }
}

fn module(name: &str, functions: Vec<AstFunction>, objects: Vec<ObjectDecl>) -> AstModule {
    AstModule { name: name.into(), functions, dat: DatBlock::default(), objects }
}

fn func(name: &str, num_params: u32, num_results: u32, num_locals: u32, is_public: bool, body: Vec<Stmt>) -> AstFunction {
    AstFunction { name: name.into(), num_params, num_results, num_locals, is_public, body }
}

/// (a) An empty public method lowers to nothing but the implicit
/// plain-return lowering adds, and the module image is just the header,
/// a one-entry method table, and that single byte.
#[test]
fn empty_public_method_emits_header_and_bare_return() {
    let modules = [module("Main", vec![func("main", 0, 0, 0, true, vec![])], vec![])];
    let settings = Settings::default();

    let (program, sink) = lower_program(&modules, &settings);
    assert!(!sink.has_errors());

    let body = &program.modules[ModuleId::new(0)].functions[FuncId::new(0)].body;
    let kinds: Vec<OpKind> = body.iter().map(|r| body.get(r).kind).collect();
    assert_eq!(kinds, vec![OpKind::ReturnPlain]);

    let image = p1bc::binemit::emit_program(&program, &settings).unwrap();
    // header prefix (4 bytes) + one method-table entry (4 bytes) + one
    // body byte (return-plain).
    assert_eq!(image.len(), 9);
    assert_eq!(image[2], 0x02); // pub(1) + pri(0) + 1
    assert_eq!(image[3], 0x00); // no sub-objects
    assert_eq!(image[8], RETURN_PLAIN);
}

/// (b)/(f) `x := <expr>; return x` lowers to a write immediately
/// shadowed by a read of the same location, which the optimizer's
/// write-then-read contraction (§4.5 pass 5) folds into a single
/// modify-and-push, leaving no redundant read behind.
#[test]
fn write_then_read_of_same_local_contracts_after_optimizing() {
    let x = local(0);
    let y = local(4);
    let body = vec![
        Stmt::Assign {
            targets: vec![Expr::Read(x.clone())],
            op: None,
            reverse: false,
            value: Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(Expr::Read(y)),
                rhs: Box::new(Expr::IntConst(1)),
            },
        },
        Stmt::Return(Some(Expr::Read(x))),
    ];
    let modules = [module("Main", vec![func("main", 0, 1, 2, true, body)], vec![])];
    let settings = Settings::default();

    let (mut program, sink) = lower_program(&modules, &settings);
    assert!(!sink.has_errors());

    let buf = &mut program.modules[ModuleId::new(0)].functions[FuncId::new(0)].body;
    let before: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
    assert!(before.contains(&OpKind::MemWrite));
    assert!(before.contains(&OpKind::MemRead));
    assert_eq!(before.last(), Some(&OpKind::ReturnPop));

    optimize(buf, &settings).unwrap();
    let after: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
    assert!(!after.contains(&OpKind::MemRead), "redundant read of x should have been contracted away: {:?}", after);
    assert!(after.contains(&OpKind::MemModify));
    assert_eq!(after.last(), Some(&OpKind::ReturnPop));
}

/// (c) `repeat 3  i++` pushes the trip count once, skips the body
/// entirely on a zero count, then loops with an ordinary backward jump:
/// this crate's repeat-count lowering, unlike the legacy djnz-counted
/// form, keeps the trip count live as a hidden stack value for the whole
/// loop rather than folding the decrement into the branch instruction.
#[test]
fn short_repeat_loop_structure() {
    let i = local(0);
    let body = vec![Stmt::RepeatCount {
        count: Expr::IntConst(3),
        body: vec![Stmt::Expr(Expr::Unary { op: UnOp::PostInc, operand: Box::new(Expr::Read(i)) })],
    }];
    let modules = [module("Main", vec![func("main", 0, 0, 1, true, body)], vec![])];
    let settings = Settings::default();

    let (program, sink) = lower_program(&modules, &settings);
    assert!(!sink.has_errors());

    let buf = &program.modules[ModuleId::new(0)].functions[FuncId::new(0)].body;
    let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
    assert_eq!(
        kinds,
        vec![
            OpKind::Constant,
            OpKind::JumpTjz,
            OpKind::Label,
            OpKind::MemModify,
            OpKind::Pop,
            OpKind::Label,
            OpKind::Jump,
            OpKind::Label,
            OpKind::ReturnPlain,
        ]
    );
}

/// (e) A call through a sub-object emits an anchor, then `call-other`
/// with the callee's module-local object id and function id as its two
/// operand bytes, no relocation needed, since both ids are assigned
/// module-locally and the target module's address never appears inline.
#[test]
fn cross_module_call_emits_call_other_with_obj_and_func_ids() {
    let callee = func("foo", 0, 0, 0, true, vec![]);
    let caller_body = vec![Stmt::Expr(Expr::Call {
        callee: Symbol::Function { module_local_id: 0, obj: Some(0) },
        args: vec![],
        num_results: 0,
    })];
    let modules = [
        module("Main", vec![func("main", 0, 0, 0, true, caller_body)], vec![ObjectDecl { target_module: "A".into(), count: 1 }]),
        module("A", vec![callee], vec![]),
    ];
    let settings = Settings::default();

    let (program, sink) = lower_program(&modules, &settings);
    assert!(!sink.has_errors());

    let buf = &program.modules[ModuleId::new(0)].functions[FuncId::new(0)].body;
    let kinds: Vec<OpKind> = buf.iter().map(|r| buf.get(r).kind).collect();
    assert!(kinds.contains(&OpKind::Anchor));
    assert!(kinds.contains(&OpKind::CallOther));

    let image = p1bc::binemit::emit_program(&program, &settings).unwrap();
    let call_pos = image.windows(3).position(|w| w[0] == CALL_OTHER).expect("call-other byte not found in image");
    assert_eq!(image[call_pos + 1], 0); // obj id 0: the caller's only sub-object
    assert_eq!(image[call_pos + 2], 0); // func id 0: A's only method
}

/// `compile` is the one-call convenience path: it refuses to emit an
/// image once lowering reported an error, returning the diagnostics
/// instead of a half-built program.
#[test]
fn compile_stops_before_emission_on_lowering_errors() {
    let arms = vec![
        p1bc::ir::ast::CaseArm { values: vec![1], range: None, body: vec![] },
        p1bc::ir::ast::CaseArm { values: vec![1], range: None, body: vec![] },
    ];
    let body = vec![Stmt::Case { selector: Expr::Read(local(0)), arms, other: None }];
    let modules = [module("Main", vec![func("main", 0, 0, 1, true, body)], vec![])];

    let result = p1bc::compile(&modules, &Settings::default());
    let err = result.expect_err("duplicate case values should be reported, not silently compiled");
    let sink = err.diagnostics().expect("failure should be a lowering diagnostic, not a codegen error");
    assert!(sink.has_errors());
}
