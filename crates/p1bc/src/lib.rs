//! Bytecode back end for the Spin-family compiler: lowers a type-checked
//! AST (`ir::ast`) into this crate's own IR (`ir::Buf`/`ir::Op`), runs the
//! peephole optimizer (`optimize`) to a fixpoint, and emits a relocatable
//! P1 interpreter bytecode image (`binemit`) ready to load onto the VM.

#![deny(trivial_numeric_casts, unused_extern_crates)]
#![warn(missing_docs)]
#![warn(unused_import_braces)]

pub mod binemit;
pub mod cursor;
pub mod ir;
pub mod isa;
pub mod lower;
pub mod module_layout;
pub mod optimize;
pub mod print_errors;
pub mod result;
pub mod settings;

pub use crate::ir::ast::AstModule;
pub use crate::ir::program::Program;
pub use crate::result::{
    CodegenError, CodegenResult, CompileError, Diagnostic, DiagnosticSink, LowerError, LowerResult,
};
pub use crate::settings::Settings;

/// Runs the whole pipeline front-to-back: lower every module's AST,
/// optimize each function's body to a fixpoint, and emit the linked
/// program image. Stops before emission if lowering reported any errors,
/// since a program with unresolved diagnostics has no well-defined image.
/// Optimizer non-convergence and emission failure are real, reachable
/// outcomes on pathological-but-valid input, not internal invariant
/// violations, so both are returned as a `CompileError` rather than
/// panicking.
///
/// This is the convenience path a driver with nothing unusual to do
/// reaches for; one that needs the intermediate `Program` (to run its own
/// diagnostics pass, or to write a listing) should call `lower::lower_program`,
/// `optimize::optimize`, and `binemit::emit_program` directly instead.
pub fn compile(ast_modules: &[AstModule], settings: &Settings) -> Result<Vec<u8>, CompileError> {
    let (mut program, sink) = lower::lower_program(ast_modules, settings);
    if sink.has_errors() {
        return Err(sink.into());
    }

    for module in program.modules.values_mut() {
        for func in module.functions.values_mut() {
            optimize::optimize(&mut func.body, settings)?;
        }
    }

    Ok(binemit::emit_program(&program, settings)?)
}

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
