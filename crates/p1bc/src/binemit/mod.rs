//! Turning a lowered, optimized `Buf` into final bytes: distance queries
//! (`jump_offset`), the size-resolution fixpoint (`size_resolve`), and
//! whole-module/whole-program assembly (`emit`).

pub mod emit;
pub mod jump_offset;
pub mod size_resolve;

pub use emit::{emit_module, emit_program, EmittedModule};
pub use size_resolve::resolve_sizes;
