//! The bytecode intermediate representation: tagged instruction records
//! (`Op`) held in a per-function arena (`Buf`) and indexed by stable
//! `OpRef` handles, plus the `Function`/`Module`/`Program` containers that
//! hold compiled output, and the `ast` module describing what the lowering
//! layer expects from the front end.

pub mod ast;
pub mod buf;
pub mod entities;
pub mod function;
pub mod module;
pub mod op;
pub mod program;

pub use ast::{AstFunction, AstModule, BinOp, Expr, Stmt, Symbol, UnOp};
pub use buf::Buf;
pub use entities::{FuncId, JumpTableId, ModuleId, ObjId, OpRef};
pub use function::Function;
pub use module::{Module, RelocKind, Relocation};
pub use op::{Attrs, MathOpKind, MemBase, MemOpAttrs, MemSize, ModifyOp, Op, OpData, OpKind};
pub use program::Program;
