//! The front-end contract: the decorated AST this crate expects to
//! receive from an already-parsed, already-type-checked Spin-family
//! program, expressed as an external collaborator (source parsing, name
//! resolution, and type inference are out of scope for this crate).
//!
//! Every name here is resolved: identifiers are not strings to look up but
//! `Symbol` values already classified by the front end's symbol table, and
//! every expression node already carries the type information the lowering
//! layer needs to pick encodings. This module defines only the subset of
//! AST shape `lower` actually consumes.

use std::rc::Rc;

/// A binary math operator as the front end names it, before lowering
/// canonicalizes it into a `MathOpKind` wire op (§4.4) and possibly
/// rewrites unsigned comparisons to the signed+bias form.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    Shl,
    ShrS,
    ShrU,
    Rol,
    Rev,
    BitAnd,
    BitOr,
    BitXor,
    LogicAnd,
    LogicOr,
    Min,
    Max,
    CmpEq,
    CmpNe,
    CmpLtS,
    CmpLtU,
    CmpLeS,
    CmpLeU,
    CmpGtS,
    CmpGtU,
    CmpGeS,
    CmpGeU,
    LimitMin,
    LimitMax,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Abs,
    BitNot,
    LogicNot,
    Sqrt,
    Encode,
    Decode,
    PreInc,
    PostInc,
    PreDec,
    PostDec,
    RandForward,
    RandBackward,
    SignExtendByte,
    SignExtendWord,
}

/// An already-resolved reference into the front end's symbol table. The
/// lowering layer (`lower::memop`) classifies these into the four memory
/// operand shapes named in §4.4: plain memory, plain register, register
/// single bit, register bit range.
#[derive(Clone, Debug)]
pub enum Symbol {
    /// `DAT`-block label, addressed PBASE-relative.
    DatLabel { offset: i32 },
    /// Module-level `VAR`, addressed VBASE-relative (or frame-relative if
    /// captured by a closure, per §4.4's closure note).
    ModuleVar { offset: i32, size: ValueSize },
    /// Local variable or parameter, DBASE-relative.
    Local { offset: i32, size: ValueSize },
    /// A hardware register (`PAR`, `CNT`, `INA`, ...), optionally a single
    /// bit or bit-range within it.
    HwRegister {
        address: u32,
        bit: Option<BitSelector>,
    },
    /// A callable function, either in the current module or (with `obj`
    /// set) through a sub-object.
    Function { module_local_id: u32, obj: Option<u32> },
    /// A compiler builtin (`waitcnt`, `strlen`, `lockset`, ...), named so
    /// `lower::call` can match on it directly rather than re-deriving
    /// intent from argument shape.
    Builtin(Builtin),
}

#[derive(Copy, Clone, Debug)]
pub struct BitSelector {
    pub low: u8,
    /// `None` for a single-bit selector; `Some(high)` for a range.
    pub high: Option<u8>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueSize {
    Byte,
    Word,
    Long,
    /// An 8-byte value (e.g. `int64`), lowered as two long operations with
    /// a +4 base offset between them (§4.4).
    Long2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    WaitCnt,
    WaitPeq,
    WaitPne,
    WaitVid,
    LockNew,
    LockRet,
    LockSet,
    LockClr,
    StrLen,
    StrComp,
    ByteFill,
    WordFill,
    LongFill,
    ByteMove,
    WordMove,
    LongMove,
    CogInit,
    CogStop,
    Reboot,
    ClkSet,
}

/// An expression node. Already type-checked; `lower::expr` only needs to
/// pick encodings and canonicalize operand order, not re-derive types.
#[derive(Clone, Debug)]
pub enum Expr {
    IntConst(i32),
    StringConst(Rc<str>),
    Read(Symbol),
    Index { base: Box<Expr>, index: Box<Expr> },
    /// A resolved member access through a sub-object (`obj.field`); the
    /// object id is folded into the inner `Symbol::Function`/`DatLabel`
    /// by the front end, so this variant only remains for array-object
    /// member access where the index isn't known until lowering.
    ObjIndex { obj: Box<Expr>, index: Box<Expr> },
    Unary { op: UnOp, operand: Box<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { callee: Symbol, args: Vec<Expr>, num_results: u8 },
    /// Indirect call through a function-pointer value (lowered to a
    /// runtime helper call per §4.4).
    CallIndirect { pointer: Box<Expr>, args: Vec<Expr>, num_results: u8 },
    Builtin { builtin: Builtin, args: Vec<Expr> },
}

/// An assignable location: everything `Expr::Read` can name, since Spin
/// allows assigning to any lvalue-shaped read expression.
pub type LValue = Expr;

#[derive(Clone, Debug)]
pub enum Stmt {
    Expr(Expr),
    /// `targets[0], targets[1], ... := op value`. `op` is `None` for a
    /// plain assignment and `Some` for a compound assignment the front end
    /// has already identified as `x := x op y` or `x := y op x`
    /// (`reverse` distinguishes the two), lowering decides whether this
    /// collapses into a single modify op (§4.4).
    Assign {
        targets: Vec<LValue>,
        op: Option<BinOp>,
        reverse: bool,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    While { cond: Expr, body: Vec<Stmt> },
    DoWhile { body: Vec<Stmt>, cond: Expr },
    For {
        init: Box<Stmt>,
        cond: Expr,
        next: Box<Stmt>,
        body: Vec<Stmt>,
    },
    RepeatCount { count: Expr, body: Vec<Stmt> },
    RepeatRange {
        var: Symbol,
        from: Expr,
        to: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    RepeatForever { body: Vec<Stmt> },
    Case {
        selector: Expr,
        arms: Vec<CaseArm>,
        other: Option<Vec<Stmt>>,
    },
    Label(Rc<str>),
    Goto(Rc<str>),
    Return(Option<Expr>),
    Abort(Option<Expr>),
    Quit,
    Next,
}

#[derive(Clone, Debug)]
pub struct CaseArm {
    /// Constant values this arm matches; a range `a..b` is expanded by the
    /// front end into the explicit value set before reaching this crate,
    /// except where that set would be absurdly large, in which case a
    /// `CaseRange` hint is preserved via `range` for §4.6's table builder.
    pub values: Vec<i32>,
    pub range: Option<(i32, i32)>,
    pub body: Vec<Stmt>,
}

/// One function as the front end hands it over: a flat parameter/local
/// layout (DBASE offsets already assigned) and a statement list.
#[derive(Clone, Debug)]
pub struct AstFunction {
    pub name: Rc<str>,
    pub num_params: u32,
    pub num_results: u32,
    pub num_locals: u32,
    pub is_public: bool,
    pub body: Vec<Stmt>,
}

/// One `DAT`-internal relocation: a long-sized absolute reference to
/// another symbol, patched in after both addresses are known. Matches the
/// `{kind, symbol, offset, symbolOffset}` shape named in §3; `kind` is
/// narrowed to the two cases this back end actually patches.
#[derive(Clone, Debug)]
pub struct DatReloc {
    pub kind: DatRelocKind,
    pub offset: u32,
    pub symbol_offset: i32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DatRelocKind {
    Abs32,
    Debug,
}

#[derive(Clone, Debug, Default)]
pub struct DatBlock {
    pub bytes: Vec<u8>,
    pub relocs: Vec<DatReloc>,
}

/// One source module as the front end hands it over.
#[derive(Clone, Debug)]
pub struct AstModule {
    pub name: Rc<str>,
    pub functions: Vec<AstFunction>,
    pub dat: DatBlock,
    /// Sub-object declarations in source order; `count` is `1` for a plain
    /// `OBJ x : "m"` and the array length for `OBJ x[4] : "m"`.
    pub objects: Vec<ObjectDecl>,
}

#[derive(Clone, Debug)]
pub struct ObjectDecl {
    pub target_module: Rc<str>,
    pub count: u32,
}
