//! The BCIR instruction record (`Op`) and its closed set of opcode kinds.
//!
//! Grounded in `backends/bytecode/bcir.h`'s `ByteOpIR` / `BYTE_OP_KINDS_XMACRO`
//! / `MATH_OP_KINDS_XMACRO` from the original `spin2cpp` bytecode back end;
//! restructured from a tagged C union into a Rust enum-of-variants so the
//! encoder and size-bounds routines (`isa::spin1`) get exhaustiveness
//! checking for free instead of relying on manual discipline around a
//! `kind`-discriminated `union attr`.

use crate::ir::entities::{FuncId, ModuleId, ObjId, OpRef};
use std::fmt;

/// Where a memory operand's base address comes from.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemBase {
    /// Address popped off the stack.
    Pop,
    /// PBASE-relative: a `DAT` label.
    PBase,
    /// VBASE-relative: a module variable.
    VBase,
    /// DBASE-relative: a local, parameter, or hidden stack slot.
    DBase,
}

/// The width of a memory or register operand.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemSize {
    Bit,
    Byte,
    Word,
    Long,
}

/// Secondary opcode for `MemModify`/`RegModify` ops and for the standalone
/// `MathOp`. Order matches `bc_spin1.c: MathOp_to_ID_Spin1`'s 5-bit
/// encoding table exactly, so the Spin1 encoder can derive the wire value
/// with a single array lookup instead of a match arm per variant.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MathOpKind {
    Ror,
    Rol,
    Shr,
    Shl,
    Min,
    Max,
    Neg,
    BitNot,
    BitAnd,
    Abs,
    BitOr,
    BitXor,
    Add,
    Sub,
    Sar,
    Rev,
    LogicAnd,
    Encode,
    LogicOr,
    Decode,
    MulLow,
    MulHigh,
    Divide,
    Remainder,
    Sqrt,
    CmpB,
    CmpA,
    CmpNe,
    CmpE,
    CmpBe,
    CmpAe,
    BoolNot,

    /// Write-back only, no transform (`x := y` contracted into a modify).
    Write,
    /// The `repeat from..to step..` loop variable step+compare+branch; both
    /// a modify op and a conditional jump (`Op::jump_to` is set).
    RepeatStep,
    // Pre/post inc/dec, random fwd/back, sign-extend, post-clear/set: all
    // unary modify-only operators that don't correspond to a binary
    // `MathOp` wire opcode, tracked by `ModifyOp` instead.
}

impl MathOpKind {
    /// 5-bit wire value for a binary/unary `MathOp`, per `MathOp_to_ID_Spin1`.
    /// `Write` and `RepeatStep` are not real math ops and have no encoding
    /// here (they're handled as `ModifyOp` kinds in the Spin1 encoder).
    pub fn wire_bits(self) -> Option<u8> {
        use MathOpKind::*;
        Some(match self {
            Ror => 0b00000,
            Rol => 0b00001,
            Shr => 0b00010,
            Shl => 0b00011,
            Min => 0b00100,
            Max => 0b00101,
            Neg => 0b00110,
            BitNot => 0b00111,
            BitAnd => 0b01000,
            Abs => 0b01001,
            BitOr => 0b01010,
            BitXor => 0b01011,
            Add => 0b01100,
            Sub => 0b01101,
            Sar => 0b01110,
            Rev => 0b01111,
            LogicAnd => 0b10000,
            Encode => 0b10001,
            LogicOr => 0b10010,
            Decode => 0b10011,
            MulLow => 0b10100,
            MulHigh => 0b10101,
            Divide => 0b10110,
            Remainder => 0b10111,
            Sqrt => 0b11000,
            CmpB => 0b11001,
            CmpA => 0b11010,
            CmpNe => 0b11011,
            CmpE => 0b11100,
            CmpBe => 0b11101,
            CmpAe => 0b11110,
            BoolNot => 0b11111,
            Write | RepeatStep => return None,
        })
    }

    /// True for unary operators (`neg`, `abs`, `sqrt`, `bitnot`, ...), used
    /// by assignment lowering to pick the unary modify form (§4.4).
    pub fn is_unary(self) -> bool {
        use MathOpKind::*;
        matches!(
            self,
            Neg | BitNot | Abs | BoolNot | Sqrt | Encode | Decode
        )
    }
}

/// Extra modify-only operators that ride on `MemModify`/`RegModify` ops
/// alongside (or instead of) a `MathOpKind`. These correspond to the
/// `MOK_MOD_*` members of the original `MathOpKind` enum, split out here
/// because they take a distinct packed encoding (`bc_spin1.c`'s modify
/// sub-opcode table) rather than the 5-bit math-op table.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModifyOp {
    Write,
    RepeatStep,
    RandForward,
    RandBackward,
    SignExtendByte,
    SignExtendWord,
    PreInc,
    PostInc,
    PreDec,
    PostDec,
    PostClear,
    PostSet,
    /// A full binary/unary `MathOpKind`, applied in place.
    Math(MathOpKind),
}

impl ModifyOp {
    /// Whether this modify naturally leaves a useful value on the stack
    /// without an explicit `pushModifyResult` flag, used by optimizer pass
    /// 6 (modify-then-read contraction, §4.5).
    pub fn pushes_result_by_default(self) -> bool {
        matches!(self, ModifyOp::PreInc | ModifyOp::PreDec | ModifyOp::Write)
    }
}

/// Attributes for a memory or register access op (`MemRead`/`MemWrite`/
/// `MemModify`/`MemAddress` and their `Reg*`/`RegBit*`/`RegBitRange*`
/// counterparts).
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug)]
pub struct MemOpAttrs {
    pub base: MemBase,
    pub mem_size: MemSize,
    /// In Spin1, a modify op's *operand* size can differ from its *memory*
    /// size (e.g. sign-extending a byte into a long accumulator).
    pub mod_size: MemSize,
    /// The effective address is computed by adding a popped index to the
    /// base offset (array indexing), rather than being a compile-time
    /// constant offset.
    pub pop_index: bool,
    /// For `MemModify`: leave the (old or new) value on the stack.
    pub push_modify_result: bool,
    /// For `MemModify` with a binary `MathOpKind`: operands are swapped
    /// (`x := y op x` instead of `x := x op y`).
    pub reverse_math: bool,
    /// Only meaningful for `ModifyOp::RepeatStep`: pop the step value from
    /// the stack rather than using a compile-time constant.
    pub repeat_pop_step: bool,
}

impl Default for MemOpAttrs {
    fn default() -> Self {
        MemOpAttrs {
            base: MemBase::DBase,
            mem_size: MemSize::Long,
            mod_size: MemSize::Long,
            pop_index: false,
            push_modify_result: false,
            reverse_math: false,
            repeat_pop_step: false,
        }
    }
}

/// Attributes for `Anchor` (call-frame set-up).
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Default)]
pub struct AnchorAttrs {
    pub with_result: bool,
    pub rescue_abort: bool,
}

/// Attributes for `CallSelf`/`CallOther`/`CallOtherIndexed`.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug)]
pub struct CallAttrs {
    pub func: FuncId,
    /// `None` for `CallSelf`.
    pub obj: Option<ObjId>,
    pub num_results: u8,
}

/// Which hardware wait opcode a `Wait` op lowers to.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitKind {
    WaitPeq,
    WaitPne,
    WaitCnt,
    WaitVid,
}

/// Which lock opcode a `Lock*` op lowers to.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockKind {
    New,
    Ret,
    Set,
    Clr,
}

/// Attributes for `Coginit`/`CoginitPrepare`/`Lock*`: all share the
/// single "optionally push a result" shape from `bc_bedata.h`'s anonymous
/// `coginit` struct.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Default)]
pub struct PushResultAttrs {
    pub push_result: bool,
}

/// Attributes for `FundataPushAddress`.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Default)]
pub struct PushAddressAttrs {
    pub add_pbase: bool,
    pub for_jump: bool,
}

/// Attributes for conditional jumps, tracking whether control can reach the
/// fallthrough at all (used by the optimizer's dead-code pass, §4.5 pass 1).
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Default)]
pub struct CondJumpAttrs {
    pub logically_terminal: bool,
}

/// Kind-dependent attribute payload. A Rust sum type standing in for the
/// original `union attr` selected by `ByteOpKind`; the encoder and
/// size-bounds routines match on `Op::kind` and can therefore assume which
/// variant of `Attrs` is present (enforced by the `attrs_memop`-style
/// accessor helpers on `Op`, which panic on kind mismatch rather than
/// silently reading garbage as the C union would).
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug)]
pub enum Attrs {
    None,
    MemOp(MemOpAttrs),
    Call(CallAttrs),
    Anchor(AnchorAttrs),
    Wait(WaitKind),
    Lock { kind: LockKind, push_result: bool },
    PushResult(PushResultAttrs),
    PushAddress(PushAddressAttrs),
    CondJump(CondJumpAttrs),
    Returninfo { num_results: u8 },
    /// Byte length of a `FundataString` literal.
    StringLength(usize),
    /// Byte/word/long size and fill-vs-move flag for `BuiltinBulkMem`.
    BulkMem { size: MemSize, is_move: bool },
    /// A module-relative function reference for `ConstantFuncRef`.
    FuncRef { module: ModuleId, func: FuncId },
    /// A module-relative DAT reference for `ConstantDatRef`.
    DatRef { module: ModuleId },
    /// Hidden-variable depth recorded at a named label, so the label
    /// resolution pass (§4.1) can check and pop across jumps (set only on
    /// `Label`/`NamedLabel` ops).
    LabelDepth(u32),
}

/// The closed set of BCIR opcode kinds, one-to-one with
/// `BYTE_OP_KINDS_XMACRO` in `bcir.h`.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpKind {
    /// Virtual jump target; zero bytes, resolved by label resolution.
    Label,
    /// Intermediate named label (`NamedLabel`), rewritten away by
    /// `lower::labels::resolve_named_labels` before size resolution runs.
    NamedLabel,
    /// Pad to the next word/long boundary; size depends on final address.
    Align,

    Constant,
    ConstantFuncRef,
    ConstantDatRef,

    /// Pop `N` longs (`N` is `Op::data` as an int).
    Pop,

    ReturnPlain,
    ReturnPop,
    AbortPlain,
    AbortPop,

    MemRead,
    MemWrite,
    MemModify,
    MemAddress,

    FundataPushAddress,
    FundataLookupJump,
    FundataString,
    FundataJumpEntry,

    Anchor,

    CallSelf,
    CallOther,
    CallOtherIdx,

    Jump,
    JumpTjz,
    JumpDjnz,
    JumpIfZ,
    JumpIfNz,

    MathOp,

    RegRead,
    RegWrite,
    RegModify,
    RegBitRead,
    RegBitWrite,
    RegBitModify,
    RegBitRangeRead,
    RegBitRangeWrite,
    RegBitRangeModify,

    Case,
    CaseRange,
    /// Pops the hidden case selector, then pops and jumps to the computed
    /// target address (result of `FundataLookupJump`).
    CaseDone,
    Lookup,
    Lookdown,
    LookupRange,
    LookdownRange,
    /// Pops the hidden lookup-end return address and jumps to it.
    Lookend,

    BuiltinStrsize,
    BuiltinStrcomp,
    BuiltinBulkmem,

    Coginit,
    CoginitPrepare,
    Cogstop,

    Locknew,
    Lockret,
    Lockset,
    Lockclr,

    Wait,
    /// P1-only: set clock mode/frequency, used by `clkset` and the
    /// `reboot()` builtin's synthetic `clkset(128, 0)`.
    Clkset,
}

impl OpKind {
    /// True for ops after which control never falls through: the dead-code
    /// pass (§4.5 pass 1) deletes everything between one of these and the
    /// next label.
    pub fn is_unconditional_terminal(self) -> bool {
        use OpKind::*;
        matches!(
            self,
            Jump | ReturnPlain | ReturnPop | AbortPlain | AbortPop | CaseDone | Lookend
        )
    }

    /// True for the one-byte terminal ops that "replace jump to terminal"
    /// (§4.5 pass 10) can substitute in place of a jump.
    pub fn is_one_byte_terminal(self) -> bool {
        use OpKind::*;
        matches!(self, ReturnPlain | ReturnPop | AbortPlain | AbortPop | CaseDone | Lookend)
    }

    /// True for conditional jump kinds; `Op::jump_to` is always `Some` for
    /// these plus the unconditional forms.
    pub fn is_conditional_jump(self) -> bool {
        use OpKind::*;
        matches!(self, JumpTjz | JumpDjnz | JumpIfZ | JumpIfNz)
    }

    /// True for any op that carries a `jump_to` reference (jumps, branch
    /// ops, and anything that takes the address of a label).
    pub fn uses_jump_to(self) -> bool {
        use OpKind::*;
        self.is_conditional_jump()
            || matches!(
                self,
                Jump | FundataPushAddress | FundataLookupJump | FundataJumpEntry
            )
    }
}

/// One instruction or label record in a function's BCIR buffer.
///
/// `data` corresponds to the original `union { int32_t int32; const char
/// *stringPtr; }`; we use an explicit `OpData` enum instead of an untagged
/// union, since `kind` alone doesn't tell a safe caller which variant is
/// live the way it does in C.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct Op {
    pub kind: OpKind,
    pub math_kind: Option<MathOpKind>,
    pub modify_kind: Option<ModifyOp>,
    pub attrs: Attrs,
    pub data: OpData,
    /// The label this op jumps to or otherwise references. Never an owning
    /// reference, removing the referenced label without fixing this up is
    /// a dangling-jump bug the verifier (§8 property 3) catches.
    pub jump_to: Option<OpRef>,
    pub prev: Option<OpRef>,
    pub next: Option<OpRef>,
    /// -1 (`None`) while undetermined; the final encoded byte length once
    /// the size resolver (§4.7) has run.
    pub fixed_size: Option<u32>,
    /// Source location, for diagnostics; not interpreted by this crate.
    pub srcloc: Option<u32>,
}

/// The payload of an `Op`. `Constant`/`Pop`/etc. carry `Int`; string
/// literals carry `Str` (interned in the function's string pool, addressed
/// by its pending `FundataString` op rather than copied).
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpData {
    None,
    Int(i32),
    Str(std::rc::Rc<str>),
}

impl OpData {
    pub fn as_int(&self) -> i32 {
        match self {
            OpData::Int(i) => *i,
            _ => panic!("Op::data is not an integer"),
        }
    }
}

impl Op {
    /// Build a bare op with no attributes, jump target, or known size,
    /// the starting point every lowering helper refines.
    pub fn new(kind: OpKind) -> Self {
        Op {
            kind,
            math_kind: None,
            modify_kind: None,
            attrs: Attrs::None,
            data: OpData::None,
            jump_to: None,
            prev: None,
            next: None,
            fixed_size: None,
            srcloc: None,
        }
    }

    pub fn label() -> Self {
        Op::new(OpKind::Label)
    }

    pub fn constant(value: i32) -> Self {
        let mut op = Op::new(OpKind::Constant);
        op.data = OpData::Int(value);
        op
    }

    pub fn jump(target: OpRef) -> Self {
        let mut op = Op::new(OpKind::Jump);
        op.jump_to = Some(target);
        op
    }

    pub fn memop(kind: OpKind, attrs: MemOpAttrs, offset: i32) -> Self {
        let mut op = Op::new(kind);
        op.attrs = Attrs::MemOp(attrs);
        op.data = OpData::Int(offset);
        op
    }

    /// Access this op's `MemOpAttrs`, panicking if `kind` isn't a memory or
    /// register op. Keeping this as an accessor (rather than matching
    /// `Attrs` ad hoc at every call site) is what makes the kind/attrs
    /// pairing in `Attrs` an enforced invariant instead of a convention.
    pub fn memop_attrs(&self) -> &MemOpAttrs {
        match &self.attrs {
            Attrs::MemOp(m) => m,
            _ => panic!("{:?} has no MemOpAttrs", self.kind),
        }
    }

    pub fn memop_attrs_mut(&mut self) -> &mut MemOpAttrs {
        match &mut self.attrs {
            Attrs::MemOp(m) => m,
            _ => panic!("{:?} has no MemOpAttrs", self.kind),
        }
    }

    pub fn call_attrs(&self) -> &CallAttrs {
        match &self.attrs {
            Attrs::Call(c) => c,
            _ => panic!("{:?} has no CallAttrs", self.kind),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(m) = self.math_kind {
            write!(f, ".{:?}", m)?;
        }
        match &self.data {
            OpData::Int(i) => write!(f, " #{}", i)?,
            OpData::Str(s) => write!(f, " {:?}", s)?,
            OpData::None => {}
        }
        if let Some(jt) = self.jump_to {
            write!(f, " -> {}", jt)?;
        }
        Ok(())
    }
}
