//! Exact Spin1 opcode byte values, transcribed from `bc_spin1.c`'s
//! `CompileIROP_Spin1`/`MathOp_to_ID_Spin1`/`GetModifyByte_Spin1`. Kept as
//! one table-only module so the encoder (`encode.rs`) and size-bounds
//! routine (`size_bounds.rs`) read off the same constants rather than
//! each re-deriving bit layouts.

/// `-1..=1` tiny-constant base; add `imm` (as `i32`) to get the byte.
pub const CONST_TINY_BASE: u8 = 0b0011_0101;
/// Prefix byte for DECOD/DECODNOT/BMASKLOW/BMASKHIGH (a second byte
/// follows encoding which sub-kind and the shift amount).
pub const CONST_SPECIAL_PREFIX: u8 = 0b0011_0111;
pub const CONST_SPECIAL_DECOD: u8 = 0b0000_0000;
pub const CONST_SPECIAL_BMASKLOW: u8 = 0b0010_0000;
pub const CONST_SPECIAL_DECODNOT: u8 = 0b0100_0000;
pub const CONST_SPECIAL_BMASKHIGH: u8 = 0b0110_0000;
pub const CONST_1B: u8 = 0b0011_1000;
pub const CONST_2B: u8 = 0b0011_1001;
pub const CONST_3B: u8 = 0b0011_1010;
pub const CONST_4B: u8 = 0b0011_1011;
/// The unary-negate math op, used after a NEG1B/NEG2B literal push.
pub const MATHOP_NEG: u8 = 0xE0 + 0b00110;

pub const MATHOP_PREFIX: u8 = 0xE0;

pub const ANCHOR_BASE: u8 = 0b0000_0000;
pub const CALL_SELF: u8 = 0b0000_0101;
pub const CALL_OTHER: u8 = 0b0000_0110;
pub const CALL_OTHER_IDX: u8 = 0b0000_0111;

pub const JUMP: u8 = 0b0000_0100;
pub const JUMP_TJZ: u8 = 0b0000_1000;
pub const JUMP_DJNZ: u8 = 0b0000_1001;
pub const JUMP_IF_Z: u8 = 0b0000_1010;
pub const JUMP_IF_NZ: u8 = 0b0000_1011;
pub const CASE_DONE: u8 = 0b0000_1100;
pub const CASE: u8 = 0b0000_1101;
pub const CASE_RANGE: u8 = 0b0000_1110;
pub const LOOKEND: u8 = 0b0000_1111;

pub const LOOKUP: u8 = 0b0001_0000;
pub const LOOKDOWN: u8 = 0b0001_0001;
pub const LOOKUP_RANGE: u8 = 0b0001_0010;
pub const LOOKDOWN_RANGE: u8 = 0b0001_0011;
pub const POP: u8 = 0b0001_0100;
pub const COGINIT_PREPARE: u8 = 0b0001_0101;
pub const BUILTIN_STRSIZE: u8 = 0b0001_0110;
pub const BUILTIN_STRCOMP: u8 = 0b0001_0111;

pub const BULKMEM_BASE: u8 = 0b0001_1000;
pub const WAITPEQ: u8 = 0b0001_1011;
pub const WAITPNE: u8 = 0b0001_1111;

pub const CLKSET: u8 = 0b0010_0000;
pub const COGSTOP: u8 = 0b0010_0001;
pub const LOCKRET: u8 = 0b0010_0010;
pub const WAITCNT: u8 = 0b0010_0011;
pub const WAITVID: u8 = 0b0010_0111;

pub const COGINIT_PUSH: u8 = 0b0010_1000;
pub const LOCKNEW_PUSH: u8 = 0b0010_1001;
pub const LOCKSET_PUSH: u8 = 0b0010_1010;
pub const LOCKCLR_PUSH: u8 = 0b0010_1011;
pub const COGINIT_NOPUSH: u8 = 0b0010_1100;
pub const LOCKNEW_NOPUSH: u8 = 0b0010_1101;
pub const LOCKSET_NOPUSH: u8 = 0b0010_1110;
pub const LOCKCLR_NOPUSH: u8 = 0b0010_1111;

pub const ABORT_PLAIN: u8 = 0b0011_0000;
pub const ABORT_POP: u8 = 0b0011_0001;
pub const RETURN_PLAIN: u8 = 0b0011_0010;
pub const RETURN_POP: u8 = 0b0011_0011;

/// Short-form memop: `0x40 + (offset & 0x1C) + kind + (base << 5)`.
pub const MEM_SHORT_BASE: u8 = 0x40;
pub const MEM_SHORT_VBASE_BIT: u8 = 0 << 5;
pub const MEM_SHORT_DBASE_BIT: u8 = 1 << 5;

/// Long-form memop: `0x80 + (popIndex << 4) + (memSize << 5) + (base << 2) + kind`.
pub const MEM_LONG_BASE: u8 = 0x80;

pub const FUNDATA_PUSHADDRESS_PBASE: u8 = 0x87;
pub const FUNDATA_LOOKUPJUMP: u8 = 0xB4;

/// `0xA0 + (reg & 0x1F)`: register-op prefix with top bit forced set.
pub const REG_OP_BASE: u8 = 0x80;
pub const REG_READ_BIT: u8 = 0x00;
pub const REG_WRITE_BIT: u8 = 0x20;
pub const REG_MODIFY_BIT: u8 = 0x40;
pub const REGBIT_PREFIX: u8 = 0b0011_1101;
pub const REGBITRANGE_PREFIX: u8 = 0b0011_1110;

/// Within `GetModifyByte_Spin1`: the modify sub-opcode for unary/write
/// modify kinds (not a binary `MathOpKind`).
pub const MOD_WRITE: u8 = 0b0000000;
pub const MOD_RANDFORWARD: u8 = 0b0001000;
pub const MOD_RANDBACKWARD: u8 = 0b0001100;
pub const MOD_SIGNX_BYTE: u8 = 0b0010000;
pub const MOD_SIGNX_WORD: u8 = 0b0010100;
pub const MOD_POSTCLEAR: u8 = 0b0011000;
pub const MOD_POSTSET: u8 = 0b0011100;
pub const MOD_PREINC: u8 = 0b0100000;
pub const MOD_POSTINC: u8 = 0b0101000;
pub const MOD_PREDEC: u8 = 0b0110000;
pub const MOD_POSTDEC: u8 = 0b0111000;
/// Base for a binary `MathOpKind` ridden on a modify op.
pub const MOD_MATH_BASE: u8 = 0b01000000;

/// Modsize contribution (bits 1-2 of the sized-modify sub-opcode).
pub fn modsize_bits(size: crate::ir::op::MemSize) -> u8 {
    use crate::ir::op::MemSize::*;
    match size {
        Bit => 0,
        Byte => 2,
        Word => 4,
        Long => 6,
    }
}
