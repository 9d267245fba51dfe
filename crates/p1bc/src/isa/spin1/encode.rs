//! Byte emission for the Spin1 dialect, transcribed from
//! `CompileIROP_Spin1` in `bc_spin1.c`. Every op's `fixed_size` must
//! already be resolved (§4.7) before this runs; [`encode_op`] asserts the
//! emitted length matches, the same sanity check the original makes by
//! comparing `pos` against `size` on the way out.

use super::constants::*;
use super::size_bounds::{classify_constant, ConstEncoding, Spin1Encoder};
use crate::binemit::jump_offset::get_jump_offset;
use crate::ir::buf::Buf;
use crate::ir::entities::{FuncId, ModuleId, OpRef};
use crate::ir::op::{Attrs, LockKind, MemBase, MemSize, ModifyOp, OpKind, WaitKind};
use p1bc_entity::EntityRef;

/// A relocation site discovered while encoding one op, expressed relative
/// to the start of that op's own bytes. `emit.rs` turns this into a
/// `ir::module::Relocation` once it knows the op's absolute address.
#[derive(Copy, Clone, Debug)]
pub struct RelocSite {
    pub offset_in_op: usize,
    pub target_module: ModuleId,
    pub kind: RelocSiteKind,
}

#[derive(Copy, Clone, Debug)]
pub enum RelocSiteKind {
    FuncAddr { func: FuncId },
    DatBase,
}

/// Encodes one op into its final byte sequence, per the Spin1 dialect.
/// Panics if `op.fixed_size` isn't set or the emitted length doesn't
/// match it, both indicate the caller skipped size resolution (§4.7),
/// which this module has no way to recover from on its own.
pub fn encode_op(buf: &Buf, r: OpRef, encoder: &Spin1Encoder) -> (Vec<u8>, Option<RelocSite>) {
    let op = buf.get(r);
    let size = op
        .fixed_size
        .expect("encode_op called before size resolution completed") as usize;
    let mut out = Vec::with_capacity(size);
    let mut reloc = None;

    match op.kind {
        OpKind::ConstantFuncRef => {
            let id = op.data.as_int();
            let (module, func) = match &op.attrs {
                Attrs::FuncRef { module, func } => (*module, *func),
                _ => panic!("ConstantFuncRef without FuncRef attrs"),
            };
            if id & 0xff00 != 0 {
                out.push(CONST_4B);
                out.push(((id >> 8) & 255) as u8);
            } else {
                out.push(CONST_3B);
            }
            reloc = Some(RelocSite {
                offset_in_op: out.len(),
                target_module: module,
                kind: RelocSiteKind::FuncAddr { func },
            });
            out.push(0);
            out.push(0);
        }
        OpKind::ConstantDatRef => {
            let off = op.data.as_int();
            let module = match &op.attrs {
                Attrs::DatRef { module } => *module,
                _ => panic!("ConstantDatRef without DatRef attrs"),
            };
            out.push(CONST_2B);
            reloc = Some(RelocSite {
                offset_in_op: out.len(),
                target_module: module,
                kind: RelocSiteKind::DatBase,
            });
            out.push(((off >> 8) & 255) as u8);
            out.push((off & 255) as u8);
        }
        OpKind::Constant => {
            let imm = op.data.as_int();
            let immu = imm as u32;
            match classify_constant(imm, encoder.allow_neg_const_forms) {
                ConstEncoding::Tiny => out.push((CONST_TINY_BASE as i32 + imm) as u8),
                ConstEncoding::Decod => {
                    out.push(CONST_SPECIAL_PREFIX);
                    out.push(CONST_SPECIAL_DECOD + ((30 - immu.leading_zeros() as i32) as u8 & 31));
                }
                ConstEncoding::DecodNot => {
                    out.push(CONST_SPECIAL_PREFIX);
                    let v = !immu;
                    out.push(CONST_SPECIAL_DECODNOT + ((30 - v.leading_zeros() as i32) as u8 & 31));
                }
                ConstEncoding::BMaskLow => {
                    out.push(CONST_SPECIAL_PREFIX);
                    let v = immu.wrapping_add(1);
                    out.push(CONST_SPECIAL_BMASKLOW + ((30 - v.leading_zeros() as i32) as u8 & 31));
                }
                ConstEncoding::BMaskHigh => {
                    out.push(CONST_SPECIAL_PREFIX);
                    let v = (!immu).wrapping_add(1);
                    out.push(CONST_SPECIAL_BMASKHIGH + ((30 - v.leading_zeros() as i32) as u8 & 31));
                }
                ConstEncoding::OneByte => {
                    out.push(CONST_1B);
                    out.push((immu & 255) as u8);
                }
                ConstEncoding::TwoByte => {
                    out.push(CONST_2B);
                    out.push(((immu >> 8) & 255) as u8);
                    out.push((immu & 255) as u8);
                }
                ConstEncoding::ThreeByte => {
                    out.push(CONST_3B);
                    out.push(((immu >> 16) & 255) as u8);
                    out.push(((immu >> 8) & 255) as u8);
                    out.push((immu & 255) as u8);
                }
                ConstEncoding::FourByte => {
                    out.push(CONST_4B);
                    out.push(((immu >> 24) & 255) as u8);
                    out.push(((immu >> 16) & 255) as u8);
                    out.push(((immu >> 8) & 255) as u8);
                    out.push((immu & 255) as u8);
                }
                ConstEncoding::Neg1Byte => {
                    out.push(CONST_1B);
                    out.push(((-imm) & 255) as u8);
                    out.push(MATHOP_NEG);
                }
                ConstEncoding::Neg2Byte => {
                    out.push(CONST_2B);
                    out.push((((-imm) >> 8) & 255) as u8);
                    out.push(((-imm) & 255) as u8);
                    out.push(MATHOP_NEG);
                }
            }
        }
        OpKind::MathOp => {
            let mk = op.math_kind.expect("MathOp without math_kind");
            out.push(MATHOP_PREFIX + mk.wire_bits().expect("MathOp with non-wire kind"));
        }
        OpKind::RegRead | OpKind::RegWrite | OpKind::RegModify
        | OpKind::RegBitRead | OpKind::RegBitWrite | OpKind::RegBitModify
        | OpKind::RegBitRangeRead | OpKind::RegBitRangeWrite | OpKind::RegBitRangeModify => {
            let reg = op.data.as_int();
            let prefix = match op.kind {
                OpKind::RegBitRead | OpKind::RegBitWrite | OpKind::RegBitModify => REGBIT_PREFIX,
                OpKind::RegBitRangeRead | OpKind::RegBitRangeWrite | OpKind::RegBitRangeModify => {
                    REGBITRANGE_PREFIX
                }
                _ => 0b0011_1111,
            };
            out.push(prefix);
            let mut regop = ((reg & 0x1F) as u8) + REG_OP_BASE;
            let is_modify = matches!(
                op.kind,
                OpKind::RegModify | OpKind::RegBitModify | OpKind::RegBitRangeModify
            );
            regop |= match op.kind {
                OpKind::RegWrite | OpKind::RegBitWrite | OpKind::RegBitRangeWrite => REG_WRITE_BIT,
                OpKind::RegModify | OpKind::RegBitModify | OpKind::RegBitRangeModify => REG_MODIFY_BIT,
                _ => REG_READ_BIT,
            };
            out.push(regop);
            if is_modify {
                out.push(modify_byte(op));
            }
        }
        OpKind::MemRead | OpKind::MemWrite | OpKind::MemModify | OpKind::MemAddress => {
            encode_memop(buf, r, encoder, &mut out);
        }
        OpKind::FundataPushAddress => {
            let add_pbase = match &op.attrs {
                Attrs::PushAddress(a) => a.add_pbase,
                _ => false,
            };
            out.push(if add_pbase {
                FUNDATA_PUSHADDRESS_PBASE
            } else if size == 2 {
                CONST_1B
            } else {
                CONST_2B
            });
            let offset =
                get_jump_offset(buf, r, true, encoder) + i64::from(encoder.pbase_offset);
            let remaining = size - out.len();
            encode_jump_offset(&mut out, offset, remaining, true, add_pbase);
        }
        OpKind::FundataLookupJump => {
            out.push(FUNDATA_LOOKUPJUMP);
            let offset =
                get_jump_offset(buf, r, true, encoder) + i64::from(encoder.pbase_offset);
            let remaining = size - out.len();
            encode_jump_offset(&mut out, offset, remaining, true, true);
        }
        OpKind::FundataJumpEntry => {
            let offset =
                get_jump_offset(buf, r, true, encoder) + i64::from(encoder.pbase_offset);
            encode_jump_offset_as(&mut out, offset, size, OffsetEncoding::FixlenLe);
        }
        OpKind::FundataString => {
            let bytes = match &op.data {
                crate::ir::op::OpData::Str(s) => s.as_bytes().to_vec(),
                _ => panic!("FundataString without string data"),
            };
            out.extend_from_slice(&bytes);
        }
        OpKind::BuiltinBulkmem => {
            let (mem_size, is_move) = match &op.attrs {
                Attrs::BulkMem { size, is_move } => (*size, *is_move),
                _ => panic!("BuiltinBulkmem without BulkMem attrs"),
            };
            let mut opcode = BULKMEM_BASE;
            opcode += match mem_size {
                MemSize::Byte => 0,
                MemSize::Word => 1,
                MemSize::Long => 2,
                MemSize::Bit => panic!("BuiltinBulkmem cannot be bit-sized"),
            };
            if is_move {
                opcode += 4;
            }
            out.push(opcode);
        }
        OpKind::Anchor => {
            let attrs = match &op.attrs {
                Attrs::Anchor(a) => *a,
                _ => Default::default(),
            };
            out.push(ANCHOR_BASE + (!attrs.with_result as u8) + ((attrs.rescue_abort as u8) << 1));
        }
        OpKind::CallSelf => {
            let call = op.call_attrs();
            out.push(CALL_SELF);
            out.push(call.func.index() as u8);
        }
        OpKind::CallOther | OpKind::CallOtherIdx => {
            let call = op.call_attrs();
            out.push(if op.kind == OpKind::CallOther { CALL_OTHER } else { CALL_OTHER_IDX });
            out.push(call.obj.expect("CallOther without obj").index() as u8);
            out.push(call.func.index() as u8);
        }
        OpKind::Jump | OpKind::JumpTjz | OpKind::JumpDjnz | OpKind::JumpIfZ | OpKind::JumpIfNz
        | OpKind::Case | OpKind::CaseRange => {
            out.push(match op.kind {
                OpKind::Jump => JUMP,
                OpKind::JumpTjz => JUMP_TJZ,
                OpKind::JumpDjnz => JUMP_DJNZ,
                OpKind::JumpIfZ => JUMP_IF_Z,
                OpKind::JumpIfNz => JUMP_IF_NZ,
                OpKind::Case => CASE,
                OpKind::CaseRange => CASE_RANGE,
                _ => unreachable!(),
            });
            let offset = get_jump_offset(buf, r, false, encoder);
            let remaining = size - out.len();
            encode_jump_offset(&mut out, offset, remaining, false, false);
        }
        OpKind::Wait => {
            let kind = match &op.attrs {
                Attrs::Wait(k) => *k,
                _ => panic!("Wait without WaitKind"),
            };
            out.push(match kind {
                WaitKind::WaitPeq => WAITPEQ,
                WaitKind::WaitPne => WAITPNE,
                WaitKind::WaitCnt => WAITCNT,
                WaitKind::WaitVid => WAITVID,
            });
        }
        OpKind::Coginit => {
            let push = matches!(&op.attrs, Attrs::PushResult(a) if a.push_result);
            out.push(if push { COGINIT_PUSH } else { COGINIT_NOPUSH });
        }
        OpKind::Locknew | OpKind::Lockset | OpKind::Lockclr => {
            let (kind, push) = match &op.attrs {
                Attrs::Lock { kind, push_result } => (*kind, *push_result),
                _ => panic!("Lock* without LockKind"),
            };
            out.push(match (kind, push) {
                (LockKind::New, true) => LOCKNEW_PUSH,
                (LockKind::New, false) => LOCKNEW_NOPUSH,
                (LockKind::Set, true) => LOCKSET_PUSH,
                (LockKind::Set, false) => LOCKSET_NOPUSH,
                (LockKind::Clr, true) => LOCKCLR_PUSH,
                (LockKind::Clr, false) => LOCKCLR_NOPUSH,
                (LockKind::Ret, _) => LOCKRET,
            });
        }
        OpKind::ReturnPlain => out.push(RETURN_PLAIN),
        OpKind::ReturnPop => out.push(RETURN_POP),
        OpKind::CaseDone => out.push(CASE_DONE),
        OpKind::Lookend => out.push(LOOKEND),
        OpKind::Lookup => out.push(LOOKUP),
        OpKind::Lookdown => out.push(LOOKDOWN),
        OpKind::LookupRange => out.push(LOOKUP_RANGE),
        OpKind::LookdownRange => out.push(LOOKDOWN_RANGE),
        OpKind::Pop => out.push(POP),
        OpKind::CoginitPrepare => out.push(COGINIT_PREPARE),
        OpKind::BuiltinStrsize => out.push(BUILTIN_STRSIZE),
        OpKind::BuiltinStrcomp => out.push(BUILTIN_STRCOMP),
        OpKind::Clkset => out.push(CLKSET),
        OpKind::Cogstop => out.push(COGSTOP),
        OpKind::Lockret => out.push(LOCKRET),
        OpKind::AbortPlain => out.push(ABORT_PLAIN),
        OpKind::AbortPop => out.push(ABORT_POP),
        OpKind::Label | OpKind::NamedLabel => {}
        OpKind::Align => out.resize(size, 0),
    }

    assert_eq!(
        out.len(),
        size,
        "{:?} compiled to {} bytes but was sized at {}",
        op.kind,
        out.len(),
        size
    );
    (out, reloc)
}

fn modify_byte(op: &crate::ir::op::Op) -> u8 {
    let attrs = op.memop_attrs();
    let modify = op.modify_kind.expect("MemModify/RegModify without modify_kind");
    let mut code = match modify {
        ModifyOp::Write => MOD_WRITE,
        ModifyOp::RandForward => MOD_RANDFORWARD,
        ModifyOp::RandBackward => MOD_RANDBACKWARD,
        ModifyOp::SignExtendByte => MOD_SIGNX_BYTE,
        ModifyOp::SignExtendWord => MOD_SIGNX_WORD,
        ModifyOp::PostClear => MOD_POSTCLEAR,
        ModifyOp::PostSet => MOD_POSTSET,
        ModifyOp::PreInc => MOD_PREINC + modsize_bits(attrs.mod_size),
        ModifyOp::PostInc => MOD_POSTINC + modsize_bits(attrs.mod_size),
        ModifyOp::PreDec => MOD_PREDEC + modsize_bits(attrs.mod_size),
        ModifyOp::PostDec => MOD_POSTDEC + modsize_bits(attrs.mod_size),
        ModifyOp::RepeatStep => panic!("RepeatStep has its own emission path"),
        ModifyOp::Math(mk) => {
            MOD_MATH_BASE + mk.wire_bits().expect("modify math op with no wire bits")
                + ((attrs.reverse_math as u8) << 5)
        }
    };
    code += (attrs.push_modify_result as u8) << 7;
    code
}

fn encode_memop(buf: &Buf, r: OpRef, encoder: &Spin1Encoder, out: &mut Vec<u8>) {
    let op = buf.get(r);
    let attrs = *op.memop_attrs();
    let offset = op.data.as_int() as u32;
    let short_form = super::size_bounds::is_short_form_memop(buf, r);

    if short_form {
        let mut opcode = MEM_SHORT_BASE + ((offset & 0x1C) as u8);
        opcode += match op.kind {
            OpKind::MemRead => 0,
            OpKind::MemWrite => 1,
            OpKind::MemModify => 2,
            OpKind::MemAddress => 3,
            _ => unreachable!(),
        };
        opcode += match attrs.base {
            MemBase::VBase => MEM_SHORT_VBASE_BIT,
            MemBase::DBase => MEM_SHORT_DBASE_BIT,
            _ => unreachable!("short form only valid for VBase/DBase"),
        };
        out.push(opcode);
    } else {
        let mut opcode = MEM_LONG_BASE + ((attrs.pop_index as u8) << 4);
        opcode += match attrs.mem_size {
            MemSize::Byte => 0 << 5,
            MemSize::Word => 1 << 5,
            MemSize::Long => 2 << 5,
            MemSize::Bit => panic!("memop cannot be bit-sized"),
        };
        opcode += match attrs.base {
            MemBase::Pop => 0 << 2,
            MemBase::PBase => 1 << 2,
            MemBase::VBase => 2 << 2,
            MemBase::DBase => 3 << 2,
        };
        opcode += match op.kind {
            OpKind::MemRead => 0,
            OpKind::MemWrite => 1,
            OpKind::MemModify => 2,
            OpKind::MemAddress => 3,
            _ => unreachable!(),
        };
        out.push(opcode);

        if !matches!(attrs.base, MemBase::Pop) {
            if offset < 0x80 {
                out.push(offset as u8);
            } else {
                out.push((((offset >> 8) & 0x7F) | 0x80) as u8);
                out.push((offset & 0xFF) as u8);
            }
        }
    }

    if op.kind == OpKind::MemModify {
        if op.modify_kind == Some(ModifyOp::RepeatStep) {
            out.push(if attrs.repeat_pop_step { 0b0000_0110 } else { 0b0000_0010 });
            let offset = get_jump_offset(buf, r, false, encoder);
            let remaining = op.fixed_size.unwrap() as usize - out.len();
            encode_jump_offset(out, offset, remaining, false, false);
        } else {
            out.push(modify_byte(op));
        }
    }
}

/// The four offset encodings `CompileJumpOffset_Spin1` supports. Varlen
/// forms set the top bit of the high byte as a continuation marker;
/// fixed-length forms don't, and `FixlenLe` additionally swaps byte order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum OffsetEncoding {
    VarlenSigned,
    VarlenUnsigned,
    Fixlen,
    FixlenLe,
}

/// Mirrors `CompileJumpOffset_Spin1`. `remaining` is how many bytes are
/// left for the whole offset field (1 or 2, per the op's resolved size).
fn encode_jump_offset_as(out: &mut Vec<u8>, offset: i64, remaining: usize, encoding: OffsetEncoding) {
    let is_varlen = matches!(encoding, OffsetEncoding::VarlenSigned | OffsetEncoding::VarlenUnsigned);
    let is_little_endian = encoding == OffsetEncoding::FixlenLe;
    match remaining {
        1 => {
            out.push(if is_varlen { (offset & 0x7F) as u8 } else { (offset & 0xFF) as u8 });
        }
        2 => {
            if is_little_endian {
                out.push((offset & 0xFF) as u8);
            }
            out.push(if is_varlen {
                (((offset >> 8) & 0x7F) as u8) | 0x80
            } else {
                ((offset >> 8) & 0xFF) as u8
            });
            if !is_little_endian {
                out.push((offset & 0xFF) as u8);
            }
        }
        n => panic!("jump offset field of {} bytes is not 1 or 2", n),
    }
}

/// Thin wrapper for the two call sites (plain jumps and `RepeatStep`)
/// that always use the signed varlen encoding.
fn encode_jump_offset(out: &mut Vec<u8>, offset: i64, remaining: usize, unsigned: bool, add_pbase: bool) {
    let encoding = if unsigned {
        if add_pbase {
            OffsetEncoding::VarlenUnsigned
        } else {
            OffsetEncoding::Fixlen
        }
    } else {
        OffsetEncoding::VarlenSigned
    };
    encode_jump_offset_as(out, offset, remaining, encoding);
}
