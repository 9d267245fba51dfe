//! Final byte emission: walks a function's size-resolved `Buf`, encodes
//! every op via `isa::spin1::encode_op`, and assembles whole-module and
//! whole-program images per §4.8's header/method-table/relocation layout.

use crate::ir::buf::Buf;
use crate::ir::entities::ModuleId;
use crate::ir::module::{Module, RelocKind};
use crate::ir::program::Program;
use crate::isa::spin1::{encode_op, RelocSiteKind, Spin1Encoder};
use crate::module_layout::{pack_method_entry, pbase_offset, patch_word_be, write_header_prefix};
use crate::result::{CodegenError, CodegenResult};
use crate::settings::Settings;

/// A relocation discovered while emitting a function, with its position
/// already made module-relative (the function's own start offset has
/// been folded in).
pub struct PendingRelocation {
    pub module_offset: u32,
    pub target_module: ModuleId,
    pub kind: RelocKind,
}

/// Encodes every op in `buf` in list order and returns the concatenated
/// bytes plus any relocations, with positions relative to the start of
/// this function's own bytes (the caller adds the function's module
/// offset before recording them on the `Module`).
pub fn emit_function(buf: &Buf, encoder: &Spin1Encoder) -> (Vec<u8>, Vec<(u32, RelocSiteKind, ModuleId)>) {
    let mut bytes = Vec::new();
    let mut relocs = Vec::new();
    for r in buf.iter() {
        let (op_bytes, reloc) = encode_op(buf, r, encoder);
        if let Some(site) = reloc {
            relocs.push((
                bytes.len() as u32 + site.offset_in_op as u32,
                site.kind,
                site.target_module,
            ));
        }
        bytes.extend_from_slice(&op_bytes);
    }
    (bytes, relocs)
}

/// One fully-emitted module: its image bytes (header, method table,
/// object table, DAT block, method bodies) plus the cross-module
/// relocations it still owes, each already positioned relative to this
/// module's own start.
pub struct EmittedModule {
    pub bytes: Vec<u8>,
    pub pending: Vec<PendingRelocation>,
}

/// Builds one module's image. Every function is size-resolved and encoded
/// independently; PBASE is fixed up front from the module's declaration
/// counts (§4.8), so it's available before any function is sized.
pub fn emit_module(module: &Module, settings: &Settings) -> CodegenResult<EmittedModule> {
    let pbase = pbase_offset(module);
    let encoder = Spin1Encoder {
        pbase_offset: pbase,
        allow_neg_const_forms: settings.extra_small,
    };

    let mut bytes = Vec::new();
    let size_pos = write_header_prefix(&mut bytes, module);

    let method_ids: Vec<_> = module.pub_funcs.iter().chain(module.pri_funcs.iter()).copied().collect();
    let method_table_pos = bytes.len() as u32;
    for _ in 0..method_ids.len() {
        bytes.extend_from_slice(&[0, 0, 0, 0]);
    }

    for obj in module.sub_objects.values() {
        let _ = obj;
        bytes.extend_from_slice(&[0, 0, 0, 0]); // headerOffset, varOffset words; var layout is a front-end concern
    }

    bytes.extend_from_slice(&module.dat);

    let mut pending = Vec::new();
    for (slot, &func_id) in method_ids.iter().enumerate() {
        let func = &module.functions[func_id];
        let mut body = func.body.clone();
        crate::binemit::size_resolve::resolve_sizes(&mut body, &encoder, settings.max_fixpoint_iterations)?;

        let offset_from_base = bytes.len() as u32; // relative to this module's own start, same origin as PBASE
        let (func_bytes, relocs) = emit_function(&body, &encoder);
        let entry = pack_method_entry(offset_from_base as u16, func.local_size as u16);
        let entry_pos = method_table_pos + (slot as u32) * 4;
        // Method-table entries are a packed long, not a jump-table entry,
        // so they follow the usual big-endian high-then-low convention.
        patch_word_be(&mut bytes, entry_pos, (entry & 0xFFFF) as u16);
        patch_word_be(&mut bytes, entry_pos + 2, (entry >> 16) as u16);

        let func_start = bytes.len() as u32;
        for (pos, kind, target_module) in relocs {
            let reloc_kind = match kind {
                RelocSiteKind::FuncAddr { func } => RelocKind::FuncAddr { func },
                RelocSiteKind::DatBase => RelocKind::DatBase,
            };
            pending.push(PendingRelocation {
                module_offset: func_start + pos,
                target_module,
                kind: reloc_kind,
            });
        }
        bytes.extend_from_slice(&func_bytes);
    }

    let total_size = bytes.len() as u32;
    patch_word_be(&mut bytes, size_pos, total_size as u16);

    Ok(EmittedModule { bytes, pending })
}

/// Compiles and concatenates every module in `program` into one image,
/// applying cross-module relocations once every module's `compiled_address`
/// is known. Modules are compiled in declaration order; a faithful
/// recursive on-demand compile order (§4.8: "recursively compiling any
/// not-yet-compiled sub-objects") is left to the front-end driver that
/// builds `Program`, since by the time this crate sees a `Program` every
/// module it references already has to exist in `program.modules`.
pub fn emit_program(program: &Program, settings: &Settings) -> CodegenResult<Vec<u8>> {
    let mut image = Vec::new();
    let mut module_addresses = Vec::new();
    let mut all_pending = Vec::new();

    for (id, module) in program.modules.iter() {
        let addr = image.len() as u32;
        module_addresses.push((id, addr));
        let emitted = emit_module(module, settings)?;
        for p in emitted.pending {
            all_pending.push((addr, p));
        }
        image.extend_from_slice(&emitted.bytes);
    }

    let address_of = |target: ModuleId| -> CodegenResult<u32> {
        module_addresses
            .iter()
            .find(|(id, _)| *id == target)
            .map(|(_, addr)| *addr)
            .ok_or(CodegenError::MissingRelocationFunction)
    };

    for (module_addr, p) in all_pending {
        let target_addr = address_of(p.target_module)?;
        let pos = (module_addr + p.module_offset) as usize;
        match p.kind {
            RelocKind::FuncAddr { .. } => {
                // The callee's function id was already written by
                // `encode_op`; this placeholder only ever holds the
                // target module's address, per `Spin1RelocFuncAddr`.
                patch_word_be(&mut image, pos as u32, (target_addr & 0xFFFF) as u16);
            }
            RelocKind::DatBase => {
                let existing = ((image[pos] as u32) << 8) | image[pos + 1] as u32;
                let patched = existing.wrapping_add(target_addr);
                patch_word_be(&mut image, pos as u32, (patched & 0xFFFF) as u16);
            }
        }
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::Function;
    use crate::ir::op::Op;

    #[test]
    fn emits_a_single_trivial_function_module() {
        let mut module = Module::new("Main");
        let mut f = Function::new("go", 0, 0);
        f.body.append(Op::constant(1));
        f.body.append(Op::new(crate::ir::op::OpKind::ReturnPlain));
        module.add_function(f, true);

        let settings = Settings::default();
        let emitted = emit_module(&module, &settings).unwrap();
        // header(4) + method table(4) + constant(1) + return(1)
        assert_eq!(emitted.bytes.len(), 4 + 4 + 1 + 1);
        assert!(emitted.pending.is_empty());
    }
}
