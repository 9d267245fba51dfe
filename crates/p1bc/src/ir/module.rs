//! A compiled module (one source file's worth of functions, sub-objects,
//! and `DAT` data) plus the back-end data needed to link it into a
//! program image.
//!
//! Grounded on `BCModData` in `bc_bedata.h`. The original caps public and
//! private method counts and sub-object counts at `BC_MAX_POINTERS` (256)
//! each, backed by fixed-size arrays; this crate keeps the same cap as an
//! explicit, checked limit (`LowerError::TooManyMethods` /
//! `TooManySubObjects`) rather than an array bound that silently
//! overflows, since `Vec` has no such bound for free.

use crate::ir::entities::{FuncId, ModuleId, ObjId};
use crate::ir::function::Function;
use p1bc_entity::PrimaryMap;
use std::rc::Rc;

/// Same cap as the original `BC_MAX_POINTERS`: a module's public method
/// table, private method table, and sub-object table each fit in one
/// byte-indexed descriptor, so none of the three may exceed 256 entries.
pub const MAX_POINTERS: usize = 256;

/// A reference to another module, instantiated as a sub-object (`OBJ x :
/// "othermodule"`) possibly as part of an array.
pub struct SubObject {
    pub module: ModuleId,
    /// Index within the declaring array (`0` for a non-array object).
    pub array_index: u32,
}

/// What a relocation overwrites once its target module's `compiled_address`
/// is known. Two shapes, matching the two relocation kinds named in §4.8:
/// a function reference packs a callee function id and the target module's
/// address into the placeholder; a DAT reference adjusts an already-written
/// DAT-relative offset by the target module's DAT base.
#[derive(Copy, Clone, Debug)]
pub enum RelocKind {
    /// Overwrite the two placeholder bytes at `position` with the target
    /// module's address. The callee's function id is a fixed byte the
    /// encoder already wrote inline; only the module address is deferred.
    /// Applying this twice is a no-op: the second application writes the
    /// identical word.
    FuncAddr { func: FuncId },
    /// Read the `i32` already at `position`, add the target module's DAT
    /// base, and write the sum back. NOT idempotent, re-applying would add
    /// the base twice. Emission must guarantee each DAT relocation runs
    /// exactly once.
    DatBase,
}

/// A `(position-in-image, target-module, patch)` tuple, applied once the
/// target module's `compiled_address` is known (§4.8).
#[derive(Copy, Clone, Debug)]
pub struct Relocation {
    pub position: u32,
    pub target_module: ModuleId,
    pub kind: RelocKind,
}

/// One compiled module: its functions plus the relocation-relevant counts
/// and tables the module header (§4.8) is built from.
pub struct Module {
    pub name: Rc<str>,
    pub functions: PrimaryMap<FuncId, Function>,
    /// `FuncId`s in declaration order that are `PUB` (exported, callable
    /// from other modules and from the top-level dispatch table).
    pub pub_funcs: Vec<FuncId>,
    /// `FuncId`s in declaration order that are `PRI` (module-private).
    pub pri_funcs: Vec<FuncId>,
    pub sub_objects: PrimaryMap<ObjId, SubObject>,
    /// Raw `DAT` block bytes, laid out after the method table in the final
    /// image (§4.8).
    pub dat: Vec<u8>,
    /// Byte offset of this module's header within the program image.
    /// `None` until emission (`compiledAddress == -1` in the original).
    pub compiled_address: Option<u32>,
    /// Cross-module relocations generated while emitting this module's
    /// functions and DAT block, applied once every referenced module has a
    /// `compiled_address` (§4.8, walked once per emission per the resource
    /// discipline note).
    pub relocations: Vec<Relocation>,
}

impl Module {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Module {
            name: name.into(),
            functions: PrimaryMap::new(),
            pub_funcs: Vec::new(),
            pri_funcs: Vec::new(),
            sub_objects: PrimaryMap::new(),
            dat: Vec::new(),
            compiled_address: None,
            relocations: Vec::new(),
        }
    }

    pub fn add_relocation(&mut self, position: u32, target_module: ModuleId, kind: RelocKind) {
        self.relocations.push(Relocation {
            position,
            target_module,
            kind,
        });
    }

    pub fn pub_count(&self) -> usize {
        self.pub_funcs.len()
    }

    pub fn pri_count(&self) -> usize {
        self.pri_funcs.len()
    }

    pub fn obj_count(&self) -> usize {
        self.sub_objects.len()
    }

    pub fn add_function(&mut self, func: Function, is_public: bool) -> FuncId {
        let id = self.functions.push(func);
        if is_public {
            self.pub_funcs.push(id);
        } else {
            self.pri_funcs.push(id);
        }
        id
    }

    pub fn add_sub_object(&mut self, module: ModuleId, array_index: u32) -> Option<ObjId> {
        if self.sub_objects.len() >= MAX_POINTERS {
            return None;
        }
        Some(self.sub_objects.push(SubObject { module, array_index }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p1bc_entity::EntityRef;

    #[test]
    fn counts_track_declaration_lists() {
        let mut m = Module::new("Main");
        m.add_function(Function::new("go", 0, 0), true);
        m.add_function(Function::new("helper", 1, 1), false);
        assert_eq!(m.pub_count(), 1);
        assert_eq!(m.pri_count(), 1);
        assert_eq!(m.obj_count(), 0);
    }

    #[test]
    fn sub_object_cap_is_enforced() {
        let mut m = Module::new("Main");
        for _ in 0..MAX_POINTERS {
            assert!(m.add_sub_object(ModuleId::new(0), 0).is_some());
        }
        assert!(m.add_sub_object(ModuleId::new(0), 0).is_none());
    }
}
