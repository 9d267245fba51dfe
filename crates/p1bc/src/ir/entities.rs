//! BCIR entity references.
//!
//! Every instruction record (`Op`) in a function's buffer lives in a
//! `PrimaryMap<OpRef, Op>` arena. Cross-record links, `prev`, `next`, and
//! the `jumpTo` a branch or label-taking op carries, are `OpRef` handles
//! rather than pointers, so the arena can grow, be cloned, or be walked
//! without any unsafe aliasing (see the design note in spec §9 on replacing
//! the legacy `bcirstruct *` linked list with an arena of handles).
//!
//! Labels are not a separate entity type: a label is just an `Op` whose kind
//! is `OpKind::Label`, sitting in the same arena and addressed by the same
//! `OpRef`. This mirrors the original `ByteOpIR` struct, which uses one
//! physical record type for both instructions and labels.

use p1bc_entity::entity_impl;

/// A reference to one instruction (or label) record within a function's
/// `Buf`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpRef(u32);
entity_impl!(OpRef, "op");

/// A reference to a function within a `Module`, assigned when the function
/// is declared (module-local, dense, starting at 0).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);
entity_impl!(FuncId, "fn");

/// A reference to a sub-object (`OBJ`) declared within a module, module-local
/// and dense.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(u32);
entity_impl!(ObjId, "obj");

/// A reference to a module (the compiled unit corresponding to one `.spin`
/// file), dense across the whole program.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);
entity_impl!(ModuleId, "mod");

/// A reference to a jump-table generated during `case` lowering (§4.6); the
/// table data itself lives in a function's pending buffer.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JumpTableId(u32);
entity_impl!(JumpTableId, "jt");

#[cfg(test)]
mod tests {
    use super::*;
    use p1bc_entity::EntityRef;

    #[test]
    fn op_ref_round_trips() {
        let r = OpRef::new(42);
        assert_eq!(r.index(), 42);
        assert_eq!(r.to_string(), "op42");
    }
}
