//! A single function's BCIR body plus the back-end bookkeeping the later
//! compilation stages attach to it.
//!
//! Grounded on `BCFunData` in `bc_bedata.h`: the original stores this as a
//! `void *bedata` blob hung off the front end's `Function` node. Since this
//! crate owns its own `Function` type rather than reusing the front end's,
//! the back-end fields are just part of the struct.

use crate::ir::buf::Buf;
use std::rc::Rc;

/// One function as the back end sees it: its BCIR body plus the
/// compiled-address/frame-size bookkeeping filled in once the module has
/// run through size resolution (§4.7) and emission (§4.8).
pub struct Function {
    /// Name as it will appear in the method table and in diagnostics.
    pub name: Rc<str>,
    pub num_params: u32,
    pub num_results: u32,
    /// Count of local variable slots, *not* including the hidden stack
    /// variables `lower::LowerContext` tracks during lowering, those are
    /// transient and never appear in `localSize`.
    pub num_locals: u32,
    pub body: Buf,
    /// Byte offset of this function's entry point within its module's
    /// compiled image. `None` until emission (mirrors the original's
    /// `compiledAddress == -1` sentinel).
    pub compiled_address: Option<u32>,
    /// Byte offset of this function's slot in the module's method table,
    /// patched once `compiled_address` is known.
    pub header_entry: Option<u32>,
    /// Total frame size in longs: params + locals + the high-water mark of
    /// hidden stack variables live at once during lowering.
    pub local_size: u32,
}

impl Function {
    pub fn new(name: impl Into<Rc<str>>, num_params: u32, num_results: u32) -> Self {
        Function {
            name: name.into(),
            num_params,
            num_results,
            num_locals: 0,
            body: Buf::new(),
            compiled_address: None,
            header_entry: None,
            local_size: 0,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled_address.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_function_is_uncompiled() {
        let f = Function::new("foo", 2, 1);
        assert!(!f.is_compiled());
        assert_eq!(f.num_params, 2);
        assert_eq!(f.body.len(), 0);
    }
}
