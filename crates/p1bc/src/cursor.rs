//! Cursor types for navigating and editing a function's BCIR buffer.
//!
//! Unlike an EBB-oriented cursor that positions relative to extended-basic-
//! block boundaries, this crate's IR is a flat per-function list with
//! explicit `Label` ops as jump targets and no block structure, so
//! `CursorPosition` only needs three shapes: nowhere, at a specific op, or
//! past the tail.

use crate::ir::buf::Buf;
use crate::ir::entities::OpRef;
use crate::ir::op::Op;

/// The possible positions of a cursor.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CursorPosition {
    /// Not pointing anywhere; `insert` is illegal.
    Nowhere,
    /// Pointing at an existing op. `insert` places new ops immediately
    /// before it.
    At(OpRef),
    /// Past the last op (or buffer empty). `insert` appends.
    AtEnd,
}

/// Common navigation operations shared by cursor types. The only
/// implementor is `FuncCursor`; the trait exists so lowering and
/// optimizer code can be written generically against any cursor.
pub trait Cursor {
    fn position(&self) -> CursorPosition;
    fn set_position(&mut self, pos: CursorPosition);
    fn buf(&self) -> &Buf;
    fn buf_mut(&mut self) -> &mut Buf;

    fn with_position(mut self, pos: CursorPosition) -> Self
    where
        Self: Sized,
    {
        self.set_position(pos);
        self
    }

    /// Move to just past the last op.
    fn goto_end(&mut self) -> &mut Self {
        self.set_position(CursorPosition::AtEnd);
        self
    }

    /// Move to point at `op`.
    fn goto(&mut self, op: OpRef) -> &mut Self {
        self.set_position(CursorPosition::At(op));
        self
    }

    /// The op the cursor currently points at, if any.
    fn current(&self) -> Option<OpRef> {
        match self.position() {
            CursorPosition::At(op) => Some(op),
            CursorPosition::Nowhere | CursorPosition::AtEnd => None,
        }
    }

    /// Advance to the next op, returning the op the cursor *was* at (so a
    /// `while let Some(op) = cursor.next() { ... }` loop visits every op
    /// exactly once).
    fn next(&mut self) -> Option<OpRef> {
        let cur = self.current();
        let advance_to = match cur {
            Some(op) => self.buf().next(op),
            None => match self.position() {
                CursorPosition::Nowhere => self.buf().head(),
                _ => None,
            },
        };
        match advance_to {
            Some(op) => self.set_position(CursorPosition::At(op)),
            None => self.set_position(CursorPosition::AtEnd),
        }
        cur
    }

    /// Step back to the previous op.
    fn prev(&mut self) -> Option<OpRef> {
        let cur = match self.position() {
            CursorPosition::At(op) => Some(op),
            CursorPosition::AtEnd => self.buf().tail(),
            CursorPosition::Nowhere => None,
        };
        match cur {
            Some(op) => {
                self.set_position(CursorPosition::At(op));
                Some(op)
            }
            None => {
                self.set_position(CursorPosition::Nowhere);
                None
            }
        }
    }

    /// Insert `op` before the cursor position; the cursor keeps pointing
    /// at the same logical op (now one slot later) on an `At` position,
    /// or keeps appending on `AtEnd`. Returns the new op's handle.
    fn insert(&mut self, op: Op) -> OpRef {
        match self.position() {
            CursorPosition::At(target) => self.buf_mut().insert_before(target, op),
            CursorPosition::AtEnd | CursorPosition::Nowhere => self.buf_mut().append(op),
        }
    }
}

/// A cursor over one function's `Buf`.
pub struct FuncCursor<'f> {
    buf: &'f mut Buf,
    pos: CursorPosition,
}

impl<'f> FuncCursor<'f> {
    pub fn new(buf: &'f mut Buf) -> Self {
        FuncCursor {
            buf,
            pos: CursorPosition::Nowhere,
        }
    }
}

impl<'f> Cursor for FuncCursor<'f> {
    fn position(&self) -> CursorPosition {
        self.pos
    }

    fn set_position(&mut self, pos: CursorPosition) {
        self.pos = pos;
    }

    fn buf(&self) -> &Buf {
        self.buf
    }

    fn buf_mut(&mut self) -> &mut Buf {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::Op;

    #[test]
    fn next_visits_every_op_once() {
        let mut buf = Buf::new();
        let a = buf.append(Op::constant(1));
        let b = buf.append(Op::constant(2));
        let mut cursor = FuncCursor::new(&mut buf);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.current(), Some(a));
        assert_eq!(cursor.next(), Some(a));
        assert_eq!(cursor.current(), Some(b));
        assert_eq!(cursor.next(), Some(b));
        assert_eq!(cursor.current(), None);
    }

    #[test]
    fn insert_at_end_appends() {
        let mut buf = Buf::new();
        buf.append(Op::constant(1));
        {
            let mut cursor = FuncCursor::new(&mut buf).with_position(CursorPosition::AtEnd);
            cursor.insert(Op::constant(2));
        }
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn insert_before_current_does_not_skip_it() {
        let mut buf = Buf::new();
        let b = buf.append(Op::constant(2));
        {
            let mut cursor = FuncCursor::new(&mut buf).with_position(CursorPosition::At(b));
            cursor.insert(Op::constant(1));
        }
        let vals: Vec<i32> = buf.iter().map(|r| buf.get(r).data.as_int()).collect();
        assert_eq!(vals, vec![1, 2]);
    }
}
