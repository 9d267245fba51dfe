//! `Buf`: one function's BCIR instruction buffer.
//!
//! Corresponds to `BCIRBuffer` in `bcir.h`. The original is a raw
//! doubly-linked list of malloc'd `ByteOpIR` nodes; here the nodes live in
//! a `PrimaryMap<OpRef, Op>` arena and `prev`/`next` are `OpRef` handles
//! (spec §9's recommended arena-of-handles rewrite). `remove`/`remove_block`
//! unlink without freeing, exactly as the original does, a removed op may
//! still be referenced as somebody's `jump_to`, and the arena never shrinks
//! mid-compilation anyway.
//!
//! Pending records (string literals, jump tables) share this same arena
//! under a second head/tail chain rather than living in a separate
//! sub-buffer: a forward reference from an already-emitted op (e.g. a
//! `FundataPushAddress`'s `jump_to`) into a not-yet-spliced pending record
//! has to resolve to the same `OpRef` before and after splicing, which only
//! holds if both chains are handles into one arena.

use crate::ir::entities::OpRef;
use crate::ir::op::Op;
use p1bc_entity::PrimaryMap;

/// A function's instruction list plus a `pending` chain for records that
/// must be emitted after the main body (string literals, jump tables) so
/// that PC-relative references to them stay forward-only
/// (`BIRB_AppendPending` in the original).
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Default, Clone)]
pub struct Buf {
    arena: PrimaryMap<OpRef, Op>,
    head: Option<OpRef>,
    tail: Option<OpRef>,
    count: usize,
    pending_head: Option<OpRef>,
    pending_tail: Option<OpRef>,
    pending_count: usize,
}

impl Buf {
    pub fn new() -> Self {
        Buf {
            arena: PrimaryMap::new(),
            head: None,
            tail: None,
            count: 0,
            pending_head: None,
            pending_tail: None,
            pending_count: 0,
        }
    }

    pub fn head(&self) -> Option<OpRef> {
        self.head
    }

    pub fn tail(&self) -> Option<OpRef> {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn pending_is_empty(&self) -> bool {
        self.pending_count == 0
    }

    pub fn get(&self, r: OpRef) -> &Op {
        &self.arena[r]
    }

    pub fn get_mut(&mut self, r: OpRef) -> &mut Op {
        &mut self.arena[r]
    }

    pub fn prev(&self, r: OpRef) -> Option<OpRef> {
        self.arena[r].prev
    }

    pub fn next(&self, r: OpRef) -> Option<OpRef> {
        self.arena[r].next
    }

    /// O(1) tail insert. Returns the handle of the newly inserted op.
    pub fn append(&mut self, mut op: Op) -> OpRef {
        op.prev = self.tail;
        op.next = None;
        let r = self.arena.push(op);
        match self.tail {
            Some(t) => self.arena[t].next = Some(r),
            None => self.head = Some(r),
        }
        self.tail = Some(r);
        self.count += 1;
        r
    }

    /// Deep-copy `op` (it is a template the caller may reuse) and append the
    /// copy. Mirrors `BIRB_PushCopy`.
    pub fn copy_and_append(&mut self, op: &Op) -> OpRef {
        self.append(op.clone())
    }

    /// Append `op` to the pending chain, returning its handle immediately so
    /// callers can take a forward `jump_to` reference to it before
    /// `append_pending` ever runs.
    pub fn pending_append(&mut self, mut op: Op) -> OpRef {
        op.prev = self.pending_tail;
        op.next = None;
        let r = self.arena.push(op);
        match self.pending_tail {
            Some(t) => self.arena[t].next = Some(r),
            None => self.pending_head = Some(r),
        }
        self.pending_tail = Some(r);
        self.pending_count += 1;
        r
    }

    /// Splice the pending chain onto the tail of the main chain. Called
    /// once per function after its body has been fully lowered, matching
    /// `BIRB_AppendPending`: deferred records become real trailing ops so
    /// PC-relative offsets to them are always forward from the code that
    /// references them. Handles taken from `pending_append` stay valid.
    pub fn append_pending(&mut self) {
        let Some(first) = self.pending_head else {
            return;
        };
        let last = self.pending_tail.expect("pending_head set without pending_tail");

        self.arena[first].prev = self.tail;
        match self.tail {
            Some(t) => self.arena[t].next = Some(first),
            None => self.head = Some(first),
        }
        self.tail = Some(last);
        self.count += self.pending_count;

        self.pending_head = None;
        self.pending_tail = None;
        self.pending_count = 0;
    }

    /// Insert `op` immediately before `target`. O(1).
    pub fn insert_before(&mut self, target: OpRef, mut op: Op) -> OpRef {
        let before = self.arena[target].prev;
        op.prev = before;
        op.next = Some(target);
        let r = self.arena.push(op);
        match before {
            Some(b) => self.arena[b].next = Some(r),
            None => self.head = Some(r),
        }
        self.arena[target].prev = Some(r);
        self.count += 1;
        r
    }

    /// Replace the op at `target` in place, preserving `target`'s
    /// prev/next links (and handle identity, so existing `jump_to`
    /// references into this slot keep working).
    pub fn replace_in_place(&mut self, target: OpRef, mut op: Op) {
        op.prev = self.arena[target].prev;
        op.next = self.arena[target].next;
        self.arena[target] = op;
    }

    /// Unlink (but do not free) a single op.
    pub fn remove(&mut self, target: OpRef) {
        self.remove_block(target, target)
    }

    /// Unlink the contiguous run `[first, last]` (inclusive). O(1); does
    /// not validate that `last` is actually reachable from `first` by
    /// walking `next`, callers are expected to pass a genuine contiguous
    /// range, as the original does.
    pub fn remove_block(&mut self, first: OpRef, last: OpRef) {
        let before = self.arena[first].prev;
        let after = self.arena[last].next;
        match before {
            Some(b) => self.arena[b].next = after,
            None => self.head = after,
        }
        match after {
            Some(a) => self.arena[a].prev = before,
            None => self.tail = before,
        }
        // Count decremented by walking, since a block may be more than one op.
        let mut cur = Some(first);
        while let Some(c) = cur {
            self.count -= 1;
            if c == last {
                break;
            }
            cur = self.arena[c].next;
        }
    }

    /// Unlink `[first, last]` then relink it after `after` (or at the head
    /// if `after` is `None`). Used by the "move single-jump tail block"
    /// optimization (§4.5 pass 4).
    pub fn move_block(&mut self, after: Option<OpRef>, first: OpRef, last: OpRef) {
        self.remove_block(first, last);
        self.relink_block(after, first, last);
    }

    /// Relink an already-detached `[first, last]` run after `after`.
    fn relink_block(&mut self, after: Option<OpRef>, first: OpRef, last: OpRef) {
        let next = match after {
            Some(a) => self.arena[a].next,
            None => self.head,
        };
        self.arena[first].prev = after;
        self.arena[last].next = next;
        match after {
            Some(a) => self.arena[a].next = Some(first),
            None => self.head = Some(first),
        }
        match next {
            Some(n) => self.arena[n].prev = Some(last),
            None => self.tail = Some(last),
        }
        let mut cur = Some(first);
        while let Some(c) = cur {
            self.count += 1;
            if c == last {
                break;
            }
            cur = self.arena[c].next;
        }
    }

    /// Number of ops whose `jump_to` equals `label` (linear scan; there is
    /// no label index, functions are small enough that this is fine, as
    /// the original comments note).
    pub fn ref_count(&self, label: OpRef) -> usize {
        self.iter()
            .filter(|&r| self.arena[r].jump_to == Some(label))
            .count()
    }

    pub fn any_ref(&self, label: OpRef) -> bool {
        self.iter().any(|r| self.arena[r].jump_to == Some(label))
    }

    /// Iterate op handles head-to-tail.
    pub fn iter(&self) -> BufIter<'_> {
        BufIter {
            buf: self,
            cur: self.head,
        }
    }

    /// Remap every `jump_to` that points at `from` to point at `to`
    /// instead. Used by label-coalescing (§4.5 pass 3) and jump-to-jump
    /// (§4.5 pass 9).
    pub fn retarget_jumps(&mut self, from: OpRef, to: OpRef) {
        let refs: Vec<OpRef> = self.iter().collect();
        for r in refs {
            if self.arena[r].jump_to == Some(from) {
                self.arena[r].jump_to = Some(to);
            }
        }
    }
}

/// Head-to-tail iterator over `OpRef` handles in a `Buf`.
pub struct BufIter<'a> {
    buf: &'a Buf,
    cur: Option<OpRef>,
}

impl<'a> Iterator for BufIter<'a> {
    type Item = OpRef;

    fn next(&mut self) -> Option<OpRef> {
        let cur = self.cur?;
        self.cur = self.buf.arena[cur].next;
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::{Op, OpKind};

    #[test]
    fn append_and_iterate() {
        let mut buf = Buf::new();
        let a = buf.append(Op::constant(1));
        let b = buf.append(Op::constant(2));
        let c = buf.append(Op::constant(3));
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(buf.prev(b), Some(a));
        assert_eq!(buf.next(b), Some(c));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn remove_middle() {
        let mut buf = Buf::new();
        let a = buf.append(Op::constant(1));
        let b = buf.append(Op::constant(2));
        let c = buf.append(Op::constant(3));
        buf.remove(b);
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(buf.next(a), Some(c));
        assert_eq!(buf.prev(c), Some(a));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn move_block_to_head() {
        let mut buf = Buf::new();
        let a = buf.append(Op::constant(1));
        let b = buf.append(Op::constant(2));
        let c = buf.append(Op::constant(3));
        buf.move_block(None, c, c);
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![c, a, b]);
        assert_eq!(buf.head(), Some(c));
        assert_eq!(buf.tail(), Some(b));
    }

    #[test]
    fn ref_count_and_retarget() {
        let mut buf = Buf::new();
        let label = buf.append(Op::label());
        let j1 = buf.append(Op::jump(label));
        let j2 = buf.append(Op::jump(label));
        assert_eq!(buf.ref_count(label), 2);
        let label2 = buf.append(Op::label());
        buf.retarget_jumps(label, label2);
        assert_eq!(buf.get(j1).jump_to, Some(label2));
        assert_eq!(buf.get(j2).jump_to, Some(label2));
        assert_eq!(buf.ref_count(label), 0);
        assert!(matches!(buf.get(label).kind, OpKind::Label));
    }

    #[test]
    fn append_pending_splices_at_tail() {
        let mut buf = Buf::new();
        let a = buf.append(Op::constant(1));
        buf.pending_append(Op::constant(10));
        buf.pending_append(Op::constant(11));
        buf.append_pending();
        assert_eq!(buf.len(), 3);
        let ops: Vec<i32> = buf.iter().map(|r| buf.get(r).data.as_int()).collect();
        assert_eq!(ops, vec![1, 10, 11]);
        assert_eq!(buf.head(), Some(a));
        assert!(buf.pending_is_empty());
    }

    #[test]
    fn forward_reference_into_pending_survives_splice() {
        // A main-chain op can take a pending op's handle as its `jump_to`
        // before the pending chain is spliced in, and that reference
        // still resolves correctly afterward, the whole point of sharing
        // one arena between the two chains.
        let mut buf = Buf::new();
        let string_ref = buf.pending_append(Op::constant(99));
        let mut push = Op::jump(string_ref);
        push.kind = OpKind::FundataPushAddress;
        let push_ref = buf.append(push);
        buf.append_pending();
        assert_eq!(buf.get(push_ref).jump_to, Some(string_ref));
        assert_eq!(buf.get(string_ref).data.as_int(), 99);
    }
}
