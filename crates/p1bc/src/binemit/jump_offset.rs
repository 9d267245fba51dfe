//! Jump-offset distance computation, transcribed from
//! `BCIR_GetJumpOffsetBounds`/`BCIR_GetJumpOffset` in `bcir.c`.
//!
//! Walking forward from a jump (or the function head, for
//! PBASE-relative distances) to its target and summing each intervening
//! op's size bound is how the original computes a distance without ever
//! assigning addresses up front; this is the core of the whole size
//! resolution approach in §4.7.

use crate::ir::buf::Buf;
use crate::ir::entities::OpRef;

/// Supplies an op's current `(min, max)` size bound. Implemented by
/// `isa::spin1::Spin1Encoder` so this module doesn't need to depend on a
/// specific target dialect, and so the dialect's size-bounds routine can
/// recurse back into `get_jump_offset_bounds` for its own jump-ish ops
/// without a circular type dependency.
pub trait SizeQuery {
    fn size_bounds(&self, buf: &Buf, op: OpRef, recursions_left: u32) -> (u32, u32);
}

/// Distance in bytes from `jump` to `jump`'s `jump_to` target.
///
/// `func_relative == true` measures from the function's head (used for
/// PBASE-relative references like `FundataPushAddress`/`FundataLookupJump`);
/// otherwise the search tries forward from `jump.next` first, then
/// backward from `jump` itself (inclusive) if the target isn't found
/// forward, exactly the original's two-pass search, which lets a single
/// routine serve both forward and backward jumps without the caller
/// knowing which.
///
/// Returns `(i64::MIN, i64::MIN)` sentinels, via `(0xBAD_BAD, -1)` in the
/// original, as `(min, max)` with `min != max` when the target isn't
/// found in the searched direction(s); callers that expect a resolvable
/// jump should treat `min > max` as a dangling-target bug
/// (`CodegenError::DanglingJumpTarget`, property 3 of §8).
pub fn get_jump_offset_bounds(
    buf: &Buf,
    jump: OpRef,
    func_relative: bool,
    recursions_left: u32,
    query: &dyn SizeQuery,
) -> (i64, i64) {
    let Some(target) = buf.get(jump).jump_to else {
        return (i64::from(i32::MAX), -1);
    };
    let next_recursions = recursions_left.saturating_sub(recursions_left.min(1));

    let mut min_dist: i64 = 0;
    let mut max_dist: i64 = 0;
    let mut found = false;
    let start = if func_relative {
        buf.head()
    } else {
        buf.next(jump)
    };
    let mut cur = start;
    while let Some(ir) = cur {
        if ir == target {
            found = true;
            break;
        }
        let (min, max) = query.size_bounds(buf, ir, next_recursions);
        min_dist += i64::from(min);
        max_dist += i64::from(max);
        cur = buf.next(ir);
    }

    if !found && !func_relative {
        min_dist = 0;
        max_dist = 0;
        let mut cur = Some(jump);
        while let Some(ir) = cur {
            if ir == target {
                found = true;
                break;
            }
            let (min, max) = query.size_bounds(buf, ir, next_recursions);
            min_dist -= i64::from(min);
            max_dist -= i64::from(max);
            cur = buf.prev(ir);
        }
    }

    if !found {
        (i64::from(i32::MAX), -1)
    } else {
        (min_dist, max_dist)
    }
}

/// The exact distance a jump resolves to, once `min == max`. Panics (via
/// the caller's own check, not here) are not appropriate for an
/// indeterminate result, callers that reach this after size resolution
/// has completed are guaranteed `min == max` by construction.
pub fn get_jump_offset(
    buf: &Buf,
    jump: OpRef,
    func_relative: bool,
    query: &dyn SizeQuery,
) -> i64 {
    let (min, max) = get_jump_offset_bounds(buf, jump, func_relative, 0, query);
    debug_assert_eq!(min, max, "get_jump_offset called with indeterminate offset");
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::Op;

    struct FixedSize(u32);
    impl SizeQuery for FixedSize {
        fn size_bounds(&self, buf: &Buf, op: OpRef, _recursions_left: u32) -> (u32, u32) {
            match buf.get(op).fixed_size {
                Some(s) => (s, s),
                None => (self.0, self.0),
            }
        }
    }

    #[test]
    fn forward_distance_sums_intervening_sizes() {
        let mut buf = Buf::new();
        let mut a = Op::constant(1);
        a.fixed_size = Some(2);
        let a = buf.append(a);
        let mut b = Op::constant(2);
        b.fixed_size = Some(3);
        let _b = buf.append(b);
        let label = buf.append(Op::label());
        let jump = buf.append(Op::jump(label));
        buf.get_mut(jump).fixed_size = Some(2);
        let _ = a;

        let (min, max) = get_jump_offset_bounds(&buf, jump, false, 0, &FixedSize(0));
        // forward search from jump.next (label) finds target immediately: distance 0
        assert_eq!((min, max), (0, 0));
    }

    #[test]
    fn func_relative_distance_sums_from_head() {
        let mut buf = Buf::new();
        let mut a = Op::constant(1);
        a.fixed_size = Some(2);
        buf.append(a);
        let mut b = Op::constant(2);
        b.fixed_size = Some(3);
        buf.append(b);
        let label = buf.append(Op::label());
        let jump = buf.append(Op::jump(label));

        let (min, max) = get_jump_offset_bounds(&buf, jump, true, 0, &FixedSize(0));
        assert_eq!((min, max), (5, 5));
    }
}
