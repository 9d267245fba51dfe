//! Size resolution: the fixpoint loop from §4.7 that turns every op's
//! `(min, max)` size bound into a fixed `fixed_size`, by repeatedly
//! re-querying bounds as neighboring ops settle and, if that stalls,
//! forcing one oversizable record to its maximum to break the deadlock.

use crate::ir::buf::Buf;
use crate::ir::op::OpKind;
use crate::isa::spin1::Spin1Encoder;
use crate::result::{CodegenError, CodegenResult};

/// How many `size_bounds` recursions a single query may make before giving
/// up and returning its worst-case (widest) bound; keeps a pathological
/// jump-to-jump-to-jump chain from recursing unboundedly.
const MAX_QUERY_RECURSION: u32 = 16;

/// Resolves every op's `fixed_size` in `buf`, mutating it in place.
/// Mirrors `determineSizes`: re-query every still-undetermined op each
/// pass, fix any whose bounds have collapsed to a point, and when a whole
/// pass fixes nothing, force-oversize one non-`Align` record (its size
/// can't depend on its own address the way `Align`'s can) to break the
/// cycle.
pub fn resolve_sizes(
    buf: &mut Buf,
    encoder: &Spin1Encoder,
    max_iterations: u32,
) -> CodegenResult<()> {
    let mut iterations = 0u32;
    loop {
        if iterations >= max_iterations {
            return Err(CodegenError::SizeResolutionDidNotConverge { iterations });
        }
        iterations += 1;

        let mut fixed_any = false;
        let mut all_fixed = true;
        let mut oversize_candidate = None;

        let refs: Vec<_> = buf.iter().collect();
        for r in refs {
            if buf.get(r).fixed_size.is_some() {
                continue;
            }
            let (min, max) =
                crate::isa::spin1::size_bounds(buf, r, encoder, MAX_QUERY_RECURSION);
            if min == max {
                buf.get_mut(r).fixed_size = Some(min);
                fixed_any = true;
            } else {
                all_fixed = false;
                if oversize_candidate.is_none() && buf.get(r).kind != OpKind::Align {
                    oversize_candidate = Some((r, max));
                }
            }
        }

        if all_fixed {
            return Ok(());
        }
        if !fixed_any {
            match oversize_candidate {
                Some((r, max)) => buf.get_mut(r).fixed_size = Some(max),
                None => {
                    // Everything remaining is an `Align`; nothing but more
                    // iterations (as its surrounding code settles) can help.
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::Op;

    #[test]
    fn fixes_a_chain_of_constants_in_one_pass() {
        let mut buf = Buf::new();
        buf.append(Op::constant(1));
        buf.append(Op::constant(1000));
        let encoder = Spin1Encoder { pbase_offset: 0, allow_neg_const_forms: false };
        resolve_sizes(&mut buf, &encoder, 50).unwrap();
        let sizes: Vec<u32> = buf.iter().map(|r| buf.get(r).fixed_size.unwrap()).collect();
        assert_eq!(sizes, vec![1, 3]);
    }

    #[test]
    fn resolves_a_forward_jump_to_a_label() {
        let mut buf = Buf::new();
        let j = buf.append(Op::new(OpKind::Jump));
        let l = buf.append(Op::label());
        buf.get_mut(j).jump_to = Some(l);
        let encoder = Spin1Encoder { pbase_offset: 0, allow_neg_const_forms: false };
        resolve_sizes(&mut buf, &encoder, 50).unwrap();
        assert!(buf.get(j).fixed_size.is_some());
        assert_eq!(buf.get(l).fixed_size, Some(0));
    }
}
