//! Named-label resolution (§4.1): after a function's body is fully
//! lowered, every `goto` jump (queued during statement lowering since Spin
//! allows a label to be declared after its first reference) is patched to
//! point at its `NamedLabel` op, which is then rewritten into a plain
//! `Label` so the encoder never has to special-case it.

use crate::ir::buf::Buf;
use crate::ir::entities::OpRef;
use crate::ir::op::{Attrs, OpData, OpKind};
use crate::result::{DiagnosticSink, LowerError, SourceLoc};
use std::collections::HashMap;
use std::rc::Rc;

pub fn resolve_named_labels(
    buf: &mut Buf,
    gotos: &[(OpRef, Rc<str>, SourceLoc, u32)],
    sink: &mut DiagnosticSink,
) {
    let mut by_name: HashMap<Rc<str>, OpRef> = HashMap::new();
    for r in buf.iter() {
        if buf.get(r).kind == OpKind::NamedLabel {
            if let OpData::Str(name) = buf.get(r).data.clone() {
                by_name.insert(name, r);
            }
        }
    }

    for (jump_op, name, loc, depth_at_goto) in gotos {
        match by_name.get(name) {
            Some(&target) => {
                if let Attrs::LabelDepth(d) = buf.get(target).attrs {
                    if d != *depth_at_goto {
                        sink.error(
                            *loc,
                            LowerError::ConditionalDepthMismatch { label: name.to_string() },
                        );
                    }
                }
                buf.get_mut(*jump_op).jump_to = Some(target);
            }
            None => sink.error(*loc, LowerError::UndefinedLabel { label: name.to_string() }),
        }
    }

    let named: Vec<OpRef> = buf.iter().filter(|&r| buf.get(r).kind == OpKind::NamedLabel).collect();
    for r in named {
        buf.get_mut(r).kind = OpKind::Label;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::Op;

    #[test]
    fn goto_before_label_resolves_and_label_becomes_plain() {
        let mut buf = Buf::new();
        let mut jump = Op::new(OpKind::Jump);
        jump.jump_to = None;
        let jump_ref = buf.append(jump);
        let mut label = Op::new(OpKind::NamedLabel);
        label.data = OpData::Str("done".into());
        label.attrs = Attrs::LabelDepth(0);
        let label_ref = buf.append(label);

        let gotos = vec![(jump_ref, Rc::from("done"), SourceLoc::default(), 0)];
        let mut sink = DiagnosticSink::new();
        resolve_named_labels(&mut buf, &gotos, &mut sink);

        assert!(!sink.has_errors());
        assert_eq!(buf.get(jump_ref).jump_to, Some(label_ref));
        assert_eq!(buf.get(label_ref).kind, OpKind::Label);
    }

    #[test]
    fn undefined_label_is_reported() {
        let mut buf = Buf::new();
        let mut jump = Op::new(OpKind::Jump);
        jump.jump_to = None;
        let jump_ref = buf.append(jump);
        let gotos = vec![(jump_ref, Rc::from("nope"), SourceLoc::default(), 0)];
        let mut sink = DiagnosticSink::new();
        resolve_named_labels(&mut buf, &gotos, &mut sink);
        assert!(sink.has_errors());
    }
}
