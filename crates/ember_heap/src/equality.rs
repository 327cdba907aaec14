//! Structural comparison of object graphs.

use std::collections::HashMap;

use crate::record::{ObjRef, Value};
use crate::runtime::HeapView;

/// Returns `true` if the graphs rooted at `a_root` and `b_root` match
/// record-for-record by kind and fields.
///
/// Heap records are paired up as the walk proceeds, so cycles terminate and
/// sharing must match: two edges to one record on the left must be two edges
/// to one record on the right. Read-only references must be identical.
pub fn structurally_equal(a: HeapView<'_>, a_root: ObjRef, b: HeapView<'_>, b_root: ObjRef) -> bool {
    structurally_equal_ignoring(a, a_root, b, b_root, &[])
}

/// Like [`structurally_equal`], skipping the named fields on both sides.
pub fn structurally_equal_ignoring(
    a: HeapView<'_>,
    a_root: ObjRef,
    b: HeapView<'_>,
    b_root: ObjRef,
    ignored: &[&str],
) -> bool {
    let mut forward: HashMap<ObjRef, ObjRef> = HashMap::new();
    let mut backward: HashMap<ObjRef, ObjRef> = HashMap::new();
    let mut worklist = vec![(a_root, b_root)];

    while let Some((x, y)) = worklist.pop() {
        match (forward.get(&x), backward.get(&y)) {
            (Some(mapped), _) if *mapped != y => return false,
            (_, Some(mapped)) if *mapped != x => return false,
            (Some(_), _) => continue,
            _ => {}
        }
        forward.insert(x, y);
        backward.insert(y, x);

        match (x, y) {
            (ObjRef::ReadOnly(p), ObjRef::ReadOnly(q)) => {
                if p != q {
                    return false;
                }
                continue;
            }
            (ObjRef::Heap(_), ObjRef::Heap(_)) => {}
            _ => return false,
        }

        let (Some(rx), Some(ry)) = (a.record(x), b.record(y)) else {
            return false;
        };
        if rx.kind != ry.kind {
            return false;
        }

        let fx: Vec<_> = rx
            .fields
            .iter()
            .filter(|(name, _)| !ignored.contains(&name.as_str()))
            .collect();
        let fy: Vec<_> = ry
            .fields
            .iter()
            .filter(|(name, _)| !ignored.contains(&name.as_str()))
            .collect();
        if fx.len() != fy.len() {
            return false;
        }
        for ((nx, vx), (ny, vy)) in fx.into_iter().zip(fy) {
            if nx != ny {
                return false;
            }
            match (vx, vy) {
                (Value::Ref(p), Value::Ref(q)) => worklist.push((*p, *q)),
                (p, q) if p == q => {}
                _ => return false,
            }
        }
    }
    true
}
