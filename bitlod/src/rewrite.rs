//! Construction-time normalization.
//!
//! Level 0 builds nodes as given. Level 1 folds constants and applies
//! term-level identities. Level 2 adds operand ordering, condition polarity,
//! read-over-write and slice simplification. Level 3 also beta-reduces
//! applications of functions and simplifies single-bit equalities.

use crate::node::error::Result;
use crate::node::{BitVec, Builder, Kind, NodeRef};
use log::trace;

enum Step {
    /// Finished, owned result.
    Done(NodeRef),
    /// Rewrite again with these borrowed operands.
    Retry(Kind, Vec<NodeRef>),
    /// No rule applies.
    Keep(Kind, Vec<NodeRef>),
}

pub(crate) fn rewrite(b: &mut Builder, mut kind: Kind, mut ops: Vec<NodeRef>) -> Result<NodeRef> {
    loop {
        match step(b, kind, ops)? {
            Step::Done(r) => return Ok(r),
            Step::Retry(k, o) => {
                trace!("rewrite retry {} {:?}", k, o);
                kind = k;
                ops = o;
            }
            Step::Keep(k, o) => return b.store_mut().make(k, o),
        }
    }
}

/// Evaluates a base operator over constant operands.
pub fn fold_const(kind: &Kind, vals: &[BitVec]) -> Option<BitVec> {
    let bool_bv = |b: bool| if b { BitVec::one(1) } else { BitVec::zero(1) };
    let v = match kind {
        Kind::Slice { upper, lower } => vals[0].slice(*upper, *lower),
        Kind::And => vals[0].and(&vals[1]),
        Kind::Eq => bool_bv(vals[0] == vals[1]),
        Kind::Add => vals[0].add(&vals[1]),
        Kind::Mul => vals[0].mul(&vals[1]),
        Kind::Ult => bool_bv(vals[0].ult(&vals[1])),
        Kind::Sll => vals[0].sll(&vals[1]),
        Kind::Srl => vals[0].srl(&vals[1]),
        Kind::Udiv => vals[0].udiv(&vals[1]),
        Kind::Urem => vals[0].urem(&vals[1]),
        Kind::Concat => vals[0].concat(&vals[1]),
        Kind::Cond => {
            if vals[0].is_one() {
                vals[1].clone()
            } else {
                vals[2].clone()
            }
        }
        _ => return None,
    };
    Some(v)
}

fn step(b: &mut Builder, kind: Kind, ops: Vec<NodeRef>) -> Result<Step> {
    let level = b.get_rewrite_level();
    let beta = level >= 3 || b.force_beta;
    if kind == Kind::Apply {
        if beta && b.get_kind(ops[0])? == &Kind::Lambda {
            return Ok(Step::Done((b.binder.instantiate)(b, ops[0], ops[1])?));
        }
        return Ok(Step::Keep(kind, ops));
    }
    if level == 0 {
        return Ok(Step::Keep(kind, ops));
    }

    let consts: Option<Vec<BitVec>> = ops.iter().map(|op| b.const_value(*op)).collect();
    if let Some(vals) = consts {
        if let Some(v) = fold_const(&kind, &vals) {
            return Ok(Step::Done(b.new_bv_const(v)?));
        }
    }

    match kind {
        Kind::Slice { upper, lower } => slice(b, level, upper, lower, ops[0]),
        Kind::And => and(b, level, ops[0], ops[1]),
        Kind::Eq => eq(b, level, ops[0], ops[1]),
        Kind::Add => {
            if is_zero(b, ops[0]) {
                return Ok(Step::Done(b.copy(ops[1])?));
            }
            if is_zero(b, ops[1]) {
                return Ok(Step::Done(b.copy(ops[0])?));
            }
            Ok(ordered(level, kind, ops))
        }
        Kind::Mul => {
            for (x, y) in [(ops[0], ops[1]), (ops[1], ops[0])] {
                if is_zero(b, x) {
                    return Ok(Step::Done(b.copy(x)?));
                }
                if b.const_value(x).map_or(false, |v| v.is_one()) {
                    return Ok(Step::Done(b.copy(y)?));
                }
            }
            Ok(ordered(level, kind, ops))
        }
        Kind::Ult => {
            if ops[0] == ops[1] || is_zero(b, ops[1]) {
                return Ok(Step::Done(b.new_false()?));
            }
            Ok(Step::Keep(kind, ops))
        }
        Kind::Sll | Kind::Srl => {
            if is_zero(b, ops[0]) || is_zero(b, ops[1]) {
                return Ok(Step::Done(b.copy(ops[0])?));
            }
            Ok(Step::Keep(kind, ops))
        }
        Kind::Udiv => {
            if b.const_value(ops[1]).map_or(false, |v| v.is_one()) {
                return Ok(Step::Done(b.copy(ops[0])?));
            }
            Ok(Step::Keep(kind, ops))
        }
        Kind::Urem => {
            if b.const_value(ops[1]).map_or(false, |v| v.is_one()) {
                let w = b.get_width(ops[0])?;
                return Ok(Step::Done(b.new_zero(w)?));
            }
            Ok(Step::Keep(kind, ops))
        }
        Kind::Concat => concat(b, level, ops[0], ops[1]),
        Kind::Read => read(b, level, ops[0], ops[1]),
        Kind::Cond => {
            if let Some(c) = b.const_value(ops[0]) {
                let pick = if c.is_one() { ops[1] } else { ops[2] };
                return Ok(Step::Done(b.copy(pick)?));
            }
            if ops[1] == ops[2] {
                return Ok(Step::Done(b.copy(ops[1])?));
            }
            if level >= 2 && ops[0].is_inverted() {
                return Ok(Step::Retry(kind, vec![!ops[0], ops[2], ops[1]]));
            }
            Ok(Step::Keep(kind, ops))
        }
        _ => Ok(Step::Keep(kind, ops)),
    }
}

fn is_zero(b: &Builder, node: NodeRef) -> bool {
    b.const_value(node).map_or(false, |v| v.is_zero())
}

fn is_ones(b: &Builder, node: NodeRef) -> bool {
    b.const_value(node).map_or(false, |v| v.is_ones())
}

fn ordered(level: u8, kind: Kind, ops: Vec<NodeRef>) -> Step {
    if level >= 2 && kind.is_commutative() && ops[0] > ops[1] {
        Step::Retry(kind, vec![ops[1], ops[0]])
    } else {
        Step::Keep(kind, ops)
    }
}

fn and(b: &mut Builder, level: u8, x: NodeRef, y: NodeRef) -> Result<Step> {
    if x == y {
        return Ok(Step::Done(b.copy(x)?));
    }
    if x == !y {
        let w = b.get_width(x)?;
        return Ok(Step::Done(b.new_zero(w)?));
    }
    for (c, other) in [(x, y), (y, x)] {
        if is_zero(b, c) {
            return Ok(Step::Done(b.copy(c)?));
        }
        if is_ones(b, c) {
            return Ok(Step::Done(b.copy(other)?));
        }
    }
    Ok(ordered(level, Kind::And, vec![x, y]))
}

fn eq(b: &mut Builder, level: u8, x: NodeRef, y: NodeRef) -> Result<Step> {
    if x == y {
        return Ok(Step::Done(b.new_true()?));
    }
    let bitvec = b.get_sort(x)?.is_bitvec();
    if level >= 2 && bitvec && x == !y {
        return Ok(Step::Done(b.new_false()?));
    }
    if level >= 3 && b.get_sort(x)?.is_bool() {
        for (c, other) in [(x, y), (y, x)] {
            match b.const_value(c) {
                Some(v) if v.is_one() => return Ok(Step::Done(b.copy(other)?)),
                Some(_) => return Ok(Step::Done(b.copy(!other)?)),
                None => {}
            }
        }
    }
    Ok(ordered(level, Kind::Eq, vec![x, y]))
}

fn slice(b: &mut Builder, level: u8, upper: u32, lower: u32, x: NodeRef) -> Result<Step> {
    let w = b.get_width(x)?;
    if lower == 0 && upper == w - 1 {
        return Ok(Step::Done(b.copy(x)?));
    }
    let (inner_kind, inner_ops) = {
        let n = b.get(x)?;
        (n.get_kind().clone(), n.get_ops().to_vec())
    };
    match inner_kind {
        Kind::Slice { lower: l, .. } => {
            let r = b.new_slice(inner_ops[0], l + upper, l + lower)?;
            return Ok(Step::Done(r.invert_if(x.is_inverted())));
        }
        Kind::Concat if level >= 2 => {
            let lw = b.get_width(inner_ops[1])?;
            let r = if upper < lw {
                b.new_slice(inner_ops[1], upper, lower)?
            } else if lower >= lw {
                b.new_slice(inner_ops[0], upper - lw, lower - lw)?
            } else {
                return Ok(Step::Keep(Kind::Slice { upper, lower }, vec![x]));
            };
            return Ok(Step::Done(r.invert_if(x.is_inverted())));
        }
        _ => {}
    }
    if level >= 2 && x.is_inverted() {
        let r = b.new_slice(!x, upper, lower)?;
        return Ok(Step::Done(!r));
    }
    Ok(Step::Keep(Kind::Slice { upper, lower }, vec![x]))
}

// Adjacent slices of one node merge into a single slice.
fn concat(b: &mut Builder, level: u8, hi: NodeRef, lo: NodeRef) -> Result<Step> {
    if level >= 2 && hi.get_tag() == lo.get_tag() {
        let (hk, hops) = {
            let n = b.get(hi)?;
            (n.get_kind().clone(), n.get_ops().to_vec())
        };
        let (lk, lops) = {
            let n = b.get(lo)?;
            (n.get_kind().clone(), n.get_ops().to_vec())
        };
        if let (Kind::Slice { upper, lower: hl }, Kind::Slice { upper: lu, lower }) = (hk, lk) {
            if hops[0] == lops[0] && hl == lu + 1 {
                let r = b.new_slice(hops[0], upper, lower)?;
                return Ok(Step::Done(r.invert_if(hi.is_inverted())));
            }
        }
    }
    Ok(Step::Keep(Kind::Concat, vec![hi, lo]))
}

fn read(b: &mut Builder, level: u8, array: NodeRef, index: NodeRef) -> Result<Step> {
    if level >= 2 {
        let n = b.get(array)?;
        if n.get_kind() == &Kind::Write {
            let (base, i, v) = (n.get_op(0), n.get_op(1), n.get_op(2));
            if i == index {
                return Ok(Step::Done(b.copy(v)?));
            }
            if let (Some(ci), Some(cj)) = (b.const_value(i), b.const_value(index)) {
                if ci != cj {
                    return Ok(Step::Retry(Kind::Read, vec![base, index]));
                }
            }
        }
    }
    Ok(Step::Keep(Kind::Read, vec![array, index]))
}

#[cfg(test)]
mod test {
    use crate::node::{Builder, Kind};

    fn level(l: u8) -> Builder {
        let mut b = Builder::new();
        b.set_rewrite_level(l).unwrap();
        b
    }

    #[test]
    fn level_zero_keeps_structure() {
        let mut b = level(0);
        let x = b.new_var(8, None).unwrap();
        let zero = b.new_zero(8).unwrap();
        let r = b.new_add(x, zero).unwrap();
        assert_eq!(b.get_kind(r).unwrap(), &Kind::Add);
        let c = b.new_and(zero, zero).unwrap();
        assert_eq!(b.get_kind(c).unwrap(), &Kind::And);
    }

    #[test]
    fn identities() {
        let mut b = level(1);
        let x = b.new_var(8, None).unwrap();
        let zero = b.new_zero(8).unwrap();
        let ones = b.new_ones(8).unwrap();
        assert_eq!(b.new_add(x, zero).unwrap(), x);
        assert_eq!(b.new_and(x, ones).unwrap(), x);
        assert_eq!(b.new_and(x, !x).unwrap(), zero);
        assert_eq!(b.new_or(x, !x).unwrap(), ones);
        assert_eq!(b.new_slice(x, 7, 0).unwrap(), x);
        let t = b.new_true().unwrap();
        assert_eq!(b.new_eq(x, x).unwrap(), t);
        assert_eq!(b.new_ult(x, zero).unwrap(), !t);
        let hi = b.new_slice(x, 6, 2).unwrap();
        let lo = b.new_slice(hi, 3, 1).unwrap();
        let direct = b.new_slice(x, 5, 3).unwrap();
        assert_eq!(lo, direct);
    }

    #[test]
    fn commutative_operands_are_ordered() {
        let mut b = level(2);
        let x = b.new_var(8, None).unwrap();
        let y = b.new_var(8, None).unwrap();
        assert_eq!(b.new_add(x, y).unwrap(), b.new_add(y, x).unwrap());
        assert_eq!(b.new_eq(y, x).unwrap(), b.new_eq(x, y).unwrap());
        let mut b1 = level(1);
        let x = b1.new_var(8, None).unwrap();
        let y = b1.new_var(8, None).unwrap();
        assert_ne!(b1.new_add(x, y).unwrap(), b1.new_add(y, x).unwrap());
    }

    #[test]
    fn condition_polarity() {
        let mut b = level(2);
        let c = b.new_var(1, None).unwrap();
        let x = b.new_var(8, None).unwrap();
        let y = b.new_var(8, None).unwrap();
        let a = b.new_cond(!c, x, y).unwrap();
        let n = b.new_cond(c, y, x).unwrap();
        assert_eq!(a, n);
        assert_eq!(b.get_ops(a).unwrap()[0], c);
    }

    #[test]
    fn read_over_write() {
        let mut b = level(2);
        let a = b.new_array(8, 4, Some("a")).unwrap();
        let i = b.new_var(4, None).unwrap();
        let v = b.new_var(8, None).unwrap();
        let w = b.new_write(a, i, v).unwrap();
        assert_eq!(b.new_read(w, i).unwrap(), v);

        let one = b.new_unsigned_int(1, 4).unwrap();
        let two = b.new_unsigned_int(2, 4).unwrap();
        let w = b.new_write(a, one, v).unwrap();
        let r = b.new_read(w, two).unwrap();
        assert_eq!(b.get_ops(r).unwrap(), &[a, two]);
    }

    #[test]
    fn adjacent_slices_merge() {
        let mut b = level(2);
        let x = b.new_var(8, None).unwrap();
        let hi = b.new_slice(x, 7, 4).unwrap();
        let lo = b.new_slice(x, 3, 1).unwrap();
        let cat = b.new_concat(hi, lo).unwrap();
        assert_eq!(cat, b.new_slice(x, 7, 1).unwrap());
        let s = b.new_slice(!x, 3, 0).unwrap();
        assert!(s.is_inverted());
    }

    #[test]
    fn rewriting_is_idempotent() {
        let mut b = level(3);
        let x = b.new_var(8, None).unwrap();
        let y = b.new_var(8, None).unwrap();
        let c = b.new_var(1, None).unwrap();
        let sum = b.new_add(y, x).unwrap();
        let cond = b.new_cond(!c, sum, x).unwrap();
        let (kind, ops) = {
            let n = b.get(cond).unwrap();
            (n.get_kind().clone(), n.get_ops().to_vec())
        };
        let again = b.mk(kind, ops).unwrap();
        assert_eq!(again, cond);
        assert_eq!(b.get_refs(cond).unwrap(), 2);
    }

    #[test]
    fn single_bit_equalities() {
        let mut b = level(3);
        let p = b.new_var(1, None).unwrap();
        let t = b.new_true().unwrap();
        let f = b.new_false().unwrap();
        assert_eq!(b.new_eq(p, t).unwrap(), p);
        assert_eq!(b.new_eq(f, p).unwrap(), !p);
    }

    #[test]
    fn beta_reduction() {
        let mut b = level(3);
        let p = b.new_param(8, None).unwrap();
        let x = b.new_var(8, Some("x")).unwrap();
        let body = b.new_add(p, x).unwrap();
        let f = b.new_fun(&[p], body).unwrap();
        let y = b.new_var(8, Some("y")).unwrap();
        let app = b.new_apply(&[y], f).unwrap();
        assert_eq!(app, b.new_add(y, x).unwrap());
    }
}
