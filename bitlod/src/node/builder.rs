use super::error::{NodeError, Result};
use super::{BitVec, Kind, NodeRef, NodeStore, Sort, SortRef};
use crate::rewrite;
use std::collections::BTreeSet;
use std::ops::Deref;
use std::rc::Rc;

pub const DEFAULT_REWRITE_LEVEL: u8 = 3;
pub const MAX_REWRITE_LEVEL: u8 = 3;

fn min_signed(width: u32) -> BitVec {
    BitVec::one(1).concat(&BitVec::zero(width - 1))
}

/// Substitution the rewriter calls back into. The traversal itself lives
/// with the node maps, which install these when they build a [`Builder`].
#[derive(Clone, Copy)]
pub(crate) struct Binder {
    /// Body of a function with its parameters bound to an argument list.
    pub instantiate: fn(&mut Builder, NodeRef, NodeRef) -> Result<NodeRef>,
    /// Replaces a bound parameter inside a body.
    pub rename_param: fn(&mut Builder, NodeRef, NodeRef, NodeRef) -> Result<NodeRef>,
}

impl std::fmt::Debug for Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binder").finish_non_exhaustive()
    }
}

/// Sort-checked term construction on top of a [`NodeStore`].
///
/// Every constructor leaves its operands untouched and returns an owned
/// reference that the caller releases. Composite nodes go through the
/// rewriter at the configured level before they reach the store.
#[derive(Clone, Debug)]
pub struct Builder {
    store: NodeStore,
    rewrite_level: u8,
    pub(crate) force_beta: bool,
    pub(crate) binder: Binder,
}

impl Deref for Builder {
    type Target = NodeStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl Builder {
    pub(crate) fn with_binder(binder: Binder) -> Self {
        Self {
            store: NodeStore::new(),
            rewrite_level: DEFAULT_REWRITE_LEVEL,
            force_beta: false,
            binder,
        }
    }

    pub fn get_rewrite_level(&self) -> u8 {
        self.rewrite_level
    }

    /// Previously built nodes are never re-normalized, so the level is frozen
    /// as soon as the store holds a node.
    pub fn set_rewrite_level(&mut self, level: u8) -> Result<()> {
        if level != self.rewrite_level && self.store.live_count() > 0 {
            return Err(NodeError::RewriteLevelLocked);
        }
        self.rewrite_level = level.min(MAX_REWRITE_LEVEL);
        Ok(())
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut NodeStore {
        &mut self.store
    }

    pub fn copy(&mut self, node: NodeRef) -> Result<NodeRef> {
        self.store.copy(node)
    }

    pub fn release(&mut self, node: NodeRef) -> Result<()> {
        self.store.release(node)
    }

    pub fn set_symbol(&mut self, node: NodeRef, symbol: &str) -> Result<()> {
        self.store.set_symbol(node, symbol)
    }

    pub fn match_node_by_id(&mut self, id: u32) -> Result<NodeRef> {
        self.store.match_id(id)
    }

    fn finish(&mut self, result: NodeRef, temps: &[NodeRef]) -> Result<NodeRef> {
        for t in temps {
            self.store.release(*t)?;
        }
        Ok(result)
    }

    /// Builds a composite node through the rewriter.
    pub(crate) fn mk(&mut self, kind: Kind, ops: Vec<NodeRef>) -> Result<NodeRef> {
        self.store.infer_sort(&kind, &ops)?;
        rewrite::rewrite(self, kind, ops)
    }

    /// Rebuilds `kind` over new operands during substitution. Lambdas whose
    /// parameter is already bound get a fresh parameter.
    pub(crate) fn rebuild(&mut self, kind: Kind, ops: Vec<NodeRef>) -> Result<NodeRef> {
        match kind {
            Kind::Lambda => {
                if let Some(found) = self.store.find(&kind, &ops) {
                    return self.store.copy(found);
                }
                if !self.store.expect_param(ops[0])?.is_bound() {
                    return self.store.make(kind, ops);
                }
                let width = self.store.get_width(ops[0])?;
                let fresh = self.new_param(width, None)?;
                let body = (self.binder.rename_param)(self, ops[1], ops[0], fresh)?;
                let lambda = self.store.make(Kind::Lambda, vec![fresh, body])?;
                self.finish(lambda, &[fresh, body])
            }
            Kind::Args => self.store.make(kind, ops),
            Kind::Const(bv) => self.store.make_const(bv),
            _ => self.mk(kind, ops),
        }
    }

    // sorts

    pub fn bool_sort(&self) -> SortRef {
        super::bool_sort()
    }

    pub fn bitvec_sort(&self, width: u32) -> Result<SortRef> {
        if width == 0 {
            return Err(NodeError::ZeroWidth);
        }
        Ok(super::bitvec_sort(width))
    }

    pub fn fun_sort(&self, domain: &[SortRef], codomain: &SortRef) -> Result<SortRef> {
        super::fun_sort(domain, codomain)
            .ok_or_else(|| NodeError::InvalidSort("functions map bit-vectors to a bit-vector".to_owned()))
    }

    pub fn is_equal_sort(&self, a: NodeRef, b: NodeRef) -> Result<bool> {
        Ok(self.store.get_sort(a)? == self.store.get_sort(b)?)
    }

    // constants

    pub fn new_bv_const(&mut self, bv: BitVec) -> Result<NodeRef> {
        self.store.make_const(bv)
    }

    /// Constant from a string over `0` and `1`, most significant bit first.
    pub fn new_const(&mut self, bits: &str) -> Result<NodeRef> {
        let bv = BitVec::from_bin(bits).ok_or_else(|| NodeError::InvalidConst(bits.to_owned()))?;
        self.store.make_const(bv)
    }

    pub fn new_zero(&mut self, width: u32) -> Result<NodeRef> {
        self.store.make_const(BitVec::zero(width))
    }

    pub fn new_ones(&mut self, width: u32) -> Result<NodeRef> {
        self.store.make_const(BitVec::ones(width))
    }

    pub fn new_one(&mut self, width: u32) -> Result<NodeRef> {
        self.store.make_const(BitVec::one(width))
    }

    pub fn new_true(&mut self) -> Result<NodeRef> {
        self.new_one(1)
    }

    pub fn new_false(&mut self) -> Result<NodeRef> {
        self.new_zero(1)
    }

    pub fn new_unsigned_int(&mut self, value: u64, width: u32) -> Result<NodeRef> {
        self.store.make_const(BitVec::from_u64(width, value))
    }

    pub fn new_int(&mut self, value: i64, width: u32) -> Result<NodeRef> {
        self.store.make_const(BitVec::from_i64(width, value))
    }

    // inputs

    pub fn new_var(&mut self, width: u32, symbol: Option<&str>) -> Result<NodeRef> {
        let sort = self.bitvec_sort(width)?;
        self.store.new_input(Kind::Var, sort, symbol)
    }

    pub fn new_array(&mut self, element: u32, index: u32, symbol: Option<&str>) -> Result<NodeRef> {
        if element == 0 || index == 0 {
            return Err(NodeError::ZeroWidth);
        }
        self.store
            .new_input(Kind::Array, Rc::new(Sort::Array { index, element }), symbol)
    }

    pub fn new_uf(&mut self, sort: &SortRef, symbol: Option<&str>) -> Result<NodeRef> {
        if !sort.is_fun() {
            return Err(NodeError::InvalidSort(format!("{} is not a function sort", sort)));
        }
        self.store.new_input(Kind::Uf, sort.clone(), symbol)
    }

    pub fn new_param(&mut self, width: u32, symbol: Option<&str>) -> Result<NodeRef> {
        let sort = self.bitvec_sort(width)?;
        self.store.new_input(Kind::Param, sort, symbol)
    }

    // bit-wise and reductions

    pub fn new_not(&mut self, x: NodeRef) -> Result<NodeRef> {
        self.store.expect_bitvec(x)?;
        self.store.copy(!x)
    }

    pub fn new_neg(&mut self, x: NodeRef) -> Result<NodeRef> {
        let w = self.store.expect_bitvec(x)?;
        let one = self.new_one(w)?;
        let r = self.mk(Kind::Add, vec![!x, one])?;
        self.finish(r, &[one])
    }

    pub fn new_redor(&mut self, x: NodeRef) -> Result<NodeRef> {
        let w = self.store.expect_bitvec(x)?;
        let zero = self.new_zero(w)?;
        let eq = self.mk(Kind::Eq, vec![x, zero])?;
        self.finish(!eq, &[zero])
    }

    pub fn new_redand(&mut self, x: NodeRef) -> Result<NodeRef> {
        let w = self.store.expect_bitvec(x)?;
        let ones = self.new_ones(w)?;
        let eq = self.mk(Kind::Eq, vec![x, ones])?;
        self.finish(eq, &[ones])
    }

    pub fn new_redxor(&mut self, x: NodeRef) -> Result<NodeRef> {
        let w = self.store.expect_bitvec(x)?;
        let mut acc = self.new_slice(x, 0, 0)?;
        for i in 1..w {
            let bit = self.new_slice(x, i, i)?;
            let next = self.new_xor(acc, bit)?;
            acc = self.finish(next, &[acc, bit])?;
        }
        Ok(acc)
    }

    pub fn new_slice(&mut self, x: NodeRef, upper: u32, lower: u32) -> Result<NodeRef> {
        self.mk(Kind::Slice { upper, lower }, vec![x])
    }

    pub fn new_uext(&mut self, x: NodeRef, width: u32) -> Result<NodeRef> {
        self.store.expect_bitvec(x)?;
        if width == 0 {
            return self.store.copy(x);
        }
        let zero = self.new_zero(width)?;
        let r = self.mk(Kind::Concat, vec![zero, x])?;
        self.finish(r, &[zero])
    }

    pub fn new_sext(&mut self, x: NodeRef, width: u32) -> Result<NodeRef> {
        let w = self.store.expect_bitvec(x)?;
        if width == 0 {
            return self.store.copy(x);
        }
        let msb = self.new_slice(x, w - 1, w - 1)?;
        let ones = self.new_ones(width)?;
        let zero = self.new_zero(width)?;
        let pad = self.mk(Kind::Cond, vec![msb, ones, zero])?;
        let r = self.mk(Kind::Concat, vec![pad, x])?;
        self.finish(r, &[msb, ones, zero, pad])
    }

    // boolean connectives over bit-vectors of equal width

    pub fn new_and(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::And, vec![a, b])
    }

    pub fn new_nand(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        Ok(!self.new_and(a, b)?)
    }

    pub fn new_or(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        Ok(!self.mk(Kind::And, vec![!a, !b])?)
    }

    pub fn new_nor(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::And, vec![!a, !b])
    }

    pub fn new_xor(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        let or = self.new_or(a, b)?;
        let and = self.new_and(a, b)?;
        let r = self.mk(Kind::And, vec![or, !and])?;
        self.finish(r, &[or, and])
    }

    pub fn new_xnor(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        Ok(!self.new_xor(a, b)?)
    }

    pub fn new_implies(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.expect_bool(a)?;
        self.store.expect_bool(b)?;
        Ok(!self.mk(Kind::And, vec![a, !b])?)
    }

    pub fn new_iff(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.expect_bool(a)?;
        self.store.expect_bool(b)?;
        self.mk(Kind::Eq, vec![a, b])
    }

    pub fn new_eq(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Eq, vec![a, b])
    }

    pub fn new_ne(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        Ok(!self.mk(Kind::Eq, vec![a, b])?)
    }

    // arithmetic

    pub fn new_add(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Add, vec![a, b])
    }

    pub fn new_sub(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Add, &[a, b])?;
        let nb = self.new_neg(b)?;
        let r = self.mk(Kind::Add, vec![a, nb])?;
        self.finish(r, &[nb])
    }

    pub fn new_mul(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Mul, vec![a, b])
    }

    pub fn new_udiv(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Udiv, vec![a, b])
    }

    pub fn new_urem(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Urem, vec![a, b])
    }

    pub fn new_inc(&mut self, x: NodeRef) -> Result<NodeRef> {
        let w = self.store.expect_bitvec(x)?;
        let one = self.new_one(w)?;
        let r = self.mk(Kind::Add, vec![x, one])?;
        self.finish(r, &[one])
    }

    pub fn new_dec(&mut self, x: NodeRef) -> Result<NodeRef> {
        let w = self.store.expect_bitvec(x)?;
        let ones = self.new_ones(w)?;
        let r = self.mk(Kind::Add, vec![x, ones])?;
        self.finish(r, &[ones])
    }

    fn new_msb(&mut self, x: NodeRef) -> Result<NodeRef> {
        let w = self.store.expect_bitvec(x)?;
        self.new_slice(x, w - 1, w - 1)
    }

    /// `|x|` together with the sign bit of `x`.
    fn new_abs(&mut self, x: NodeRef) -> Result<(NodeRef, NodeRef)> {
        let sign = self.new_msb(x)?;
        let neg = self.new_neg(x)?;
        let abs = self.mk(Kind::Cond, vec![sign, neg, x])?;
        self.store.release(neg)?;
        Ok((abs, sign))
    }

    pub fn new_sdiv(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Udiv, &[a, b])?;
        let (abs_a, sa) = self.new_abs(a)?;
        let (abs_b, sb) = self.new_abs(b)?;
        let q = self.mk(Kind::Udiv, vec![abs_a, abs_b])?;
        let nq = self.new_neg(q)?;
        let flip = self.new_xor(sa, sb)?;
        let r = self.mk(Kind::Cond, vec![flip, nq, q])?;
        self.finish(r, &[abs_a, sa, abs_b, sb, q, nq, flip])
    }

    pub fn new_srem(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Urem, &[a, b])?;
        let (abs_a, sa) = self.new_abs(a)?;
        let (abs_b, sb) = self.new_abs(b)?;
        let u = self.mk(Kind::Urem, vec![abs_a, abs_b])?;
        let nu = self.new_neg(u)?;
        let r = self.mk(Kind::Cond, vec![sa, nu, u])?;
        self.finish(r, &[abs_a, sa, abs_b, sb, u, nu])
    }

    /// Signed remainder whose sign follows the divisor.
    pub fn new_smod(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        let w = self.store.expect_bitvec(a)?;
        self.store.infer_sort(&Kind::Urem, &[a, b])?;
        let (abs_a, sa) = self.new_abs(a)?;
        let (abs_b, sb) = self.new_abs(b)?;
        let u = self.mk(Kind::Urem, vec![abs_a, abs_b])?;
        let nu = self.new_neg(u)?;
        let nu_b = self.mk(Kind::Add, vec![nu, b])?;
        let u_b = self.mk(Kind::Add, vec![u, b])?;
        let both_pos = self.mk(Kind::And, vec![!sa, !sb])?;
        let both_neg = self.mk(Kind::And, vec![sa, sb])?;
        let neg_pos = self.mk(Kind::And, vec![sa, !sb])?;
        let c1 = self.mk(Kind::Cond, vec![neg_pos, nu_b, u_b])?;
        let c2 = self.mk(Kind::Cond, vec![both_neg, nu, c1])?;
        let c3 = self.mk(Kind::Cond, vec![both_pos, u, c2])?;
        let zero = self.new_zero(w)?;
        let is_zero = self.mk(Kind::Eq, vec![u, zero])?;
        let r = self.mk(Kind::Cond, vec![is_zero, zero, c3])?;
        self.finish(
            r,
            &[abs_a, sa, abs_b, sb, u, nu, nu_b, u_b, both_pos, both_neg, neg_pos, c1, c2, c3, zero, is_zero],
        )
    }

    // overflow detection

    pub fn new_uaddo(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Add, &[a, b])?;
        let w = self.store.get_width(a)?;
        let ea = self.new_uext(a, 1)?;
        let eb = self.new_uext(b, 1)?;
        let sum = self.mk(Kind::Add, vec![ea, eb])?;
        let r = self.new_slice(sum, w, w)?;
        self.finish(r, &[ea, eb, sum])
    }

    pub fn new_saddo(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Add, &[a, b])?;
        let sum = self.mk(Kind::Add, vec![a, b])?;
        let r = self.signed_overflow(a, b, sum, false)?;
        self.finish(r, &[sum])
    }

    pub fn new_ssubo(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        let diff = self.new_sub(a, b)?;
        let r = self.signed_overflow(a, b, diff, true)?;
        self.finish(r, &[diff])
    }

    // Overflow iff the operand signs agree (differ for subtraction) and the
    // result sign differs from the first operand.
    fn signed_overflow(&mut self, a: NodeRef, b: NodeRef, result: NodeRef, sub: bool) -> Result<NodeRef> {
        let sa = self.new_msb(a)?;
        let sb = self.new_msb(b)?;
        let sr = self.new_msb(result)?;
        let same = self.mk(Kind::Eq, vec![sa, sb])?;
        let flipped = self.mk(Kind::Eq, vec![sr, sa])?;
        let r = self.mk(Kind::And, vec![same.invert_if(sub), !flipped])?;
        self.finish(r, &[sa, sb, sr, same, flipped])
    }

    pub fn new_usubo(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Ult, vec![a, b])
    }

    pub fn new_umulo(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Mul, &[a, b])?;
        let w = self.store.get_width(a)?;
        if w == 1 {
            return self.new_false();
        }
        let ea = self.new_uext(a, w)?;
        let eb = self.new_uext(b, w)?;
        let prod = self.mk(Kind::Mul, vec![ea, eb])?;
        let high = self.new_slice(prod, 2 * w - 1, w)?;
        let r = self.new_redor(high)?;
        self.finish(r, &[ea, eb, prod, high])
    }

    pub fn new_smulo(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Mul, &[a, b])?;
        let w = self.store.get_width(a)?;
        if w == 1 {
            return self.mk(Kind::And, vec![a, b]);
        }
        let ea = self.new_sext(a, w)?;
        let eb = self.new_sext(b, w)?;
        let prod = self.mk(Kind::Mul, vec![ea, eb])?;
        let top = self.new_slice(prod, 2 * w - 1, w - 1)?;
        let any = self.new_redor(top)?;
        let all = self.new_redand(top)?;
        let r = self.mk(Kind::And, vec![any, !all])?;
        self.finish(r, &[ea, eb, prod, top, any, all])
    }

    pub fn new_sdivo(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Udiv, &[a, b])?;
        let w = self.store.get_width(a)?;
        let min = self.new_bv_const(min_signed(w))?;
        let ones = self.new_ones(w)?;
        let a_min = self.mk(Kind::Eq, vec![a, min])?;
        let b_ones = self.mk(Kind::Eq, vec![b, ones])?;
        let r = self.mk(Kind::And, vec![a_min, b_ones])?;
        self.finish(r, &[min, ones, a_min, b_ones])
    }

    // comparisons

    pub fn new_ult(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Ult, vec![a, b])
    }

    /// Flips the sign bit so that unsigned order matches signed order.
    fn new_flip_sign(&mut self, x: NodeRef) -> Result<NodeRef> {
        let w = self.store.get_width(x)?;
        let msb = self.new_msb(x)?;
        let low = self.new_slice(x, w - 2, 0)?;
        let r = self.mk(Kind::Concat, vec![!msb, low])?;
        self.finish(r, &[msb, low])
    }

    pub fn new_slt(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Ult, &[a, b])?;
        if self.store.get_width(a)? == 1 {
            return self.mk(Kind::And, vec![a, !b]);
        }
        let fa = self.new_flip_sign(a)?;
        let fb = self.new_flip_sign(b)?;
        let r = self.mk(Kind::Ult, vec![fa, fb])?;
        self.finish(r, &[fa, fb])
    }

    pub fn new_ulte(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        Ok(!self.new_ult(b, a)?)
    }

    pub fn new_slte(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        Ok(!self.new_slt(b, a)?)
    }

    pub fn new_ugt(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.new_ult(b, a)
    }

    pub fn new_sgt(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.new_slt(b, a)
    }

    pub fn new_ugte(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        Ok(!self.new_ult(a, b)?)
    }

    pub fn new_sgte(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        Ok(!self.new_slt(a, b)?)
    }

    // shifts, the shift amount is log2 of the operand width wide

    pub fn new_sll(&mut self, a: NodeRef, s: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Sll, vec![a, s])
    }

    pub fn new_srl(&mut self, a: NodeRef, s: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Srl, vec![a, s])
    }

    pub fn new_sra(&mut self, a: NodeRef, s: NodeRef) -> Result<NodeRef> {
        self.store.infer_sort(&Kind::Srl, &[a, s])?;
        let msb = self.new_msb(a)?;
        let pos = self.mk(Kind::Srl, vec![a, s])?;
        let neg = self.mk(Kind::Srl, vec![!a, s])?;
        let r = self.mk(Kind::Cond, vec![msb, !neg, pos])?;
        self.finish(r, &[msb, pos, neg])
    }

    pub fn new_rol(&mut self, a: NodeRef, s: NodeRef) -> Result<NodeRef> {
        self.rotate(a, s, Kind::Sll, Kind::Srl)
    }

    pub fn new_ror(&mut self, a: NodeRef, s: NodeRef) -> Result<NodeRef> {
        self.rotate(a, s, Kind::Srl, Kind::Sll)
    }

    // The shift width divides the operand width, so `-s` is `width - s` modulo width.
    fn rotate(&mut self, a: NodeRef, s: NodeRef, first: Kind, second: Kind) -> Result<NodeRef> {
        self.store.infer_sort(&first, &[a, s])?;
        let ns = self.new_neg(s)?;
        let l = self.mk(first, vec![a, s])?;
        let r = self.mk(second, vec![a, ns])?;
        let result = self.new_or(l, r)?;
        self.finish(result, &[ns, l, r])
    }

    pub fn new_concat(&mut self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Concat, vec![a, b])
    }

    // arrays

    pub fn new_read(&mut self, array: NodeRef, index: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Read, vec![array, index])
    }

    pub fn new_write(&mut self, array: NodeRef, index: NodeRef, value: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Write, vec![array, index, value])
    }

    pub fn new_cond(&mut self, cond: NodeRef, then: NodeRef, otherwise: NodeRef) -> Result<NodeRef> {
        self.mk(Kind::Cond, vec![cond, then, otherwise])
    }

    // functions

    /// Binds `params` in `body`. Every parameter becomes bound and can not be
    /// used for another function; `body` may not mention other parameters.
    pub fn new_fun(&mut self, params: &[NodeRef], body: NodeRef) -> Result<NodeRef> {
        if params.is_empty() {
            return Err(NodeError::InvalidArity(Kind::Lambda.to_string(), 0));
        }
        let mut seen = BTreeSet::new();
        for p in params {
            if self.store.expect_param(*p)?.is_bound() || !seen.insert(p.get_id()) {
                return Err(NodeError::BoundParam(*p));
            }
        }
        if let Some(free) = self
            .store
            .free_params(body)?
            .into_iter()
            .find(|id| !seen.contains(id))
        {
            return Err(NodeError::FreeParam(NodeRef::new(free)));
        }
        let mut cur = self.store.copy(body)?;
        for p in params.iter().rev() {
            let lambda = self.mk(Kind::Lambda, vec![*p, cur])?;
            cur = self.finish(lambda, &[cur])?;
        }
        Ok(cur)
    }

    fn new_args(&mut self, args: &[NodeRef]) -> Result<NodeRef> {
        // every link holds two arguments, the last one up to three
        let n = args.len();
        let links = if n <= 3 { 0 } else { (n - 2) / 2 };
        let mut cur = self.store.make(Kind::Args, args[2 * links..].to_vec())?;
        for j in (0..links).rev() {
            let link = self.store.make(Kind::Args, vec![args[2 * j], args[2 * j + 1], cur])?;
            cur = self.finish(link, &[cur])?;
        }
        Ok(cur)
    }

    pub fn new_apply(&mut self, args: &[NodeRef], fun: NodeRef) -> Result<NodeRef> {
        if let Some(i) = self.store.fun_sort_check(args, fun)? {
            let sort = (*self.store.get_sort(args[i])?).clone();
            return Err(NodeError::UnexpectedSort(args[i], "an argument of the function's domain", sort));
        }
        let args = self.new_args(args)?;
        let r = self.mk(Kind::Apply, vec![fun, args])?;
        self.finish(r, &[args])
    }

    pub fn fun_sort_check(&self, args: &[NodeRef], fun: NodeRef) -> Result<Option<usize>> {
        self.store.fun_sort_check(args, fun)
    }

    // introspection

    /// Node id, negated for inverted references.
    pub fn get_id(&self, node: NodeRef) -> Result<i64> {
        self.store.get(node)?;
        let id = node.get_id().get() as i64;
        Ok(if node.is_inverted() { -id } else { id })
    }

    pub fn get_index_width(&self, node: NodeRef) -> Result<u32> {
        Ok(self.store.expect_array(node)?.0)
    }

    pub fn get_fun_arity(&self, node: NodeRef) -> Result<usize> {
        let sort = self.store.get_sort(node)?;
        sort.get_arity()
            .ok_or_else(|| NodeError::UnexpectedSort(node, "a function", (*sort).clone()))
    }

    pub fn get_bits(&self, node: NodeRef) -> Result<String> {
        match self.store.const_value(node) {
            Some(bv) => Ok(bv.to_bin_string()),
            None => Err(NodeError::UnexpectedSort(
                node,
                "a constant",
                (*self.store.get_sort(node)?).clone(),
            )),
        }
    }

    pub fn is_var(&self, node: NodeRef) -> Result<bool> {
        Ok(self.store.get(node)?.kind == Kind::Var)
    }

    pub fn is_array(&self, node: NodeRef) -> Result<bool> {
        Ok(self.store.get(node)?.is_array())
    }

    pub fn is_array_var(&self, node: NodeRef) -> Result<bool> {
        Ok(self.store.get(node)?.kind == Kind::Array)
    }

    pub fn is_param(&self, node: NodeRef) -> Result<bool> {
        Ok(self.store.get(node)?.kind == Kind::Param)
    }

    pub fn is_bound_param(&self, node: NodeRef) -> Result<bool> {
        Ok(self.store.expect_param(node)?.is_bound())
    }

    pub fn is_fun(&self, node: NodeRef) -> Result<bool> {
        Ok(self.store.get(node)?.is_fun())
    }
}

#[cfg(test)]
mod test {
    use super::Builder;
    use crate::node::{BitVec, Kind, NodeError, NodeRef};

    fn level(l: u8) -> Builder {
        let mut b = Builder::new();
        b.set_rewrite_level(l).unwrap();
        b
    }

    #[test]
    fn negation_is_a_tag() {
        let mut b = level(0);
        let x = b.new_var(8, Some("x")).unwrap();
        let before = b.live_count();
        let nx = b.new_not(x).unwrap();
        assert_eq!(nx, !x);
        assert_eq!(b.live_count(), before);
        assert_eq!(b.get_id(nx).unwrap(), -b.get_id(x).unwrap());
    }

    #[test]
    fn rewrite_level_is_frozen() {
        let mut b = Builder::new();
        b.set_rewrite_level(1).unwrap();
        let x = b.new_var(8, None).unwrap();
        assert_eq!(b.set_rewrite_level(2), Err(NodeError::RewriteLevelLocked));
        b.release(x).unwrap();
        b.set_rewrite_level(2).unwrap();
    }

    #[test]
    fn derived_operators_release_temporaries() {
        let mut b = level(0);
        let x = b.new_var(8, Some("x")).unwrap();
        let y = b.new_var(8, Some("y")).unwrap();
        let ops: [fn(&mut Builder, NodeRef, NodeRef) -> Result<NodeRef, NodeError>; 7] = [
            Builder::new_sdiv,
            Builder::new_srem,
            Builder::new_smod,
            Builder::new_saddo,
            Builder::new_smulo,
            Builder::new_ssubo,
            Builder::new_slt,
        ];
        for op in ops {
            let r = op(&mut b, x, y).unwrap();
            b.release(r).unwrap();
            assert_eq!(b.live_count(), 2);
        }
        assert_eq!(b.get_refs(x).unwrap(), 1);
    }

    #[test]
    fn folded_constants() {
        let mut b = level(1);
        let seven = b.new_unsigned_int(7, 4).unwrap();
        let three = b.new_int(-3, 4).unwrap();
        let sum = b.new_add(seven, three).unwrap();
        assert_eq!(b.const_value(sum), Some(BitVec::from_u64(4, 4)));
        let zero = b.new_zero(4).unwrap();
        let q = b.new_udiv(seven, zero).unwrap();
        assert_eq!(b.get_bits(q).unwrap(), "1111");
        let r = b.new_urem(seven, zero).unwrap();
        assert_eq!(b.get_bits(r).unwrap(), "0111");
        let s = b.new_sdiv(three, seven).unwrap();
        assert_eq!(b.const_value(s), Some(BitVec::zero(4)));
        let m = b.new_smod(three, seven).unwrap();
        assert_eq!(b.const_value(m), Some(BitVec::from_u64(4, 4)));
        let rem = b.new_srem(three, seven).unwrap();
        assert_eq!(b.const_value(rem), Some(BitVec::from_i64(4, -3)));
    }

    #[test]
    fn overflow_predicates_on_constants() {
        let mut b = level(1);
        let max = b.new_unsigned_int(0x7f, 8).unwrap();
        let one = b.new_one(8).unwrap();
        let o = b.new_saddo(max, one).unwrap();
        assert_eq!(b.get_bits(o).unwrap(), "1");
        let o = b.new_uaddo(max, one).unwrap();
        assert_eq!(b.get_bits(o).unwrap(), "0");
        let big = b.new_unsigned_int(0x10, 8).unwrap();
        let o = b.new_umulo(big, big).unwrap();
        assert_eq!(b.get_bits(o).unwrap(), "1");
        let min = b.new_unsigned_int(0x80, 8).unwrap();
        let neg_one = b.new_ones(8).unwrap();
        let o = b.new_sdivo(min, neg_one).unwrap();
        assert_eq!(b.get_bits(o).unwrap(), "1");
    }

    #[test]
    fn shifts_and_rotations() {
        let mut b = level(1);
        let x = b.new_unsigned_int(0b1001_0110, 8).unwrap();
        let s = b.new_unsigned_int(3, 3).unwrap();
        let rol = b.new_rol(x, s).unwrap();
        assert_eq!(b.get_bits(rol).unwrap(), "10110100");
        let ror = b.new_ror(x, s).unwrap();
        assert_eq!(b.get_bits(ror).unwrap(), "11010010");
        let sra = b.new_sra(x, s).unwrap();
        assert_eq!(b.get_bits(sra).unwrap(), "11110010");
        let bad = b.new_unsigned_int(3, 4).unwrap();
        assert!(matches!(b.new_sll(x, bad), Err(NodeError::InvalidShift(..))));
    }

    #[test]
    fn functions() {
        let mut b = level(0);
        let p = b.new_param(8, Some("p")).unwrap();
        let q = b.new_param(8, Some("q")).unwrap();
        let body = b.new_add(p, q).unwrap();
        let f = b.new_fun(&[p, q], body).unwrap();
        assert_eq!(b.get_fun_arity(f).unwrap(), 2);
        assert!(b.is_bound_param(p).unwrap());
        assert_eq!(b.new_fun(&[p], body), Err(NodeError::BoundParam(p)));

        let r = b.new_param(8, None).unwrap();
        let body = b.new_add(r, p).unwrap();
        assert!(matches!(b.new_fun(&[r], body), Err(NodeError::FreeParam(_))));
        assert!(!b.is_bound_param(r).unwrap());

        let args: Vec<_> = (0..5).map(|_| b.new_var(8, None).unwrap()).collect();
        let sort = b.bitvec_sort(8).unwrap();
        let uf_sort = b.fun_sort(&vec![sort.clone(); 5], &sort).unwrap();
        let uf = b.new_uf(&uf_sort, Some("f")).unwrap();
        let app = b.new_apply(&args, uf).unwrap();
        assert_eq!(b.get_kind(app).unwrap(), &Kind::Apply);
        let packed = b.get_ops(app).unwrap()[1];
        assert_eq!(b.args_of(packed).unwrap(), args);
        assert!(matches!(b.new_apply(&args[..4], uf), Err(NodeError::ArityMismatch(_, 5, 4))));
        assert_eq!(b.fun_sort_check(&[args[0], p, args[1], args[2], args[3]], uf).unwrap(), None);
        let narrow = b.new_var(4, None).unwrap();
        assert_eq!(
            b.fun_sort_check(&[args[0], narrow, args[1], args[2], args[3]], uf).unwrap(),
            Some(1)
        );
    }
}
