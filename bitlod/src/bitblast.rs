//! Lowering of bit-vector terms to gate vectors.
//!
//! Every node reachable from an asserted or assumed root gets a vector of
//! gates, least significant bit first, and every gate gets its clauses as
//! soon as it is created. Reads and applications are abstracted by fresh
//! variables; their consistency is left to the lemma engine. Array and
//! function sorted nodes get an empty vector.

use crate::aig::{AigManager, AigRef};
use crate::error::{Error, Result};
use crate::map::Lowering;
use crate::node::{Kind, NodeId, NodeRef, NodeStore};
use crate::sat::SatManager;
use log::trace;
use std::collections::HashMap;

/// Owning map from base nodes to their gate vectors. Holds one reference to
/// every key node and to every gate.
#[derive(Debug, Default)]
pub struct EncodingMap {
    table: HashMap<NodeId, Vec<AigRef>>,
}

impl EncodingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.table.contains_key(&id)
    }

    /// Gates of `node` with its tag applied, least significant first.
    pub fn get(&self, node: NodeRef) -> Option<Vec<AigRef>> {
        self.table.get(&node.get_id()).map(|bits| {
            bits.iter()
                .map(|b| b.invert_if(node.is_inverted()))
                .collect()
        })
    }

    /// The single gate of a width one node.
    pub fn get_bit(&self, node: NodeRef) -> Option<AigRef> {
        self.table
            .get(&node.get_id())
            .and_then(|bits| bits.first())
            .map(|b| b.invert_if(node.is_inverted()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[AigRef])> {
        self.table.iter().map(|(id, bits)| (*id, bits.as_slice()))
    }

    /// Takes over `bits` and one new reference to `node`.
    pub fn insert(&mut self, store: &mut NodeStore, node: NodeRef, bits: Vec<AigRef>) -> Result<()> {
        store.copy(node.base())?;
        self.insert_owned(node.get_id(), bits);
        Ok(())
    }

    /// Takes over `bits` and a node reference the caller already counted.
    pub(crate) fn insert_owned(&mut self, id: NodeId, bits: Vec<AigRef>) {
        self.table.insert(id, bits);
    }

    pub fn delete(self, store: &mut NodeStore, aig: &mut AigManager) -> Result<()> {
        for (id, bits) in self.table {
            aig.release_all(&bits)?;
            store.release(NodeRef::new(id))?;
        }
        Ok(())
    }
}

/// Lowering callback filling an [`EncodingMap`]. Array equalities met on the
/// way are collected (counted) for extensionality witnesses.
pub struct BitBlaster<'a> {
    pub aig: &'a mut AigManager,
    pub sat: &'a mut SatManager,
    pub enc: &'a mut EncodingMap,
    pub array_eqs: &'a mut Vec<NodeRef>,
}

impl<'a> BitBlaster<'a> {
    fn bits(&self, node: NodeRef) -> Result<Vec<AigRef>> {
        self.enc.get(node).ok_or(Error::NotEncoded(node))
    }

    fn fresh(&mut self, width: u32) -> Vec<AigRef> {
        (0..width).map(|_| self.aig.new_var()).collect()
    }
}

impl<'a> Lowering for BitBlaster<'a> {
    fn is_lowered(&self, node: NodeId) -> bool {
        self.enc.contains(node)
    }

    fn lower(&mut self, store: &mut NodeStore, node: NodeRef) -> Result<()> {
        let (kind, ops, sort) = {
            let n = store.get(node)?;
            (n.get_kind().clone(), n.get_ops().to_vec(), n.get_sort())
        };
        // arrays, functions and argument tuples carry no bits
        let width = match sort.get_width().filter(|_| sort.is_bitvec()) {
            Some(w) => w,
            None => {
                return match kind {
                    Kind::Lambda => Err(Error::Internal(format!("function {} reached the encoder", node))),
                    _ => self.enc.insert(store, node, vec![]),
                };
            }
        };
        trace!("bit-blast {} {}", node, kind);
        let array_eq = kind == Kind::Eq && store.get_sort(ops[0])?.is_array();
        let bits = match kind {
            Kind::Const(bv) => bv
                .bits()
                .iter()
                .map(|b| if *b { AigRef::TRUE } else { AigRef::FALSE })
                .collect(),
            Kind::Var | Kind::Read | Kind::Apply => self.fresh(width),
            Kind::Param => return Err(Error::UnboundParam(node)),
            Kind::Slice { upper, lower } => {
                let a = self.bits(ops[0])?;
                copy_bits(self.aig, &a[lower as usize..=upper as usize])?
            }
            Kind::And => {
                let (a, b) = (self.bits(ops[0])?, self.bits(ops[1])?);
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| self.aig.and(*x, *y))
                    .collect::<Result<Vec<_>>>()?
            }
            Kind::Eq if array_eq => {
                self.array_eqs.push(store.copy(node.base())?);
                self.fresh(1)
            }
            Kind::Eq => {
                let (a, b) = (self.bits(ops[0])?, self.bits(ops[1])?);
                vec![eq(self.aig, &a, &b)?]
            }
            Kind::Add => {
                let (a, b) = (self.bits(ops[0])?, self.bits(ops[1])?);
                add(self.aig, &a, &b, AigRef::FALSE)?
            }
            Kind::Mul => {
                let (a, b) = (self.bits(ops[0])?, self.bits(ops[1])?);
                mul(self.aig, &a, &b)?
            }
            Kind::Ult => {
                let (a, b) = (self.bits(ops[0])?, self.bits(ops[1])?);
                vec![ult(self.aig, &a, &b)?]
            }
            Kind::Sll => {
                let (a, s) = (self.bits(ops[0])?, self.bits(ops[1])?);
                shift(self.aig, &a, &s, true)?
            }
            Kind::Srl => {
                let (a, s) = (self.bits(ops[0])?, self.bits(ops[1])?);
                shift(self.aig, &a, &s, false)?
            }
            Kind::Udiv => {
                let (a, b) = (self.bits(ops[0])?, self.bits(ops[1])?);
                let (q, r) = udiv_urem(self.aig, &a, &b)?;
                self.aig.release_all(&r)?;
                q
            }
            Kind::Urem => {
                let (a, b) = (self.bits(ops[0])?, self.bits(ops[1])?);
                let (q, r) = udiv_urem(self.aig, &a, &b)?;
                self.aig.release_all(&q)?;
                r
            }
            Kind::Concat => {
                let (hi, lo) = (self.bits(ops[0])?, self.bits(ops[1])?);
                let mut bits = copy_bits(self.aig, &lo)?;
                bits.extend(copy_bits(self.aig, &hi)?);
                bits
            }
            Kind::Cond => {
                let c = self.bits(ops[0])?[0];
                let (t, e) = (self.bits(ops[1])?, self.bits(ops[2])?);
                t.iter()
                    .zip(e.iter())
                    .map(|(x, y)| self.aig.ite(c, *x, *y))
                    .collect::<Result<Vec<_>>>()?
            }
            Kind::Array | Kind::Uf | Kind::Write | Kind::Lambda | Kind::Args => {
                return Err(Error::Internal(format!("{} {} has a bit-vector sort", kind, node)))
            }
        };
        for b in &bits {
            self.aig.to_cnf(self.sat, *b)?;
        }
        self.enc.insert(store, node, bits)
    }
}

pub fn copy_bits(aig: &mut AigManager, bits: &[AigRef]) -> Result<Vec<AigRef>> {
    bits.iter().map(|b| aig.copy(*b)).collect()
}

pub fn eq(aig: &mut AigManager, a: &[AigRef], b: &[AigRef]) -> Result<AigRef> {
    let same = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| aig.xnor(*x, *y))
        .collect::<Result<Vec<_>>>()?;
    let r = aig.and_all(&same)?;
    aig.release_all(&same)?;
    Ok(r)
}

/// Ripple carry adder, truncated to the operand width.
pub fn add(aig: &mut AigManager, a: &[AigRef], b: &[AigRef], carry_in: AigRef) -> Result<Vec<AigRef>> {
    let mut carry = aig.copy(carry_in)?;
    let mut sum = Vec::with_capacity(a.len());
    for (x, y) in a.iter().zip(b.iter()) {
        let half = aig.xor(*x, *y)?;
        sum.push(aig.xor(half, carry)?);
        let both = aig.and(*x, *y)?;
        let prop = aig.and(half, carry)?;
        let next = aig.or(both, prop)?;
        aig.release_all(&[half, both, prop, carry])?;
        carry = next;
    }
    aig.release(carry)?;
    Ok(sum)
}

/// Unsigned less-than, decided from the least significant bit up.
pub fn ult(aig: &mut AigManager, a: &[AigRef], b: &[AigRef]) -> Result<AigRef> {
    let mut lt = AigRef::FALSE;
    for (x, y) in a.iter().zip(b.iter()) {
        let here = aig.and(!*x, *y)?;
        let same = aig.xnor(*x, *y)?;
        let below = aig.and(same, lt)?;
        let next = aig.or(here, below)?;
        aig.release_all(&[here, same, below, lt])?;
        lt = next;
    }
    Ok(lt)
}

pub fn mul(aig: &mut AigManager, a: &[AigRef], b: &[AigRef]) -> Result<Vec<AigRef>> {
    let w = a.len();
    let mut acc = vec![AigRef::FALSE; w];
    for (i, y) in b.iter().enumerate() {
        let partial = (0..w)
            .map(|j| if j < i { Ok(AigRef::FALSE) } else { aig.and(a[j - i], *y) })
            .collect::<Result<Vec<_>>>()?;
        let next = add(aig, &acc, &partial, AigRef::FALSE)?;
        aig.release_all(&acc)?;
        aig.release_all(&partial)?;
        acc = next;
    }
    Ok(acc)
}

/// Logarithmic barrel shifter; stage `k` shifts by `2^k` if `s[k]` is set.
pub fn shift(aig: &mut AigManager, a: &[AigRef], s: &[AigRef], left: bool) -> Result<Vec<AigRef>> {
    let w = a.len();
    let mut cur = copy_bits(aig, a)?;
    for (k, sk) in s.iter().enumerate() {
        let dist = 1usize << k;
        let next = (0..w)
            .map(|j| {
                let moved = if left {
                    j.checked_sub(dist).map_or(AigRef::FALSE, |src| cur[src])
                } else if j + dist < w {
                    cur[j + dist]
                } else {
                    AigRef::FALSE
                };
                aig.ite(*sk, moved, cur[j])
            })
            .collect::<Result<Vec<_>>>()?;
        aig.release_all(&cur)?;
        cur = next;
    }
    Ok(cur)
}

/// Restoring division. A zero divisor yields an all-ones quotient and the
/// dividend as remainder.
pub fn udiv_urem(aig: &mut AigManager, a: &[AigRef], b: &[AigRef]) -> Result<(Vec<AigRef>, Vec<AigRef>)> {
    let w = a.len();
    let not_b: Vec<AigRef> = b.iter().map(|x| !*x).collect();
    let mut rem = vec![AigRef::FALSE; w];
    let mut quotient = vec![AigRef::FALSE; w];
    for i in (0..w).rev() {
        // shift the next dividend bit in; the bit shifted out is the top bit
        let top = rem[w - 1];
        let mut shifted = Vec::with_capacity(w);
        shifted.push(aig.copy(a[i])?);
        shifted.extend(copy_bits(aig, &rem[..w - 1])?);
        let lt = ult(aig, &shifted, b)?;
        let ge = aig.or(top, !lt)?;
        let diff = add(aig, &shifted, &not_b, AigRef::TRUE)?;
        let next = shifted
            .iter()
            .zip(diff.iter())
            .map(|(s, d)| aig.ite(ge, *d, *s))
            .collect::<Result<Vec<_>>>()?;
        aig.release(lt)?;
        aig.release_all(&shifted)?;
        aig.release_all(&diff)?;
        aig.release_all(&rem)?;
        rem = next;
        quotient[i] = ge;
    }
    Ok((quotient, rem))
}
