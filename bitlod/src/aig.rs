//! Structurally hashed and-inverter graph with Tseitin CNF emission.

use crate::error::{Error, Result};
use crate::sat::SatManager;
use log::trace;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::ops::Not;

/// Gate index shifted left by one, with the sign in the low bit. Index 0 is
/// the constant false gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AigRef(u32);

impl AigRef {
    pub const FALSE: AigRef = AigRef(0);
    pub const TRUE: AigRef = AigRef(1);

    fn new(index: u32) -> Self {
        AigRef(index << 1)
    }

    pub fn index(&self) -> u32 {
        self.0 >> 1
    }

    pub fn is_inverted(&self) -> bool {
        self.0 & 1 == 1
    }

    pub fn base(&self) -> Self {
        AigRef(self.0 & !1)
    }

    pub fn is_const(&self) -> bool {
        self.index() == 0
    }

    pub fn invert_if(&self, cond: bool) -> Self {
        if cond {
            !*self
        } else {
            *self
        }
    }
}

impl Not for AigRef {
    type Output = AigRef;

    fn not(self) -> Self::Output {
        AigRef(self.0 ^ 1)
    }
}

impl Display for AigRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_inverted() {
            write!(f, "-a{}", self.index())
        } else {
            write!(f, "a{}", self.index())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AigKind {
    Var,
    And(AigRef, AigRef),
}

#[derive(Clone, Debug)]
pub struct AigNode {
    kind: AigKind,
    refs: u32,
    cnf_id: i32,
}

impl AigNode {
    pub fn get_kind(&self) -> AigKind {
        self.kind
    }
    pub fn get_refs(&self) -> u32 {
        self.refs
    }
    pub fn get_cnf_id(&self) -> i32 {
        self.cnf_id
    }
}

#[derive(Clone, Debug)]
pub struct AigManager {
    nodes: Vec<Option<AigNode>>,
    unique: HashMap<(AigRef, AigRef), u32>,
    live: usize,
}

impl Default for AigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AigManager {
    pub fn new() -> Self {
        Self {
            nodes: vec![None],
            unique: HashMap::new(),
            live: 0,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn get(&self, a: AigRef) -> Result<&AigNode> {
        self.nodes
            .get(a.index() as usize)
            .and_then(|n| n.as_ref())
            .ok_or(Error::InvalidAig(a.index()))
    }

    fn get_mut(&mut self, a: AigRef) -> Result<&mut AigNode> {
        self.nodes
            .get_mut(a.index() as usize)
            .and_then(|n| n.as_mut())
            .ok_or(Error::InvalidAig(a.index()))
    }

    fn alloc(&mut self, kind: AigKind) -> AigRef {
        let index = self.nodes.len() as u32;
        self.nodes.push(Some(AigNode {
            kind,
            refs: 1,
            cnf_id: 0,
        }));
        self.live += 1;
        AigRef::new(index)
    }

    pub fn new_var(&mut self) -> AigRef {
        self.alloc(AigKind::Var)
    }

    pub fn copy(&mut self, a: AigRef) -> Result<AigRef> {
        if !a.is_const() {
            self.get_mut(a)?.refs += 1;
        }
        Ok(a)
    }

    pub fn release(&mut self, a: AigRef) -> Result<()> {
        if a.is_const() {
            return Ok(());
        }
        self.get(a)?;
        let mut stack = vec![a.base()];
        while let Some(a) = stack.pop() {
            let n = self.get_mut(a)?;
            n.refs -= 1;
            if n.refs > 0 {
                continue;
            }
            let kind = n.kind;
            self.nodes[a.index() as usize] = None;
            self.live -= 1;
            if let AigKind::And(l, r) = kind {
                self.unique.remove(&(l, r));
                for c in [l, r] {
                    if !c.is_const() {
                        stack.push(c.base());
                    }
                }
            }
        }
        Ok(())
    }

    pub fn release_all(&mut self, bits: &[AigRef]) -> Result<()> {
        for b in bits {
            self.release(*b)?;
        }
        Ok(())
    }

    pub fn and(&mut self, a: AigRef, b: AigRef) -> Result<AigRef> {
        if !a.is_const() {
            self.get(a)?;
        }
        if !b.is_const() {
            self.get(b)?;
        }
        if a == AigRef::FALSE || b == AigRef::FALSE || a == !b {
            return Ok(AigRef::FALSE);
        }
        if a == AigRef::TRUE || a == b {
            return self.copy(b);
        }
        if b == AigRef::TRUE {
            return self.copy(a);
        }
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(index) = self.unique.get(&key).copied() {
            return self.copy(AigRef::new(index));
        }
        self.copy(key.0)?;
        self.copy(key.1)?;
        let r = self.alloc(AigKind::And(key.0, key.1));
        self.unique.insert(key, r.index());
        Ok(r)
    }

    pub fn or(&mut self, a: AigRef, b: AigRef) -> Result<AigRef> {
        Ok(!self.and(!a, !b)?)
    }

    pub fn xor(&mut self, a: AigRef, b: AigRef) -> Result<AigRef> {
        let l = self.and(a, !b)?;
        let r = self.and(!a, b)?;
        let x = self.or(l, r)?;
        self.release(l)?;
        self.release(r)?;
        Ok(x)
    }

    pub fn xnor(&mut self, a: AigRef, b: AigRef) -> Result<AigRef> {
        Ok(!self.xor(a, b)?)
    }

    pub fn ite(&mut self, c: AigRef, t: AigRef, e: AigRef) -> Result<AigRef> {
        let l = self.and(c, t)?;
        let r = self.and(!c, e)?;
        let x = self.or(l, r)?;
        self.release(l)?;
        self.release(r)?;
        Ok(x)
    }

    /// Conjunction of a whole vector; the empty conjunction is true.
    pub fn and_all(&mut self, bits: &[AigRef]) -> Result<AigRef> {
        let mut acc = AigRef::TRUE;
        for b in bits {
            let next = self.and(acc, *b)?;
            self.release(acc)?;
            acc = next;
        }
        Ok(acc)
    }

    /// DIMACS literal of an encoded gate.
    pub fn lit(&self, sat: &SatManager, a: AigRef) -> Result<i32> {
        let id = if a.is_const() {
            sat.true_lit()
        } else {
            match self.get(a)?.cnf_id {
                0 => return Err(Error::Internal(format!("gate {} has no clause variable", a))),
                id => id,
            }
        };
        // index 0 is false, so its positive reference is the negated true literal
        if a.is_const() != a.is_inverted() {
            Ok(-id)
        } else {
            Ok(id)
        }
    }

    /// Emits the Tseitin clauses of every gate below `root` that has none yet.
    pub fn to_cnf(&mut self, sat: &mut SatManager, root: AigRef) -> Result<()> {
        if root.is_const() {
            return Ok(());
        }
        let mut stack = vec![(root.base(), false)];
        while let Some((a, expanded)) = stack.pop() {
            let (kind, cnf_id) = {
                let node = self.get(a)?;
                (node.kind, node.cnf_id)
            };
            if cnf_id != 0 {
                continue;
            }
            match kind {
                AigKind::Var => {
                    let id = sat.next_cnf_id();
                    self.get_mut(a)?.cnf_id = id;
                }
                AigKind::And(l, r) if expanded => {
                    let id = sat.next_cnf_id();
                    self.get_mut(a)?.cnf_id = id;
                    let (ll, rl) = (self.lit(sat, l)?, self.lit(sat, r)?);
                    trace!("tseitin {} = {} & {}", id, ll, rl);
                    sat.add_clause(&[-id, ll])?;
                    sat.add_clause(&[-id, rl])?;
                    sat.add_clause(&[id, -ll, -rl])?;
                }
                AigKind::And(l, r) => {
                    stack.push((a, true));
                    for c in [r, l] {
                        if !c.is_const() && self.get(c)?.cnf_id == 0 {
                            stack.push((c.base(), false));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Iterates live gates in index order, which is topological.
    pub fn iter(&self) -> impl Iterator<Item = (AigRef, &AigNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (AigRef::new(i as u32), n)))
    }
}

#[cfg(test)]
mod test {
    use super::{AigManager, AigRef};
    use crate::sat::{SatManager, SatResult, Value, VarisatBackend};

    #[test]
    fn structural_hashing() {
        let mut aig = AigManager::new();
        let a = aig.new_var();
        let b = aig.new_var();
        let x = aig.and(a, !b).unwrap();
        let y = aig.and(!b, a).unwrap();
        assert_eq!(x, y);
        assert_eq!(aig.get(x).unwrap().get_refs(), 2);
        assert_eq!(aig.and(a, !a).unwrap(), AigRef::FALSE);
        assert_eq!(aig.and(a, AigRef::TRUE).unwrap(), a);
        assert_eq!(aig.or(a, AigRef::TRUE).unwrap(), AigRef::TRUE);
        aig.release_all(&[x, y, a, a, b]).unwrap();
        assert_eq!(aig.live_count(), 0);
    }

    #[test]
    fn release_is_iterative() {
        let mut aig = AigManager::new();
        let mut acc = aig.new_var();
        for _ in 0..200_000 {
            let v = aig.new_var();
            let next = aig.and(acc, v).unwrap();
            aig.release(acc).unwrap();
            aig.release(v).unwrap();
            acc = next;
        }
        aig.release(acc).unwrap();
        assert_eq!(aig.live_count(), 0);
    }

    #[test]
    fn xor_in_cnf() {
        let mut aig = AigManager::new();
        let mut sat = SatManager::new(Box::new(VarisatBackend::new())).unwrap();
        let a = aig.new_var();
        let b = aig.new_var();
        let x = aig.xor(a, b).unwrap();
        aig.to_cnf(&mut sat, x).unwrap();
        let (xl, al, bl) = (
            aig.lit(&sat, x).unwrap(),
            aig.lit(&sat, a).unwrap(),
            aig.lit(&sat, b).unwrap(),
        );
        sat.add_clause(&[xl]).unwrap();
        sat.add_clause(&[al]).unwrap();
        assert_eq!(sat.solve(None).unwrap(), SatResult::Sat);
        assert_eq!(sat.deref(bl), Value::False);
        assert_eq!(sat.deref(aig.lit(&sat, AigRef::FALSE).unwrap()), Value::False);
    }
}
