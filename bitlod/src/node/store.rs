use super::error::{NodeError, Result};
use super::{BitVec, Kind, Node, NodeId, NodeRef, Sort, SortRef};
use log::trace;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

type UniqueKey = (Kind, Vec<NodeRef>);

/// Arena of hash-consed, reference-counted nodes indexed by id.
///
/// Ids are assigned monotonically and never reused. Cloning a store yields an
/// independent copy in which every node keeps its id and reference count.
#[derive(Clone, Debug)]
pub struct NodeStore {
    nodes: Vec<Option<Node>>,
    unique: HashMap<UniqueKey, NodeId>,
    symbols: HashMap<String, NodeId>,
    live: usize,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    pub fn new() -> Self {
        Self {
            // id 0 is never handed out
            nodes: vec![None],
            unique: HashMap::new(),
            symbols: HashMap::new(),
            live: 0,
        }
    }

    pub fn get(&self, node: NodeRef) -> Result<&Node> {
        self.nodes
            .get(node.get_id().0 as usize)
            .and_then(|n| n.as_ref())
            .ok_or(NodeError::InvalidNode(node.get_id()))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(|n| n.as_mut())
            .ok_or(NodeError::InvalidNode(id))
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0 as usize), Some(Some(_)))
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    pub fn get_kind(&self, node: NodeRef) -> Result<&Kind> {
        Ok(&self.get(node)?.kind)
    }

    pub fn get_ops(&self, node: NodeRef) -> Result<&[NodeRef]> {
        Ok(&self.get(node)?.ops)
    }

    pub fn get_sort(&self, node: NodeRef) -> Result<SortRef> {
        Ok(self.get(node)?.sort.clone())
    }

    pub fn get_refs(&self, node: NodeRef) -> Result<u32> {
        Ok(self.get(node)?.refs)
    }

    pub fn get_symbol(&self, node: NodeRef) -> Result<Option<&str>> {
        Ok(self.get(node)?.get_symbol())
    }

    pub fn set_symbol(&mut self, node: NodeRef, symbol: &str) -> Result<()> {
        let id = node.get_id();
        match self.symbols.get(symbol) {
            Some(owner) if *owner == id => return Ok(()),
            Some(_) => return Err(NodeError::DuplicateSymbol(symbol.to_owned())),
            None => {}
        }
        let old = self.get_mut(id)?.symbol.replace(symbol.to_owned());
        if let Some(old) = old {
            self.symbols.remove(&old);
        }
        self.symbols.insert(symbol.to_owned(), id);
        Ok(())
    }

    pub fn get_width(&self, node: NodeRef) -> Result<u32> {
        self.expect_bitvec(node)
    }

    /// Value of a constant node, with the tag of `node` applied.
    pub fn const_value(&self, node: NodeRef) -> Option<BitVec> {
        match &self.get(node).ok()?.kind {
            Kind::Const(bv) if node.is_inverted() => Some(bv.invert()),
            Kind::Const(bv) => Some(bv.clone()),
            _ => None,
        }
    }

    pub fn is_const(&self, node: NodeRef) -> bool {
        self.const_value(node).is_some()
    }

    pub fn expect_bitvec(&self, node: NodeRef) -> Result<u32> {
        match *self.get(node)?.sort {
            Sort::BitVec(w) => Ok(w),
            ref other => Err(NodeError::UnexpectedSort(node, "a bit-vector", other.clone())),
        }
    }

    pub fn expect_bool(&self, node: NodeRef) -> Result<()> {
        match *self.get(node)?.sort {
            Sort::BitVec(1) => Ok(()),
            ref other => Err(NodeError::UnexpectedSort(node, "a bit-vector of width one", other.clone())),
        }
    }

    pub fn expect_array(&self, node: NodeRef) -> Result<(u32, u32)> {
        match *self.get(node)?.sort {
            Sort::Array { index, element } => Ok((index, element)),
            ref other => Err(NodeError::UnexpectedSort(node, "an array", other.clone())),
        }
    }

    pub fn expect_same_sort(&self, a: NodeRef, b: NodeRef) -> Result<SortRef> {
        let (sa, sb) = (self.get_sort(a)?, self.get_sort(b)?);
        if sa != sb {
            return Err(NodeError::SortIntegrity(a, b, (*sa).clone(), (*sb).clone()));
        }
        Ok(sa)
    }

    pub fn expect_param(&self, node: NodeRef) -> Result<&Node> {
        let n = self.get(node)?;
        if n.kind != Kind::Param || node.is_inverted() {
            return Err(NodeError::NotParam(node));
        }
        Ok(n)
    }

    fn expect_same_bitvec(&self, a: NodeRef, b: NodeRef) -> Result<u32> {
        let w = self.expect_bitvec(a)?;
        self.expect_bitvec(b)?;
        self.expect_same_sort(a, b)?;
        Ok(w)
    }

    /// Computes the sort of a composite node, checking every operand.
    pub fn infer_sort(&self, kind: &Kind, ops: &[NodeRef]) -> Result<SortRef> {
        if kind.is_input() || !kind.arity().contains(&ops.len()) {
            return Err(NodeError::InvalidArity(kind.to_string(), ops.len()));
        }
        for op in ops {
            self.get(*op)?;
        }
        let sort = match kind {
            Kind::Const(bv) => {
                if bv.width() == 0 {
                    return Err(NodeError::ZeroWidth);
                }
                Sort::BitVec(bv.width())
            }
            Kind::Slice { upper, lower } => {
                let w = self.expect_bitvec(ops[0])?;
                if upper < lower || *upper >= w {
                    return Err(NodeError::InvalidSlice(ops[0], *upper, *lower, w));
                }
                Sort::BitVec(upper - lower + 1)
            }
            Kind::And | Kind::Add | Kind::Mul | Kind::Udiv | Kind::Urem => {
                Sort::BitVec(self.expect_same_bitvec(ops[0], ops[1])?)
            }
            Kind::Ult => {
                self.expect_same_bitvec(ops[0], ops[1])?;
                Sort::BitVec(1)
            }
            Kind::Eq => {
                let sort = self.expect_same_sort(ops[0], ops[1])?;
                if !sort.is_bitvec() && !sort.is_array() {
                    return Err(NodeError::UnexpectedSort(ops[0], "a bit-vector or an array", (*sort).clone()));
                }
                Sort::BitVec(1)
            }
            Kind::Sll | Kind::Srl => {
                let w = self.expect_bitvec(ops[0])?;
                let s = self.expect_bitvec(ops[1])?;
                if w <= 1 || !w.is_power_of_two() || s != w.trailing_zeros() {
                    return Err(NodeError::InvalidShift(ops[0], ops[1]));
                }
                Sort::BitVec(w)
            }
            Kind::Concat => Sort::BitVec(self.expect_bitvec(ops[0])? + self.expect_bitvec(ops[1])?),
            Kind::Read => {
                let (index, element) = self.expect_array(ops[0])?;
                if self.expect_bitvec(ops[1])? != index {
                    let sort = (*self.get_sort(ops[1])?).clone();
                    return Err(NodeError::UnexpectedSort(ops[1], "an index of the array's index width", sort));
                }
                Sort::BitVec(element)
            }
            Kind::Write => {
                let (index, element) = self.expect_array(ops[0])?;
                if self.expect_bitvec(ops[1])? != index {
                    let sort = (*self.get_sort(ops[1])?).clone();
                    return Err(NodeError::UnexpectedSort(ops[1], "an index of the array's index width", sort));
                }
                if self.expect_bitvec(ops[2])? != element {
                    let sort = (*self.get_sort(ops[2])?).clone();
                    return Err(NodeError::UnexpectedSort(ops[2], "a value of the array's element width", sort));
                }
                return self.get_sort(ops[0]);
            }
            Kind::Cond => {
                self.expect_bool(ops[0])?;
                let sort = self.expect_same_sort(ops[1], ops[2])?;
                if !sort.is_bitvec() && !sort.is_array() {
                    return Err(NodeError::UnexpectedSort(ops[1], "a bit-vector or an array", (*sort).clone()));
                }
                return Ok(sort);
            }
            Kind::Lambda => {
                let param = self.expect_param(ops[0])?;
                let width = param.sort.get_width().unwrap_or(0);
                match *self.get_sort(ops[1])? {
                    Sort::BitVec(codomain) => Sort::Fun {
                        domain: vec![width],
                        codomain,
                    },
                    Sort::Fun {
                        ref domain,
                        codomain,
                    } => {
                        let mut d = vec![width];
                        d.extend_from_slice(domain);
                        Sort::Fun { domain: d, codomain }
                    }
                    ref other => {
                        return Err(NodeError::UnexpectedSort(ops[1], "a bit-vector or a function", other.clone()))
                    }
                }
            }
            Kind::Args => {
                let mut widths = Vec::new();
                for (i, op) in ops.iter().enumerate() {
                    match *self.get_sort(*op)? {
                        Sort::BitVec(w) => widths.push(w),
                        Sort::Tuple(ref rest) if i == ops.len() - 1 && i == 2 => widths.extend_from_slice(rest),
                        ref other => return Err(NodeError::UnexpectedSort(*op, "a bit-vector", other.clone())),
                    }
                }
                Sort::Tuple(widths)
            }
            Kind::Apply => {
                let fun_sort = self.get_sort(ops[0])?;
                let (domain, codomain) = match *fun_sort {
                    Sort::Fun {
                        ref domain,
                        codomain,
                    } => (domain, codomain),
                    ref other => return Err(NodeError::UnexpectedSort(ops[0], "a function", other.clone())),
                };
                match *self.get_sort(ops[1])? {
                    Sort::Tuple(ref widths) if widths.len() != domain.len() => {
                        return Err(NodeError::ArityMismatch(ops[0], domain.len(), widths.len()))
                    }
                    Sort::Tuple(ref widths) if widths != domain => {
                        return Err(NodeError::SortIntegrity(
                            ops[0],
                            ops[1],
                            (*fun_sort).clone(),
                            Sort::Tuple(widths.clone()),
                        ))
                    }
                    Sort::Tuple(_) => {}
                    ref other => return Err(NodeError::UnexpectedSort(ops[1], "an argument list", other.clone())),
                }
                Sort::BitVec(codomain)
            }
            Kind::Var | Kind::Array | Kind::Uf | Kind::Param => unreachable!(),
        };
        Ok(Rc::new(sort))
    }

    fn alloc(&mut self, kind: Kind, ops: Vec<NodeRef>, sort: SortRef, symbol: Option<String>) -> NodeRef {
        let id = NodeId(self.nodes.len() as u32);
        trace!("new node {} {} {:?}", id, kind, ops);
        if let Some(s) = &symbol {
            self.symbols.insert(s.clone(), id);
        }
        self.nodes.push(Some(Node {
            kind,
            ops,
            sort,
            symbol,
            refs: 1,
            bound: false,
        }));
        self.live += 1;
        NodeRef::new(id)
    }

    /// Returns the canonical node for `(kind, ops)` without rewriting it,
    /// creating it if absent. The result is an owned reference.
    pub fn make(&mut self, kind: Kind, ops: Vec<NodeRef>) -> Result<NodeRef> {
        if let Kind::Const(bv) = &kind {
            if bv.bit(0) {
                return Err(NodeError::InvalidConst(bv.to_string()));
            }
        }
        let sort = self.infer_sort(&kind, &ops)?;
        let key = (kind, ops);
        if let Some(id) = self.unique.get(&key).copied() {
            self.get_mut(id)?.refs += 1;
            return Ok(NodeRef::new(id));
        }
        let (kind, ops) = key;
        if kind == Kind::Lambda {
            let param = self.get_mut(ops[0].get_id())?;
            if param.bound {
                return Err(NodeError::BoundParam(ops[0]));
            }
            param.bound = true;
        }
        for op in &ops {
            self.get_mut(op.get_id())?.refs += 1;
        }
        let node = self.alloc(kind.clone(), ops.clone(), sort, None);
        self.unique.insert((kind, ops), node.get_id());
        Ok(node)
    }

    /// Looks up a composite node without creating or counting it.
    pub fn find(&self, kind: &Kind, ops: &[NodeRef]) -> Option<NodeRef> {
        self.unique
            .get(&(kind.clone(), ops.to_vec()))
            .map(|id| NodeRef::new(*id))
    }

    /// Constants are stored with a cleared least significant bit, so odd
    /// values come back as inverted references.
    pub fn make_const(&mut self, bv: BitVec) -> Result<NodeRef> {
        if bv.width() == 0 {
            return Err(NodeError::ZeroWidth);
        }
        if bv.bit(0) {
            Ok(!self.make(Kind::Const(bv.invert()), vec![])?)
        } else {
            self.make(Kind::Const(bv), vec![])
        }
    }

    /// Creates a fresh input. Inputs are never shared, even with identical arguments.
    pub fn new_input(&mut self, kind: Kind, sort: SortRef, symbol: Option<&str>) -> Result<NodeRef> {
        let valid = match (&kind, &*sort) {
            (Kind::Var | Kind::Param, Sort::BitVec(w)) => *w > 0,
            (Kind::Array, Sort::Array { index, element }) => *index > 0 && *element > 0,
            (Kind::Uf, Sort::Fun { domain, codomain }) => {
                !domain.is_empty() && *codomain > 0 && domain.iter().all(|w| *w > 0)
            }
            _ => false,
        };
        if !valid {
            return Err(NodeError::InvalidArity(format!("{} of sort {}", kind, sort), 0));
        }
        if let Some(s) = symbol {
            if self.symbols.contains_key(s) {
                return Err(NodeError::DuplicateSymbol(s.to_owned()));
            }
        }
        Ok(self.alloc(kind, vec![], sort, symbol.map(str::to_owned)))
    }

    pub fn copy(&mut self, node: NodeRef) -> Result<NodeRef> {
        self.get_mut(node.get_id())?.refs += 1;
        Ok(node)
    }

    /// Drops one reference. Nodes reaching zero are destroyed and their
    /// operands released in turn, using a worklist instead of recursion.
    pub fn release(&mut self, node: NodeRef) -> Result<()> {
        let id = node.get_id();
        if !self.is_live(id) {
            if (id.0 as usize) < self.nodes.len() && id.0 != 0 {
                return Err(NodeError::ZeroRefCount(id));
            }
            return Err(NodeError::InvalidNode(id));
        }
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let n = self.get_mut(id)?;
            n.refs -= 1;
            if n.refs > 0 {
                continue;
            }
            let Some(Node { kind, ops, symbol, .. }) = self.nodes[id.0 as usize].take() else {
                continue;
            };
            trace!("destroy node {} {}", id, kind);
            if let Some(s) = symbol {
                self.symbols.remove(&s);
            }
            stack.extend(ops.iter().map(|op| op.get_id()));
            if !kind.is_input() {
                self.unique.remove(&(kind, ops));
            }
            self.live -= 1;
        }
        Ok(())
    }

    /// Copies the live node with the given id, if any.
    pub fn match_id(&mut self, id: u32) -> Result<NodeRef> {
        self.copy(NodeRef::new(NodeId(id)))
    }

    /// Flattens a chained argument list.
    pub fn args_of(&self, args: NodeRef) -> Result<Vec<NodeRef>> {
        let mut result = Vec::new();
        let mut cur = args;
        loop {
            let node = self.get(cur)?;
            if node.kind != Kind::Args {
                return Err(NodeError::UnexpectedSort(cur, "an argument list", (*node.sort).clone()));
            }
            match node.ops.split_last() {
                Some((last, init)) if node.ops.len() == 3 && self.get_kind(*last)? == &Kind::Args => {
                    result.extend_from_slice(init);
                    cur = *last;
                }
                _ => {
                    result.extend_from_slice(&node.ops);
                    return Ok(result);
                }
            }
        }
    }

    /// Parameters of a chain of lambdas and the innermost body.
    pub fn lambda_params(&self, fun: NodeRef) -> Result<(Vec<NodeRef>, NodeRef)> {
        let mut params = Vec::new();
        let mut cur = fun;
        while let Node {
            kind: Kind::Lambda,
            ops,
            ..
        } = self.get(cur)?
        {
            params.push(ops[0]);
            cur = ops[1];
        }
        Ok((params, cur))
    }

    /// Base ids of all nodes reachable from `roots`, operands before users.
    pub fn topological(&self, roots: &[NodeRef]) -> Result<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(NodeId, bool)> = roots.iter().rev().map(|r| (r.get_id(), false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            let node = self.get(NodeRef::new(id))?;
            for op in node.ops.iter().rev() {
                if !visited.contains(&op.get_id()) {
                    stack.push((op.get_id(), false));
                }
            }
        }
        Ok(order)
    }

    /// Parameters reachable from `root` that no enclosing lambda binds.
    pub fn free_params(&self, root: NodeRef) -> Result<BTreeSet<NodeId>> {
        let mut free: HashMap<NodeId, BTreeSet<NodeId>> = HashMap::new();
        for id in self.topological(&[root])? {
            let node = self.get(NodeRef::new(id))?;
            let mut set = BTreeSet::new();
            if node.kind == Kind::Param {
                set.insert(id);
            }
            for op in &node.ops {
                if let Some(s) = free.get(&op.get_id()) {
                    set.extend(s.iter().copied());
                }
            }
            if node.kind == Kind::Lambda {
                set.remove(&node.ops[0].get_id());
            }
            free.insert(id, set);
        }
        Ok(free.remove(&root.get_id()).unwrap_or_default())
    }

    /// Index of the first argument whose sort does not match `fun`'s domain.
    pub fn fun_sort_check(&self, args: &[NodeRef], fun: NodeRef) -> Result<Option<usize>> {
        let domain = match *self.get_sort(fun)? {
            Sort::Fun { ref domain, .. } => domain.clone(),
            ref other => return Err(NodeError::UnexpectedSort(fun, "a function", other.clone())),
        };
        if args.len() != domain.len() {
            return Err(NodeError::ArityMismatch(fun, domain.len(), args.len()));
        }
        for (i, (arg, w)) in args.iter().zip(domain.iter()).enumerate() {
            if *self.get_sort(*arg)? != Sort::BitVec(*w) {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::NodeStore;
    use crate::node::{bitvec_sort, BitVec, Kind, NodeError, Sort};
    use std::rc::Rc;

    fn var(store: &mut NodeStore, w: u32, name: &str) -> crate::node::NodeRef {
        store.new_input(Kind::Var, bitvec_sort(w), Some(name)).unwrap()
    }

    #[test]
    fn hash_consing() {
        let mut store = NodeStore::new();
        let x = var(&mut store, 8, "x");
        let y = var(&mut store, 8, "y");
        let a = store.make(Kind::Add, vec![x, y]).unwrap();
        let b = store.make(Kind::Add, vec![x, y]).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.get_refs(a).unwrap(), 2);
        assert_eq!(store.get_refs(x).unwrap(), 2);
        store.release(b).unwrap();
        assert_eq!(store.get_refs(a).unwrap(), 1);
    }

    #[test]
    fn inputs_are_fresh() {
        let mut store = NodeStore::new();
        let x = store.new_input(Kind::Var, bitvec_sort(8), None).unwrap();
        let y = store.new_input(Kind::Var, bitvec_sort(8), None).unwrap();
        assert_ne!(x, y);
        assert_eq!(
            store.new_input(Kind::Var, bitvec_sort(8), None).unwrap().get_id().get(),
            y.get_id().get() + 1
        );
    }

    #[test]
    fn constants_are_canonical() {
        let mut store = NodeStore::new();
        let one = store.make_const(BitVec::one(4)).unwrap();
        assert!(one.is_inverted());
        let ones = store.make_const(BitVec::ones(4)).unwrap();
        assert_eq!(store.const_value(ones), Some(BitVec::ones(4)));
        let zero = store.make_const(BitVec::zero(4)).unwrap();
        assert_eq!(!ones, zero);
        assert!(matches!(
            store.make(Kind::Const(BitVec::one(4)), vec![]),
            Err(NodeError::InvalidConst(_))
        ));
    }

    #[test]
    fn deep_release_is_iterative() {
        let mut store = NodeStore::new();
        let x = var(&mut store, 8, "x");
        let mut acc = store.copy(x).unwrap();
        for _ in 0..200_000 {
            let next = store.make(Kind::Add, vec![acc, x]).unwrap();
            store.release(acc).unwrap();
            acc = next;
        }
        assert_eq!(store.live_count(), 200_001);
        store.release(acc).unwrap();
        assert_eq!(store.live_count(), 1);
        assert_eq!(store.get_refs(x).unwrap(), 1);
    }

    #[test]
    fn double_release() {
        let mut store = NodeStore::new();
        let x = var(&mut store, 8, "x");
        store.release(x).unwrap();
        assert_eq!(store.release(x), Err(NodeError::ZeroRefCount(x.get_id())));
        assert!(matches!(store.copy(x), Err(NodeError::InvalidNode(_))));
        // the symbol is free again
        var(&mut store, 8, "x");
    }

    #[test]
    fn slice_bounds() {
        let mut store = NodeStore::new();
        let x = var(&mut store, 8, "x");
        assert!(matches!(
            store.make(Kind::Slice { upper: 2, lower: 3 }, vec![x]),
            Err(NodeError::InvalidSlice(_, 2, 3, 8))
        ));
        assert!(matches!(
            store.make(Kind::Slice { upper: 8, lower: 0 }, vec![x]),
            Err(NodeError::InvalidSlice(_, 8, 0, 8))
        ));
        let s = store.make(Kind::Slice { upper: 7, lower: 4 }, vec![x]).unwrap();
        assert_eq!(store.get_width(s).unwrap(), 4);
    }

    #[test]
    fn sort_checks() {
        let mut store = NodeStore::new();
        let x = var(&mut store, 8, "x");
        let y = var(&mut store, 4, "y");
        assert!(matches!(
            store.make(Kind::Add, vec![x, y]),
            Err(NodeError::SortIntegrity(..))
        ));
        assert!(matches!(
            store.make(Kind::Cond, vec![x, x, x]),
            Err(NodeError::UnexpectedSort(..))
        ));
        let a = store
            .new_input(Kind::Array, Rc::new(Sort::Array { index: 4, element: 8 }), None)
            .unwrap();
        assert!(store.make(Kind::Read, vec![a, x]).is_err());
        let r = store.make(Kind::Read, vec![a, y]).unwrap();
        assert_eq!(store.get_width(r).unwrap(), 8);
        assert!(store.make(Kind::Write, vec![a, y, y]).is_err());
    }

    #[test]
    fn params_bind_once() {
        let mut store = NodeStore::new();
        let p = store.new_input(Kind::Param, bitvec_sort(8), None).unwrap();
        let x = var(&mut store, 8, "x");
        let body = store.make(Kind::Add, vec![p, x]).unwrap();
        let f = store.make(Kind::Lambda, vec![p, body]).unwrap();
        assert!(store.get(p).unwrap().is_bound());
        // the same function is shared
        assert_eq!(store.make(Kind::Lambda, vec![p, body]).unwrap(), f);
        let other = store.make(Kind::And, vec![p, x]).unwrap();
        assert_eq!(
            store.make(Kind::Lambda, vec![p, other]),
            Err(NodeError::BoundParam(p))
        );
        assert!(store.free_params(f).unwrap().is_empty());
        assert_eq!(store.free_params(body).unwrap().len(), 1);
    }

    #[test]
    fn clone_keeps_ids() {
        let mut store = NodeStore::new();
        let x = var(&mut store, 8, "x");
        let y = var(&mut store, 8, "y");
        let a = store.make(Kind::Add, vec![x, y]).unwrap();
        let mut copy = store.clone();
        assert_eq!(copy.get_kind(a).unwrap(), &Kind::Add);
        assert_eq!(copy.get_symbol(x).unwrap(), Some("x"));
        let m = copy.make(Kind::Mul, vec![x, y]).unwrap();
        assert!(store.get(m).is_err());
        assert_eq!(store.get_refs(x).unwrap(), 2);
        assert_eq!(copy.get_refs(x).unwrap(), 3);
    }
}
