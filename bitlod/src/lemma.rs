//! Lemmas on demand for arrays and uninterpreted functions.
//!
//! Given a Boolean model of the encoded formula, every read is propagated
//! through the array nodes it may observe, and every pair of observations
//! that disagrees with the array axioms yields a lemma. Applications of the
//! same function are checked for congruence. Checking never mutates the
//! session; lemmas are turned into clauses by the caller.

use crate::aig::AigManager;
use crate::bitblast::EncodingMap;
use crate::error::{Error, Result};
use crate::node::{BitVec, Kind, NodeId, NodeRef, NodeStore};
use crate::sat::{SatManager, Value};
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// An atom a lemma is conditioned on, as it held in the model that
/// triggered the lemma.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Premise {
    Equal(NodeRef, NodeRef),
    Differ(NodeRef, NodeRef),
    Cond(NodeRef, bool),
    ArrayEq(NodeRef),
}

fn ordered(a: NodeRef, b: NodeRef) -> (NodeRef, NodeRef) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Premise {
    pub fn equal(a: NodeRef, b: NodeRef) -> Self {
        let (a, b) = ordered(a, b);
        Premise::Equal(a, b)
    }

    pub fn differ(a: NodeRef, b: NodeRef) -> Self {
        let (a, b) = ordered(a, b);
        Premise::Differ(a, b)
    }
}

/// `premises -> left == right`. Premises are sorted and unique, so a lemma
/// is its own de-duplication key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lemma {
    pub premises: Vec<Premise>,
    pub conclusion: (NodeRef, NodeRef),
}

impl Lemma {
    pub fn new(mut premises: Vec<Premise>, left: NodeRef, right: NodeRef) -> Self {
        premises.sort();
        premises.dedup();
        Self {
            premises,
            conclusion: ordered(left, right),
        }
    }
}

/// Read access to the current Boolean model through the encoding.
pub struct ModelView<'a> {
    pub enc: &'a EncodingMap,
    pub aig: &'a AigManager,
    pub sat: &'a SatManager,
}

impl<'a> ModelView<'a> {
    fn bit_values(&self, node: NodeRef) -> Result<Vec<Value>> {
        let bits = self.enc.get(node).ok_or(Error::NotEncoded(node))?;
        bits.iter()
            .map(|b| Ok(self.sat.deref(self.aig.lit(self.sat, *b)?)))
            .collect()
    }

    /// Unconstrained bits read as zero.
    pub fn value(&self, node: NodeRef) -> Result<BitVec> {
        let bits = self
            .bit_values(node)?
            .into_iter()
            .map(|v| v == Value::True)
            .collect();
        Ok(BitVec::from_bits(bits))
    }

    /// Most significant bit first, over `{0, 1, x}`.
    pub fn assignment(&self, node: NodeRef) -> Result<String> {
        Ok(self
            .bit_values(node)?
            .iter()
            .rev()
            .map(|v| match v {
                Value::True => '1',
                Value::False => '0',
                Value::DontCare => 'x',
            })
            .collect())
    }
}

/// Theory-relevant nodes below a set of roots.
#[derive(Debug, Default)]
pub struct TheoryIndex {
    pub reads: Vec<NodeRef>,
    pub applies: Vec<NodeRef>,
    /// Array-sorted users (writes, conditionals, equalities) of every array node.
    pub parents: HashMap<NodeId, Vec<NodeRef>>,
}

impl TheoryIndex {
    pub fn new(store: &NodeStore, roots: &[NodeRef]) -> Result<Self> {
        let mut index = TheoryIndex::default();
        for id in store.topological(roots)? {
            let node = NodeRef::new(id);
            let n = store.get(node)?;
            match n.get_kind() {
                Kind::Read => index.reads.push(node),
                Kind::Apply => index.applies.push(node),
                _ => {}
            }
            let array_user = n.is_array() || (n.get_kind() == &Kind::Eq && store.get_sort(n.get_op(0))?.is_array());
            if !array_user {
                continue;
            }
            for op in n.get_ops() {
                if store.get_sort(*op)?.is_array() {
                    let users = index.parents.entry(op.get_id()).or_default();
                    if !users.contains(&node) {
                        users.push(node);
                    }
                }
            }
        }
        Ok(index)
    }
}

/// Outcome of one consistency check.
#[derive(Debug, Default)]
pub struct Check {
    pub lemmas: Vec<Lemma>,
    /// Index to value, per array node, as observed by the reads.
    pub arrays: HashMap<NodeId, BTreeMap<String, String>>,
    /// Space-joined arguments to value, per function.
    pub ufs: HashMap<NodeId, BTreeMap<String, String>>,
}

struct Observation {
    read: NodeRef,
    index: NodeRef,
    premises: Vec<Premise>,
}

pub fn check(store: &NodeStore, view: &ModelView, index: &TheoryIndex) -> Result<Check> {
    let mut result = Check::default();
    let mut seen: HashMap<NodeId, HashMap<BitVec, Observation>> = HashMap::new();

    'reads: for read in &index.reads {
        let (array, i) = {
            let n = store.get(*read)?;
            (n.get_op(0), n.get_op(1))
        };
        let iv = view.value(i)?;
        let rv = view.value(*read)?;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([(array, Vec::<Premise>::new())]);
        while let Some((n, premises)) = queue.pop_front() {
            if !visited.insert(n.get_id()) {
                continue;
            }
            let slot = seen.entry(n.get_id()).or_default();
            match slot.get(&iv) {
                Some(first) => {
                    if view.value(first.read)? != rv {
                        let mut p = premises.clone();
                        p.extend(first.premises.iter().copied());
                        p.push(Premise::equal(i, first.index));
                        trace!("read {} contradicts read {} at {}", read, first.read, n);
                        result.lemmas.push(Lemma::new(p, *read, first.read));
                        continue 'reads;
                    }
                }
                None => {
                    slot.insert(
                        iv.clone(),
                        Observation {
                            read: *read,
                            index: i,
                            premises: premises.clone(),
                        },
                    );
                }
            }

            let (kind, ops) = {
                let node = store.get(n)?;
                (node.get_kind().clone(), node.get_ops().to_vec())
            };
            match kind {
                Kind::Write => {
                    let (j, v) = (ops[1], ops[2]);
                    if view.value(j)? == iv {
                        if view.value(v)? != rv {
                            let mut p = premises.clone();
                            p.push(Premise::equal(i, j));
                            trace!("read {} misses write {}", read, n);
                            result.lemmas.push(Lemma::new(p, *read, v));
                            continue 'reads;
                        }
                    } else {
                        let mut p = premises.clone();
                        p.push(Premise::differ(i, j));
                        queue.push_back((ops[0], p));
                    }
                }
                Kind::Cond => {
                    let c = view.value(ops[0])?.is_one();
                    let mut p = premises.clone();
                    p.push(Premise::Cond(ops[0], c));
                    queue.push_back((if c { ops[1] } else { ops[2] }, p));
                }
                _ => {}
            }

            for parent in index.parents.get(&n.get_id()).into_iter().flatten() {
                let (pkind, pops) = {
                    let node = store.get(*parent)?;
                    (node.get_kind().clone(), node.get_ops().to_vec())
                };
                match pkind {
                    Kind::Write if pops[0] == n => {
                        if view.value(pops[1])? != iv {
                            let mut p = premises.clone();
                            p.push(Premise::differ(i, pops[1]));
                            queue.push_back((*parent, p));
                        }
                    }
                    Kind::Cond => {
                        let c = view.value(pops[0])?.is_one();
                        let taken = if c { pops[1] } else { pops[2] };
                        if taken == n {
                            let mut p = premises.clone();
                            p.push(Premise::Cond(pops[0], c));
                            queue.push_back((*parent, p));
                        }
                    }
                    Kind::Eq => {
                        if view.value(*parent)?.is_one() {
                            let other = if pops[0] == n { pops[1] } else { pops[0] };
                            let mut p = premises.clone();
                            p.push(Premise::ArrayEq(*parent));
                            queue.push_back((other, p));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let mut calls: HashMap<NodeId, HashMap<Vec<BitVec>, (NodeRef, Vec<NodeRef>)>> = HashMap::new();
    for app in &index.applies {
        let (fun, args) = {
            let n = store.get(*app)?;
            (n.get_op(0), store.args_of(n.get_op(1))?)
        };
        let values = args
            .iter()
            .map(|a| view.value(*a))
            .collect::<Result<Vec<_>>>()?;
        let group = calls.entry(fun.get_id()).or_default();
        match group.get(&values) {
            Some((first, first_args)) => {
                if view.value(*first)? != view.value(*app)? {
                    let p = args
                        .iter()
                        .zip(first_args.iter())
                        .map(|(a, b)| Premise::equal(*a, *b))
                        .collect();
                    trace!("application {} is not congruent to {}", app, first);
                    result.lemmas.push(Lemma::new(p, *app, *first));
                }
            }
            None => {
                group.insert(values, (*app, args));
            }
        }
    }

    if !result.lemmas.is_empty() {
        debug!("{} theory conflicts", result.lemmas.len());
        return Ok(result);
    }

    for (id, slot) in &seen {
        let entries = result.arrays.entry(*id).or_default();
        for (iv, obs) in slot {
            entries.insert(iv.to_bin_string(), view.value(obs.read)?.to_bin_string());
        }
    }
    for (id, group) in &calls {
        let entries = result.ufs.entry(*id).or_default();
        for (values, (app, _)) in group {
            let key = values
                .iter()
                .map(|v| v.to_bin_string())
                .collect::<Vec<_>>()
                .join(" ");
            entries.insert(key, view.value(*app)?.to_bin_string());
        }
    }
    Ok(result)
}
