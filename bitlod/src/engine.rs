//! The solving session: assertions, assumptions and the refinement loop.

use crate::aig::{AigManager, AigRef};
use crate::bitblast::{self, BitBlaster, EncodingMap};
use crate::error::{Error, Result, Status};
use crate::lemma::{self, Lemma, ModelView, Premise, TheoryIndex};
use crate::map::aig_map::{self, AigMap};
use crate::map::{lower, subst};
use crate::node::{Builder, NodeId, NodeRef};
use crate::options::{self, OptionInfo, Options};
use crate::sat::{SatBackend, SatManager, SatResult, SatStats, VarisatBackend};
use log::{debug, info};
use quick_cache::unsync::Cache;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::{Deref, DerefMut};

const MODEL_CACHE_SIZE: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Encoding,
    CandidateFound,
    Refining,
    Sat,
    Unsat,
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub sat_calls: u64,
    pub refinements: u64,
    pub lemmas: u64,
}

/// A solving session over its own node store.
///
/// Terms are built through the [`Builder`] the session dereferences to.
/// Asserted terms hold for the whole session, assumed terms for the next
/// check only. Terms are lowered lazily when a check starts, and array and
/// function consistency is enforced by lemmas on demand.
pub struct Solver {
    builder: Builder,
    options: Options,
    pub(crate) aig: AigManager,
    pub(crate) sat: SatManager,
    pub(crate) enc: EncodingMap,
    assertions: Vec<NodeRef>,
    encoded: usize,
    /// `(handle, reduced root)`; the root is owned.
    assumptions: Vec<(NodeRef, NodeRef)>,
    last_assumptions: Vec<(NodeRef, AigRef)>,
    clauses: Vec<Vec<AigRef>>,
    array_eqs: Vec<NodeRef>,
    witnessed: usize,
    ext_reads: Vec<NodeRef>,
    lemmas: HashSet<Lemma>,
    pub(crate) state: State,
    solved: bool,
    stats: SolverStats,
    pub(crate) arrays: HashMap<NodeId, BTreeMap<String, String>>,
    pub(crate) ufs: HashMap<NodeId, BTreeMap<String, String>>,
    pub(crate) model_cache: RefCell<Cache<NodeRef, String>>,
}

impl Deref for Solver {
    type Target = Builder;

    fn deref(&self) -> &Self::Target {
        &self.builder
    }
}

impl DerefMut for Solver {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.builder
    }
}

impl Solver {
    pub fn new() -> Result<Self> {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Result<Self> {
        let mut builder = Builder::new();
        builder.set_rewrite_level(options.rewrite_level)?;
        Ok(Self {
            builder,
            options,
            aig: AigManager::new(),
            sat: SatManager::new(Box::new(VarisatBackend::new()))?,
            enc: EncodingMap::new(),
            assertions: Vec::new(),
            encoded: 0,
            assumptions: Vec::new(),
            last_assumptions: Vec::new(),
            clauses: Vec::new(),
            array_eqs: Vec::new(),
            witnessed: 0,
            ext_reads: Vec::new(),
            lemmas: HashSet::new(),
            state: State::Idle,
            solved: false,
            stats: SolverStats::default(),
            arrays: HashMap::new(),
            ufs: HashMap::new(),
            model_cache: RefCell::new(Cache::new(MODEL_CACHE_SIZE)),
        })
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn set_opt(&mut self, name: &str, value: u32) -> Result<()> {
        let mut next = self.options.clone();
        next.set(name, value)?;
        if next.rewrite_level != self.options.rewrite_level {
            self.builder.set_rewrite_level(next.rewrite_level)?;
        }
        info!("option {} set to {}", name, value);
        self.options = next;
        Ok(())
    }

    pub fn get_opt(&self, name: &str) -> Result<u32> {
        self.options.get(name)
    }

    pub fn opt_info(&self, name: &str) -> Result<&'static OptionInfo> {
        options::opt_info(name)
    }

    /// Replaces the backend. Only possible before anything was lowered.
    pub fn set_sat_backend(&mut self, backend: Box<dyn SatBackend>) -> Result<()> {
        if self.solved || !self.enc.is_empty() {
            return Err(Error::Backend(
                backend.name(),
                "the backend can not change once clauses were added".to_owned(),
            ));
        }
        self.sat = SatManager::new(backend)?;
        Ok(())
    }

    pub fn sat_stats(&self) -> SatStats {
        self.sat.stats()
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn status(&self) -> Status {
        match self.state {
            State::Sat => Status::Sat,
            State::Unsat => Status::Unsat,
            _ => Status::Unknown,
        }
    }

    fn check_root(&self, node: NodeRef) -> Result<()> {
        self.builder.expect_bool(node)?;
        if let Some(p) = self.builder.free_params(node)?.into_iter().next() {
            return Err(Error::UnboundParam(NodeRef::new(p)));
        }
        Ok(())
    }

    /// Adds `node` to the formula for the rest of the session.
    pub fn assert(&mut self, node: NodeRef) -> Result<()> {
        self.check_root(node)?;
        let root = subst::beta_reduce(&mut self.builder, node)?;
        self.assertions.push(root);
        Ok(())
    }

    /// Adds `node` to the formula for the next check only.
    pub fn assume(&mut self, node: NodeRef) -> Result<()> {
        if !self.options.incremental {
            return Err(Error::NotIncremental("assume"));
        }
        self.check_root(node)?;
        let root = subst::beta_reduce(&mut self.builder, node)?;
        self.assumptions.push((node, root));
        Ok(())
    }

    /// Whether the assumption `node` of the last unsatisfiable check is in
    /// the failed core. `node` is the handle that was passed to `assume`.
    pub fn failed(&self, node: NodeRef) -> Result<bool> {
        if self.state != State::Unsat {
            return Err(Error::NotUnsat);
        }
        let bit = self
            .last_assumptions
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, b)| *b)
            .ok_or(Error::NotAssumed(node))?;
        let lit = self.aig.lit(&self.sat, bit)?;
        Ok(self.sat.failed(lit))
    }

    /// Verdict from the assertions alone when they are all constant.
    pub fn simplify(&self) -> Status {
        let mut all_true = true;
        let assumed = self.assumptions.iter().map(|(_, root)| root);
        for root in self.assertions.iter().chain(assumed) {
            match self.builder.const_value(*root) {
                Some(v) if v.is_zero() => return Status::Unsat,
                Some(_) => {}
                None => all_true = false,
            }
        }
        if all_true {
            Status::Sat
        } else {
            Status::Unknown
        }
    }

    pub fn sat(&mut self) -> Result<Status> {
        self.limited_sat(None, None)
    }

    /// Checks the formula. `lod_limit` bounds the refinement rounds and
    /// `sat_limit` the conflicts of each backend call; running out of
    /// either answers `Unknown`.
    ///
    /// Assumptions are dropped when the call returns, also on error. A
    /// failed call leaves the session `Idle` without a model.
    pub fn limited_sat(&mut self, lod_limit: Option<u32>, sat_limit: Option<u64>) -> Result<Status> {
        if self.solved && !self.options.incremental {
            return Err(Error::NotIncremental("a repeated check"));
        }
        self.solved = true;
        self.stats.sat_calls += 1;
        self.model_cache.get_mut().clear();
        self.arrays.clear();
        self.ufs.clear();

        let mut assumed = Vec::with_capacity(self.assumptions.len());
        let outcome = self.refine(&mut assumed, lod_limit, sat_limit);
        let released = self.drop_assumptions(assumed);
        let status = match outcome.and_then(|status| released.map(|_| status)) {
            Ok(status) => status,
            Err(e) => {
                self.state = State::Idle;
                return Err(e);
            }
        };
        self.state = match status {
            Status::Sat => State::Sat,
            Status::Unsat => State::Unsat,
            Status::Unknown => State::Unknown,
        };
        Ok(status)
    }

    /// Releases the assumptions of the current call. Their gates replace
    /// those of the previous call for `failed`.
    fn drop_assumptions(&mut self, assumed: Vec<(NodeRef, AigRef)>) -> Result<()> {
        let mut first = Ok(());
        for (_, bit) in std::mem::replace(&mut self.last_assumptions, assumed) {
            first = first.and(self.aig.release(bit));
        }
        for (_, root) in std::mem::take(&mut self.assumptions) {
            first = first.and(self.builder.release(root).map_err(Error::from));
        }
        first
    }

    fn refine(
        &mut self,
        assumed: &mut Vec<(NodeRef, AigRef)>,
        lod_limit: Option<u32>,
        sat_limit: Option<u64>,
    ) -> Result<Status> {
        self.state = State::Encoding;
        self.encode_assertions()?;
        for (node, root) in self.assumptions.clone() {
            self.encode(root)?;
            assumed.push((node, self.bit(root)?));
        }

        let mut rounds = 0;
        let status = loop {
            self.encode_witnesses()?;
            for (_, bit) in assumed.iter() {
                let lit = self.aig.lit(&self.sat, *bit)?;
                self.sat.assume(lit)?;
            }
            match self.sat.solve(sat_limit)? {
                SatResult::Unsat => break Status::Unsat,
                SatResult::Unknown => break Status::Unknown,
                SatResult::Sat => self.state = State::CandidateFound,
            }

            let check = {
                let roots: Vec<NodeRef> = self
                    .assertions
                    .iter()
                    .chain(self.assumptions.iter().map(|(_, root)| root))
                    .chain(self.ext_reads.iter())
                    .copied()
                    .collect();
                let index = TheoryIndex::new(self.builder.store(), &roots)?;
                let view = ModelView {
                    enc: &self.enc,
                    aig: &self.aig,
                    sat: &self.sat,
                };
                lemma::check(self.builder.store(), &view, &index)?
            };
            self.state = State::Refining;
            if check.lemmas.is_empty() {
                self.arrays = check.arrays;
                self.ufs = check.ufs;
                break Status::Sat;
            }
            if lod_limit.map_or(false, |limit| rounds >= limit) {
                break Status::Unknown;
            }
            let mut added = 0;
            for lemma in check.lemmas {
                if self.lemmas.insert(lemma.clone()) {
                    self.add_lemma(&lemma)?;
                    added += 1;
                }
            }
            if added == 0 {
                return Err(Error::Internal("refinement produced no new lemma".to_owned()));
            }
            rounds += 1;
            self.stats.refinements += 1;
            self.stats.lemmas += added;
            debug!("refinement round {} added {} lemmas", rounds, added);
            self.state = State::Encoding;
        };
        info!("check {} answered {} after {} refinements", self.stats.sat_calls, status, rounds);
        Ok(status)
    }

    fn encode(&mut self, root: NodeRef) -> Result<()> {
        let mut blaster = BitBlaster {
            aig: &mut self.aig,
            sat: &mut self.sat,
            enc: &mut self.enc,
            array_eqs: &mut self.array_eqs,
        };
        lower::lower(self.builder.store_mut(), &mut blaster, root)
    }

    /// Owned gate of an encoded width one node.
    fn bit(&mut self, node: NodeRef) -> Result<AigRef> {
        let bit = self.enc.get_bit(node).ok_or(Error::NotEncoded(node))?;
        self.aig.copy(bit)
    }

    fn add_clause(&mut self, clause: Vec<AigRef>) -> Result<()> {
        let lits = clause
            .iter()
            .map(|b| self.aig.lit(&self.sat, *b))
            .collect::<Result<Vec<_>>>()?;
        self.sat.add_clause(&lits)?;
        self.clauses.push(clause);
        Ok(())
    }

    fn encode_assertions(&mut self) -> Result<()> {
        while self.encoded < self.assertions.len() {
            let root = self.assertions[self.encoded];
            self.encode(root)?;
            let bit = self.bit(root)?;
            self.add_clause(vec![bit])?;
            self.encoded += 1;
        }
        Ok(())
    }

    /// For every new array equality `e = (x == y)`, adds `e | x[k] != y[k]`
    /// over a fresh index `k`.
    fn encode_witnesses(&mut self) -> Result<()> {
        while self.witnessed < self.array_eqs.len() {
            let e = self.array_eqs[self.witnessed];
            self.witnessed += 1;
            let (x, y) = {
                let n = self.builder.get(e)?;
                (n.get_op(0), n.get_op(1))
            };
            let width = self.builder.get_index_width(x)?;
            let k = self.builder.new_var(width, None)?;
            let rx = self.builder.new_read(x, k)?;
            let ry = self.builder.new_read(y, k)?;
            self.builder.release(k)?;
            self.ext_reads.extend([rx, ry]);
            self.encode(rx)?;
            self.encode(ry)?;
            let same = self.eq_gate(rx, ry)?;
            let eb = self.bit(e)?;
            self.add_clause(vec![eb, !same])?;
        }
        Ok(())
    }

    fn eq_gate(&mut self, a: NodeRef, b: NodeRef) -> Result<AigRef> {
        let x = self.enc.get(a).ok_or(Error::NotEncoded(a))?;
        let y = self.enc.get(b).ok_or(Error::NotEncoded(b))?;
        let g = bitblast::eq(&mut self.aig, &x, &y)?;
        self.aig.to_cnf(&mut self.sat, g)?;
        Ok(g)
    }

    /// Adds the clause `!p1 | ... | !pn | left == right`.
    fn add_lemma(&mut self, lemma: &Lemma) -> Result<()> {
        let mut clause = Vec::with_capacity(lemma.premises.len() + 1);
        for p in &lemma.premises {
            let lit = match *p {
                Premise::Equal(a, b) => !self.eq_gate(a, b)?,
                Premise::Differ(a, b) => self.eq_gate(a, b)?,
                Premise::Cond(c, value) => self.bit(c)?.invert_if(value),
                Premise::ArrayEq(e) => !self.bit(e)?,
            };
            clause.push(lit);
        }
        let (left, right) = lemma.conclusion;
        clause.push(self.eq_gate(left, right)?);
        self.add_clause(clause)
    }

    /// Independent copy of the session with identical node ids. The gate
    /// graph is compacted and replayed into a fresh backend, so the copy
    /// starts idle and answers model queries only after its own check.
    pub fn try_clone(&mut self) -> Result<Solver> {
        let builder = self.builder.clone();
        let mut aig = AigManager::new();
        let mut sat = self.sat.fresh()?;
        let mut map = AigMap::new();
        let roots: Vec<AigRef> = self
            .enc
            .iter()
            .flat_map(|(_, bits)| bits.iter().copied())
            .chain(self.clauses.iter().flatten().copied())
            .collect();
        aig_map::clone_cones(&mut self.aig, &mut aig, &mut map, &roots)?;

        let mapped = |map: &AigMap, b: AigRef| {
            map.get(b)
                .ok_or_else(|| Error::Internal(format!("gate {} was not cloned", b)))
        };
        let mut enc = EncodingMap::new();
        for (id, bits) in self.enc.iter() {
            let mut cloned = Vec::with_capacity(bits.len());
            for b in bits {
                let c = mapped(&map, *b)?;
                aig.to_cnf(&mut sat, c)?;
                cloned.push(aig.copy(c)?);
            }
            enc.insert_owned(id, cloned);
        }
        let mut clauses = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            let mut cloned = Vec::with_capacity(clause.len());
            let mut lits = Vec::with_capacity(clause.len());
            for b in clause {
                let c = mapped(&map, *b)?;
                aig.to_cnf(&mut sat, c)?;
                lits.push(aig.lit(&sat, c)?);
                cloned.push(aig.copy(c)?);
            }
            sat.add_clause(&lits)?;
            clauses.push(cloned);
        }
        map.delete(&mut self.aig, &mut aig)?;
        debug!("cloned {} nodes and {} gates", builder.live_count(), aig.live_count());

        Ok(Solver {
            builder,
            options: self.options.clone(),
            aig,
            sat,
            enc,
            assertions: self.assertions.clone(),
            encoded: self.encoded,
            assumptions: self.assumptions.clone(),
            last_assumptions: Vec::new(),
            clauses,
            array_eqs: self.array_eqs.clone(),
            witnessed: self.witnessed,
            ext_reads: self.ext_reads.clone(),
            lemmas: self.lemmas.clone(),
            state: State::Idle,
            solved: self.solved,
            stats: self.stats,
            arrays: HashMap::new(),
            ufs: HashMap::new(),
            model_cache: RefCell::new(Cache::new(MODEL_CACHE_SIZE)),
        })
    }
}

#[cfg(test)]
mod test {
    use super::{Solver, State};
    use crate::error::{Error, Result, Status};
    use crate::node::NodeRef;
    use crate::sat::{SatBackend, SatResult, SatStats, Value, VarisatBackend};

    fn solver(level: u32) -> Solver {
        let mut s = Solver::new().unwrap();
        s.set_opt("rewrite_level", level).unwrap();
        s.set_opt("model_gen", 1).unwrap();
        s
    }

    fn value(s: &Solver, node: NodeRef) -> u64 {
        u64::from_str_radix(&s.bv_assignment(node).unwrap(), 2).unwrap()
    }

    #[test]
    fn read_after_write_at_the_same_index() {
        let mut s = solver(1);
        let a = s.new_array(8, 4, Some("a")).unwrap();
        let i = s.new_var(4, Some("i")).unwrap();
        let v = s.new_var(8, Some("v")).unwrap();
        let w = s.new_write(a, i, v).unwrap();
        let r = s.new_read(w, i).unwrap();
        let c = s.new_unsigned_int(42, 8).unwrap();
        let e = s.new_eq(r, c).unwrap();
        s.assert(e).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Sat);
        assert_eq!(value(&s, r), 42);
        assert_eq!(value(&s, v), 42);
    }

    fn congruence(level: u32) -> Solver {
        let mut s = solver(level);
        let d = s.bitvec_sort(8).unwrap();
        let sort = s.fun_sort(&[d.clone()], &d).unwrap();
        let f = s.new_uf(&sort, Some("f")).unwrap();
        let x = s.new_var(8, Some("x")).unwrap();
        let y = s.new_var(8, Some("y")).unwrap();
        let fx = s.new_apply(&[x], f).unwrap();
        let fy = s.new_apply(&[y], f).unwrap();
        let same = s.new_eq(x, y).unwrap();
        let differ = s.new_ne(fx, fy).unwrap();
        s.assert(same).unwrap();
        s.assert(differ).unwrap();
        s
    }

    #[test]
    fn congruence_needs_one_round() {
        let mut s = congruence(3);
        assert_eq!(s.sat().unwrap(), Status::Unsat);
        assert!(s.stats().refinements <= 1);
        assert_eq!(s.state(), State::Unsat);
    }

    #[test]
    fn budgets_answer_unknown() {
        let mut s = congruence(3);
        assert_eq!(s.limited_sat(Some(0), None).unwrap(), Status::Unknown);
        let mut s = congruence(3);
        assert_eq!(s.limited_sat(Some(0), Some(0)).unwrap(), Status::Unknown);
        let mut s = congruence(3);
        assert_eq!(s.limited_sat(None, None).unwrap(), Status::Unsat);
    }

    #[test]
    fn conflict_limits_stop_the_search() {
        // 251 is prime, so it has no factors above one
        let product = |s: &mut Solver| {
            let x = s.new_var(8, Some("x")).unwrap();
            let y = s.new_var(8, Some("y")).unwrap();
            let wx = s.new_uext(x, 8).unwrap();
            let wy = s.new_uext(y, 8).unwrap();
            let xy = s.new_mul(wx, wy).unwrap();
            let p = s.new_unsigned_int(251, 16).unwrap();
            let one = s.new_one(8).unwrap();
            for c in [s.new_eq(xy, p).unwrap(), s.new_ugt(x, one).unwrap(), s.new_ugt(y, one).unwrap()] {
                s.assert(c).unwrap();
            }
        };
        let mut s = solver(3);
        product(&mut s);
        assert_eq!(s.limited_sat(Some(0), Some(1)).unwrap(), Status::Unknown);
        assert_eq!(s.state(), State::Unknown);
        let mut s = solver(3);
        product(&mut s);
        assert_eq!(s.limited_sat(Some(0), None).unwrap(), Status::Unsat);
    }

    #[test]
    fn sum_to_zero() {
        let mut s = solver(3);
        let x = s.new_var(8, Some("x")).unwrap();
        let y = s.new_var(8, Some("y")).unwrap();
        let sum = s.new_add(x, y).unwrap();
        let zero = s.new_zero(8).unwrap();
        let c1 = s.new_eq(sum, zero).unwrap();
        let c2 = s.new_ne(x, zero).unwrap();
        s.assert(c1).unwrap();
        s.assert(c2).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Sat);
        let (vx, vy) = (value(&s, x), value(&s, y));
        assert_ne!(vx, 0);
        assert_eq!((vx + vy) % 256, 0);
        assert_eq!(vy, (256 - vx) % 256);
    }

    #[test]
    fn reads_through_conditionals() {
        let build = |taken: bool| {
            let mut s = solver(0);
            let a = s.new_array(8, 4, None).unwrap();
            let i = s.new_var(4, None).unwrap();
            let v = s.new_var(8, None).unwrap();
            let c = s.new_var(1, None).unwrap();
            let w = s.new_write(a, i, v).unwrap();
            let ite = s.new_cond(c, w, a).unwrap();
            let r = s.new_read(ite, i).unwrap();
            let missed = s.new_ne(r, v).unwrap();
            s.assert(if taken { c } else { !c }).unwrap();
            s.assert(missed).unwrap();
            s
        };
        assert_eq!(build(true).sat().unwrap(), Status::Unsat);
        assert_eq!(build(false).sat().unwrap(), Status::Sat);
    }

    #[test]
    fn reads_skip_writes_at_other_indices() {
        let mut s = solver(0);
        let a = s.new_array(8, 4, None).unwrap();
        let i = s.new_var(4, Some("i")).unwrap();
        let j = s.new_var(4, Some("j")).unwrap();
        let v = s.new_var(8, None).unwrap();
        let u = s.new_var(8, None).unwrap();
        let w1 = s.new_write(a, i, v).unwrap();
        let w2 = s.new_write(w1, j, u).unwrap();
        let r = s.new_read(w2, i).unwrap();
        let apart = s.new_ne(i, j).unwrap();
        let missed = s.new_ne(r, v).unwrap();
        s.assert(apart).unwrap();
        s.assert(missed).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Unsat);
    }

    #[test]
    fn reads_cross_equal_arrays() {
        let mut s = solver(0);
        let a = s.new_array(8, 4, None).unwrap();
        let b = s.new_array(8, 4, None).unwrap();
        let i = s.new_var(4, Some("i")).unwrap();
        let j = s.new_var(4, Some("j")).unwrap();
        let v = s.new_var(8, None).unwrap();
        let w = s.new_write(b, i, v).unwrap();
        let rw = s.new_read(w, j).unwrap();
        let ra = s.new_read(a, j).unwrap();
        let same = s.new_eq(a, b).unwrap();
        let apart = s.new_ne(i, j).unwrap();
        let differ = s.new_ne(rw, ra).unwrap();
        for c in [same, apart, differ] {
            s.assert(c).unwrap();
        }
        assert_eq!(s.sat().unwrap(), Status::Unsat);
    }

    #[test]
    fn extensionality() {
        let mut s = solver(3);
        let a = s.new_array(8, 4, None).unwrap();
        let b = s.new_array(8, 4, None).unwrap();
        let i = s.new_var(4, None).unwrap();
        let ra = s.new_read(a, i).unwrap();
        let rb = s.new_read(b, i).unwrap();
        let same = s.new_eq(a, b).unwrap();
        let differ = s.new_ne(ra, rb).unwrap();
        s.assert(same).unwrap();
        s.assert(differ).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Unsat);

        let mut s = solver(3);
        let a = s.new_array(8, 4, None).unwrap();
        let b = s.new_array(8, 4, None).unwrap();
        let same = s.new_eq(a, b).unwrap();
        s.assert(!same).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Sat);
    }

    #[test]
    fn model_queries() {
        let mut s = solver(3);
        let a = s.new_array(8, 4, Some("a")).unwrap();
        let i = s.new_var(4, Some("i")).unwrap();
        let r = s.new_read(a, i).unwrap();
        let five = s.new_unsigned_int(5, 8).unwrap();
        let three = s.new_unsigned_int(3, 4).unwrap();
        let c1 = s.new_eq(r, five).unwrap();
        let c2 = s.new_eq(i, three).unwrap();
        let d = s.bitvec_sort(8).unwrap();
        let sort = s.fun_sort(&[d.clone(), d.clone()], &d).unwrap();
        let f = s.new_uf(&sort, Some("f")).unwrap();
        let x = s.new_unsigned_int(2, 8).unwrap();
        let app = s.new_apply(&[x, r], f).unwrap();
        let seven = s.new_unsigned_int(7, 8).unwrap();
        let c3 = s.new_eq(app, seven).unwrap();
        let unused = s.new_var(4, None).unwrap();
        for c in [c1, c2, c3] {
            s.assert(c).unwrap();
        }
        assert!(matches!(s.bv_assignment(r), Err(Error::NoModel(Status::Unknown))));
        assert_eq!(s.sat().unwrap(), Status::Sat);
        assert_eq!(s.bv_assignment(r).unwrap(), "00000101");
        assert_eq!(s.bv_assignment(!r).unwrap(), "11111010");
        assert_eq!(s.bv_assignment(unused).unwrap(), "xxxx");

        // terms built after the check are evaluated from the model
        let two = s.new_unsigned_int(2, 8).unwrap();
        let sum = s.new_add(r, two).unwrap();
        assert_eq!(s.bv_assignment(sum).unwrap(), "00000111");
        assert_eq!(s.bv_assignment(!sum).unwrap(), "11111000");
        let k = s.new_unsigned_int(3, 4).unwrap();
        let rk = s.new_read(a, k).unwrap();
        assert_eq!(s.bv_assignment(rk).unwrap(), "00000101");
        let app_k = s.new_apply(&[x, rk], f).unwrap();
        assert_eq!(s.bv_assignment(app_k).unwrap(), "00000111");
        let z = s.new_var(8, None).unwrap();
        let open = s.new_add(r, z).unwrap();
        assert_eq!(s.bv_assignment(open).unwrap(), "xxxxxxxx");
        assert_eq!(
            s.array_assignment(a).unwrap(),
            vec![("0011".to_owned(), "00000101".to_owned())]
        );
        assert_eq!(
            s.uf_assignment(f).unwrap(),
            vec![("00000010 00000101".to_owned(), "00000111".to_owned())]
        );
    }

    #[test]
    fn models_need_model_gen() {
        let mut s = Solver::new().unwrap();
        let x = s.new_var(4, None).unwrap();
        let t = s.new_redor(x).unwrap();
        s.assert(t).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Sat);
        assert!(matches!(s.bv_assignment(x), Err(Error::ModelGenDisabled)));
    }

    #[test]
    fn assumptions_and_failed_core() {
        let mut s = solver(3);
        let x = s.new_var(1, Some("x")).unwrap();
        let y = s.new_var(1, Some("y")).unwrap();
        let either = s.new_or(x, y).unwrap();
        s.assert(either).unwrap();
        assert!(matches!(s.assume(!x), Err(Error::NotIncremental(_))));
        s.set_opt("incremental", 1).unwrap();
        s.assume(!x).unwrap();
        s.assume(!y).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Unsat);
        assert!(s.failed(!x).unwrap());
        assert!(s.failed(!y).unwrap());
        assert!(matches!(s.failed(x), Err(Error::NotAssumed(_))));
        assert_eq!(s.sat().unwrap(), Status::Sat);
        assert!(matches!(s.failed(!x), Err(Error::NotUnsat)));
        s.assume(!x).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Sat);
        assert_eq!(s.bv_assignment(y).unwrap(), "1");
    }

    #[test]
    fn failed_takes_the_assumed_handle() {
        let mut s = solver(1);
        s.set_opt("incremental", 1).unwrap();
        let p = s.new_param(8, None).unwrap();
        let one = s.new_one(8).unwrap();
        let body = s.new_add(p, one).unwrap();
        let f = s.new_fun(&[p], body).unwrap();
        let x = s.new_var(8, Some("x")).unwrap();
        let zero = s.new_zero(8).unwrap();
        let start = s.new_eq(x, zero).unwrap();
        s.assert(start).unwrap();
        let app = s.new_apply(&[x], f).unwrap();
        let five = s.new_unsigned_int(5, 8).unwrap();
        let goal = s.new_eq(app, five).unwrap();
        s.assume(goal).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Unsat);
        assert!(s.failed(goal).unwrap());
    }

    /// Delegates to varisat but fails the `n`th solve.
    struct FailingSolve {
        inner: VarisatBackend,
        n: u64,
    }

    impl SatBackend for FailingSolve {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn init(&mut self) -> Result<()> {
            self.inner.init()
        }

        fn add(&mut self, lit: i32) -> Result<()> {
            self.inner.add(lit)
        }

        fn assume(&mut self, lit: i32) -> Result<()> {
            self.inner.assume(lit)
        }

        fn solve(&mut self, conflict_limit: Option<u64>) -> Result<SatResult> {
            let fail = self.n == 1;
            self.n = self.n.saturating_sub(1);
            if fail {
                return Err(Error::Backend("failing", "solve failed".to_owned()));
            }
            self.inner.solve(conflict_limit)
        }

        fn deref(&self, lit: i32) -> Value {
            self.inner.deref(lit)
        }

        fn failed(&self, lit: i32) -> bool {
            self.inner.failed(lit)
        }

        fn reset(&mut self) -> Result<()> {
            self.inner.reset()
        }

        fn stats(&self) -> SatStats {
            self.inner.stats()
        }

        fn fresh(&self) -> Box<dyn SatBackend> {
            Box::new(VarisatBackend::new())
        }
    }

    #[test]
    fn errors_drop_the_assumptions() {
        let mut s = solver(3);
        s.set_opt("incremental", 1).unwrap();
        s.set_sat_backend(Box::new(FailingSolve {
            inner: VarisatBackend::new(),
            n: 2,
        }))
        .unwrap();
        let x = s.new_var(1, Some("x")).unwrap();
        let y = s.new_var(1, Some("y")).unwrap();
        let either = s.new_or(x, y).unwrap();
        s.assert(either).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Sat);
        let refs = s.get_refs(x).unwrap();
        s.assume(!x).unwrap();
        s.assume(!y).unwrap();
        assert!(matches!(s.sat(), Err(Error::Backend("failing", _))));
        assert_eq!(s.state(), State::Idle);
        assert_eq!(s.get_refs(x).unwrap(), refs);
        assert!(matches!(s.bv_assignment(x), Err(Error::NoModel(Status::Unknown))));
        assert_eq!(s.sat().unwrap(), Status::Sat);
    }

    #[test]
    fn repeated_checks_need_incremental() {
        let mut s = solver(3);
        let x = s.new_var(1, None).unwrap();
        s.assert(x).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Sat);
        assert!(matches!(s.sat(), Err(Error::NotIncremental(_))));
    }

    #[test]
    fn functions_are_reduced_before_lowering() {
        let mut s = solver(0);
        let p = s.new_param(8, None).unwrap();
        let one = s.new_one(8).unwrap();
        let body = s.new_add(p, one).unwrap();
        let f = s.new_fun(&[p], body).unwrap();
        let x = s.new_var(8, Some("x")).unwrap();
        let app = s.new_apply(&[x], f).unwrap();
        let five = s.new_unsigned_int(5, 8).unwrap();
        let goal = s.new_eq(app, five).unwrap();
        let stray = s.new_eq(p, x).unwrap();
        assert!(matches!(s.assert(stray), Err(Error::UnboundParam(_))));
        s.assert(goal).unwrap();
        assert_eq!(s.sat().unwrap(), Status::Sat);
        assert_eq!(value(&s, x), 4);
    }

    #[test]
    fn constant_verdicts() {
        let mut s = solver(3);
        assert_eq!(s.simplify(), Status::Sat);
        let x = s.new_var(8, None).unwrap();
        let e = s.new_eq(x, x).unwrap();
        s.assert(e).unwrap();
        assert_eq!(s.simplify(), Status::Sat);
        let l = s.new_ult(x, x).unwrap();
        s.assert(l).unwrap();
        assert_eq!(s.simplify(), Status::Unsat);
        assert_eq!(s.sat().unwrap(), Status::Unsat);
    }

    #[test]
    fn clones_are_independent() {
        let mut s = congruence(3);
        s.set_opt("incremental", 1).unwrap();
        let before = s.live_count();
        let mut c = s.try_clone().unwrap();
        assert_eq!(c.live_count(), before);
        for (id, node) in s.store().iter() {
            let twin = c.store().get(NodeRef::new(id)).unwrap();
            assert_eq!(twin.get_kind(), node.get_kind());
            assert_eq!(twin.get_refs(), node.get_refs());
            assert_eq!(twin.get_symbol(), node.get_symbol());
        }
        assert_eq!(c.sat().unwrap(), Status::Unsat);
        assert_eq!(s.state(), State::Idle);
        assert_eq!(s.sat().unwrap(), Status::Unsat);

        let z = c.new_var(8, None).unwrap();
        assert!(s.store().get(z).is_err());

        // cloning after a check replays the lemmas
        let mut d = s.try_clone().unwrap();
        assert_eq!(d.state(), State::Idle);
        assert_eq!(d.sat().unwrap(), Status::Unsat);
        assert_eq!(d.stats().refinements, s.stats().refinements);
    }
}
