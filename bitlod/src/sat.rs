pub mod varisat;

use crate::error::Result;
use log::debug;

pub use self::varisat::VarisatBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

/// Assignment of a literal in the last model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    True,
    False,
    DontCare,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SatStats {
    pub clauses: u64,
    pub literals: u64,
    pub assumptions: u64,
    pub solves: u64,
}

/// Narrow contract of an external incremental SAT solver. Literals are
/// DIMACS integers; a clause is a run of `add` calls terminated by `0`.
/// Assumptions hold for the next `solve` only.
pub trait SatBackend {
    fn name(&self) -> &'static str;

    fn init(&mut self) -> Result<()>;

    fn add(&mut self, lit: i32) -> Result<()>;

    fn assume(&mut self, lit: i32) -> Result<()>;

    /// `conflict_limit` bounds the search; `Unknown` reports that it ran out.
    fn solve(&mut self, conflict_limit: Option<u64>) -> Result<SatResult>;

    fn deref(&self, lit: i32) -> Value;

    /// Whether the assumption `lit` is part of the last unsatisfiable core.
    fn failed(&self, lit: i32) -> bool;

    fn reset(&mut self) -> Result<()>;

    fn stats(&self) -> SatStats;

    /// A new, empty backend of the same kind.
    fn fresh(&self) -> Box<dyn SatBackend>;
}

/// Owns a backend and hands out clause variable ids. Id 1 is reserved for
/// the constant true literal, fixed by a unit clause.
pub struct SatManager {
    backend: Box<dyn SatBackend>,
    next_cnf_id: i32,
    true_lit: i32,
}

impl std::fmt::Debug for SatManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatManager")
            .field("backend", &self.backend.name())
            .field("next_cnf_id", &self.next_cnf_id)
            .finish()
    }
}

impl SatManager {
    pub fn new(mut backend: Box<dyn SatBackend>) -> Result<Self> {
        backend.init()?;
        debug!("sat backend {}", backend.name());
        let mut sat = SatManager {
            backend,
            next_cnf_id: 1,
            true_lit: 0,
        };
        sat.true_lit = sat.next_cnf_id();
        let t = sat.true_lit;
        sat.add_clause(&[t])?;
        Ok(sat)
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Monotonic; an id is never handed out twice.
    pub fn next_cnf_id(&mut self) -> i32 {
        let id = self.next_cnf_id;
        self.next_cnf_id += 1;
        id
    }

    pub fn last_cnf_id(&self) -> i32 {
        self.next_cnf_id - 1
    }

    pub fn true_lit(&self) -> i32 {
        self.true_lit
    }

    pub fn add_clause(&mut self, lits: &[i32]) -> Result<()> {
        for lit in lits {
            self.backend.add(*lit)?;
        }
        self.backend.add(0)
    }

    pub fn assume(&mut self, lit: i32) -> Result<()> {
        self.backend.assume(lit)
    }

    pub fn solve(&mut self, conflict_limit: Option<u64>) -> Result<SatResult> {
        let result = self.backend.solve(conflict_limit)?;
        debug!("{} returned {:?}", self.backend.name(), result);
        Ok(result)
    }

    pub fn deref(&self, lit: i32) -> Value {
        self.backend.deref(lit)
    }

    pub fn failed(&self, lit: i32) -> bool {
        self.backend.failed(lit)
    }

    /// Clears the backend. Ids keep growing, and the true literal is
    /// asserted again.
    pub fn reset(&mut self) -> Result<()> {
        self.backend.reset()?;
        let t = self.true_lit;
        self.add_clause(&[t])
    }

    pub fn stats(&self) -> SatStats {
        self.backend.stats()
    }

    /// An empty manager over a new backend of the same kind.
    pub fn fresh(&self) -> Result<Self> {
        SatManager::new(self.backend.fresh())
    }
}
