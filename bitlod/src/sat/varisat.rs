use super::{SatBackend, SatResult, SatStats, Value};
use crate::error::{Error, Result};
use ::varisat::checker::{CheckedProofStep, CheckerData, ProofProcessor};
use ::varisat::solver::SolverError;
use ::varisat::{CnfFormula, ExtendFormula, Lit, Solver};
use log::{debug, trace};
use std::collections::HashSet;

/// Counts learned clauses and aborts the search once `limit` is spent.
struct ConflictBudget {
    limit: u64,
    spent: u64,
}

impl ProofProcessor for ConflictBudget {
    fn process_step(&mut self, step: &CheckedProofStep, _data: CheckerData) -> anyhow::Result<()> {
        if let CheckedProofStep::AtClause { .. } = step {
            self.spent += 1;
            if self.spent > self.limit {
                anyhow::bail!("conflict limit {} reached", self.limit);
            }
        }
        Ok(())
    }
}

/// [`SatBackend`] over the pure Rust `varisat` CDCL solver.
///
/// varisat has no conflict budget of its own. Unlimited calls go to one
/// incremental solver. A limited call replays the formula into a scratch
/// solver whose proof stream is watched by a [`ConflictBudget`], so every
/// learned clause is counted as a conflict.
pub struct VarisatBackend {
    solver: Solver<'static>,
    formula: CnfFormula,
    clause: Vec<Lit>,
    assumptions: Vec<Lit>,
    model: Vec<Option<bool>>,
    failed: HashSet<Lit>,
    stats: SatStats,
}

impl Default for VarisatBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VarisatBackend {
    pub fn new() -> Self {
        Self {
            solver: Solver::new(),
            formula: CnfFormula::new(),
            clause: Vec::new(),
            assumptions: Vec::new(),
            model: Vec::new(),
            failed: HashSet::new(),
            stats: SatStats::default(),
        }
    }

    fn record(&mut self, result: bool, model: Option<Vec<Lit>>, core: Option<Vec<Lit>>) -> SatResult {
        if result {
            for lit in model.unwrap_or_default() {
                let index = lit.var().index();
                if index >= self.model.len() {
                    self.model.resize(index + 1, None);
                }
                self.model[index] = Some(lit.is_positive());
            }
            SatResult::Sat
        } else {
            self.failed.extend(core.unwrap_or_default());
            SatResult::Unsat
        }
    }

    fn solve_limited(&mut self, assumptions: &[Lit], limit: u64) -> Result<SatResult> {
        let mut budget = ConflictBudget { limit, spent: 0 };
        let (outcome, model, core) = {
            let mut scratch = Solver::new();
            scratch.add_proof_processor(&mut budget);
            scratch.add_formula(&self.formula);
            scratch.assume(assumptions);
            let outcome = scratch.solve();
            (outcome, scratch.model(), scratch.failed_core().map(|c| c.to_vec()))
        };
        match outcome {
            Ok(result) => Ok(self.record(result, model, core)),
            Err(SolverError::ProofProcessorError { .. }) if budget.spent > limit => {
                debug!("varisat gave up after {} conflicts", limit);
                Ok(SatResult::Unknown)
            }
            Err(e) => Err(Error::Backend("varisat", e.to_string())),
        }
    }
}

impl SatBackend for VarisatBackend {
    fn name(&self) -> &'static str {
        "varisat"
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn add(&mut self, lit: i32) -> Result<()> {
        if lit == 0 {
            self.solver.add_clause(&self.clause);
            self.formula.add_clause(&self.clause);
            self.clause.clear();
            self.stats.clauses += 1;
        } else {
            self.clause.push(Lit::from_dimacs(lit as isize));
            self.stats.literals += 1;
        }
        Ok(())
    }

    fn assume(&mut self, lit: i32) -> Result<()> {
        if lit == 0 {
            return Err(Error::Backend(self.name(), "zero is not a literal".to_owned()));
        }
        self.assumptions.push(Lit::from_dimacs(lit as isize));
        self.stats.assumptions += 1;
        Ok(())
    }

    fn solve(&mut self, conflict_limit: Option<u64>) -> Result<SatResult> {
        self.stats.solves += 1;
        self.model.clear();
        self.failed.clear();
        let assumptions = std::mem::take(&mut self.assumptions);
        trace!("varisat solve with {} assumptions", assumptions.len());
        match conflict_limit {
            Some(0) => Ok(SatResult::Unknown),
            Some(limit) => self.solve_limited(&assumptions, limit),
            None => {
                self.solver.assume(&assumptions);
                let result = self
                    .solver
                    .solve()
                    .map_err(|e| Error::Backend("varisat", e.to_string()))?;
                let model = self.solver.model();
                let core = self.solver.failed_core().map(|c| c.to_vec());
                Ok(self.record(result, model, core))
            }
        }
    }

    fn deref(&self, lit: i32) -> Value {
        let l = Lit::from_dimacs(lit as isize);
        match self.model.get(l.var().index()).copied().flatten() {
            Some(v) if v == l.is_positive() => Value::True,
            Some(_) => Value::False,
            None => Value::DontCare,
        }
    }

    fn failed(&self, lit: i32) -> bool {
        self.failed.contains(&Lit::from_dimacs(lit as isize))
    }

    fn reset(&mut self) -> Result<()> {
        *self = VarisatBackend::new();
        Ok(())
    }

    fn stats(&self) -> SatStats {
        self.stats
    }

    fn fresh(&self) -> Box<dyn SatBackend> {
        Box::new(VarisatBackend::new())
    }
}
