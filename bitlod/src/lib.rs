//! Bit-precise decision procedure for bit-vectors, arrays and
//! uninterpreted functions, built on a hash-consed term graph, lazy
//! bit-blasting and lemmas on demand over a pluggable SAT backend.

pub mod aig;
pub mod bitblast;
pub mod engine;
pub mod error;
pub mod lemma;
pub mod map;
pub mod model;
pub mod node;
pub mod options;
pub mod rewrite;
pub mod sat;

pub use engine::{Solver, SolverStats, State};
pub use error::{Error, Result, Status, PARSE_ERROR};
pub use node::{bitvec_sort, bool_sort, fun_sort, BitVec, Builder, Kind, NodeId, NodeRef, NodeStore, Sort, SortRef};
pub use options::{opt_info, opt_names, OptionInfo, Options};
pub use sat::{SatBackend, SatResult, SatStats, VarisatBackend};
