use crate::node::{NodeError, NodeRef};
use std::fmt::{self, Display};

pub type Result<T> = std::result::Result<T, Error>;

/// Exit code reserved for front ends that fail to parse their input.
pub const PARSE_ERROR: i32 = 1;

/// Verdict of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Unknown = 0,
    Sat = 10,
    Unsat = 20,
}

impl Status {
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => write!(f, "unknown"),
            Status::Sat => write!(f, "sat"),
            Status::Unsat => write!(f, "unsat"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Term construction failed: {0}")]
    Node(#[from] NodeError),

    #[error("SAT backend {0} failed: {1}")]
    Backend(&'static str, String),

    #[error("Parameter {0} is not bound by an enclosing function.")]
    UnboundParam(NodeRef),

    #[error("{0} needs incremental solving to be enabled.")]
    NotIncremental(&'static str),

    #[error("Model generation is disabled.")]
    ModelGenDisabled,

    #[error("No model is available after a {0} verdict.")]
    NoModel(Status),

    #[error("Node {0} was not assumed in the last check.")]
    NotAssumed(NodeRef),

    #[error("Failed assumptions are only available after an unsat verdict.")]
    NotUnsat,

    #[error("Node {0} has no bit-level encoding.")]
    NotEncoded(NodeRef),

    #[error("AIG node {0} does not exist.")]
    InvalidAig(u32),

    #[error("AIG node {0} is already mapped.")]
    AigAlreadyMapped(u32),

    #[error("Unknown option '{0}'.")]
    UnknownOption(String),

    #[error("Value {1} of option '{0}' is outside of [{2}, {3}].")]
    OptionRange(String, u32, u32, u32),

    #[error("Internal error: {0}")]
    Internal(String),
}
