use super::{NodeId, NodeRef, Sort};

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Node {0} does not belong to this store or was already destroyed.")]
    InvalidNode(NodeId),

    #[error("Node {0} was released with a zero reference count.")]
    ZeroRefCount(NodeId),

    #[error("Bit width must be greater than zero.")]
    ZeroWidth,

    #[error("{1} was expected for node {0}, but {2} was found.")]
    UnexpectedSort(NodeRef, &'static str, Sort),

    #[error("Sort {2} of node {0} and {3} of node {1} should be identical.")]
    SortIntegrity(NodeRef, NodeRef, Sort, Sort),

    #[error("Slice [{1}:{2}] is out of range for node {0} of width {3}.")]
    InvalidSlice(NodeRef, u32, u32, u32),

    #[error("Shift of node {0} by node {1} needs a power of two width above one and a log2 shift width.")]
    InvalidShift(NodeRef, NodeRef),

    #[error("Kind {0} can not be built from {1} operands.")]
    InvalidArity(String, usize),

    #[error("Invalid sort: {0}.")]
    InvalidSort(String),

    #[error("Node {0} is not a parameter.")]
    NotParam(NodeRef),

    #[error("Parameter {0} is already bound by a function.")]
    BoundParam(NodeRef),

    #[error("Parameter {0} occurs free in a function body.")]
    FreeParam(NodeRef),

    #[error("Function {0} expects {1} arguments, but {2} were given.")]
    ArityMismatch(NodeRef, usize, usize),

    #[error("'{0}' is not a valid bit-vector constant.")]
    InvalidConst(String),

    #[error("Symbol '{0}' is already in use.")]
    DuplicateSymbol(String),

    #[error("Node {0} is already mapped.")]
    AlreadyMapped(NodeRef),

    #[error("Rewrite level can not change once nodes exist.")]
    RewriteLevelLocked,
}
