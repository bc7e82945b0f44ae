use super::{BitVec, SortRef};
use bitflags::bitflags;
use std::fmt::{self, Display};
use std::ops::Not;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Tag: u8 {
        const INVERTED = 0b00000001;
    }
}

/// A tagged reference to a node. Every edge, handle and map entry is one of
/// these; bitwise negation is a tag flip and never a node of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef {
    id: NodeId,
    tag: Tag,
}

impl NodeRef {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            tag: Tag::empty(),
        }
    }

    pub fn get_id(&self) -> NodeId {
        self.id
    }

    pub fn get_tag(&self) -> Tag {
        self.tag
    }

    pub fn is_inverted(&self) -> bool {
        self.tag.contains(Tag::INVERTED)
    }

    /// The untagged reference to the same node.
    pub fn base(&self) -> Self {
        Self::new(self.id)
    }

    pub fn with_tag(&self, tag: Tag) -> Self {
        Self { id: self.id, tag }
    }

    /// Applies the tag of `self` on top of `other`.
    pub fn retag(&self, other: NodeRef) -> Self {
        Self {
            id: other.id,
            tag: other.tag ^ self.tag,
        }
    }

    pub fn invert_if(&self, cond: bool) -> Self {
        if cond {
            !*self
        } else {
            *self
        }
    }
}

impl Not for NodeRef {
    type Output = NodeRef;

    fn not(self) -> Self::Output {
        Self {
            id: self.id,
            tag: self.tag ^ Tag::INVERTED,
        }
    }
}

impl Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_inverted() {
            write!(f, "-{}", self.id)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Canonical constant; its least significant bit is always zero.
    Const(BitVec),
    Var,
    Array,
    Uf,
    Param,
    Slice { upper: u32, lower: u32 },
    And,
    Eq,
    Add,
    Mul,
    Ult,
    Sll,
    Srl,
    Udiv,
    Urem,
    Concat,
    Read,
    Write,
    Cond,
    Lambda,
    Args,
    Apply,
}

impl Kind {
    /// Inputs are never hash-consed.
    pub fn is_input(&self) -> bool {
        matches!(self, Kind::Var | Kind::Array | Kind::Uf | Kind::Param)
    }

    pub fn is_commutative(&self) -> bool {
        matches!(self, Kind::And | Kind::Eq | Kind::Add | Kind::Mul)
    }

    pub fn arity(&self) -> std::ops::RangeInclusive<usize> {
        match self {
            Kind::Const(_) | Kind::Var | Kind::Array | Kind::Uf | Kind::Param => 0..=0,
            Kind::Slice { .. } => 1..=1,
            Kind::Write | Kind::Cond => 3..=3,
            Kind::Args => 1..=3,
            _ => 2..=2,
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Const(bv) => write!(f, "const {}", bv),
            Kind::Slice { upper, lower } => write!(f, "slice[{}:{}]", upper, lower),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) kind: Kind,
    pub(crate) ops: Vec<NodeRef>,
    pub(crate) sort: SortRef,
    pub(crate) symbol: Option<String>,
    pub(crate) refs: u32,
    pub(crate) bound: bool,
}

impl Node {
    pub fn get_kind(&self) -> &Kind {
        &self.kind
    }
    pub fn get_ops(&self) -> &[NodeRef] {
        &self.ops
    }
    pub fn get_op(&self, i: usize) -> NodeRef {
        self.ops[i]
    }
    pub fn get_sort(&self) -> SortRef {
        self.sort.clone()
    }
    pub fn get_symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }
    pub fn get_refs(&self) -> u32 {
        self.refs
    }
    pub fn is_bound(&self) -> bool {
        self.bound
    }
    pub fn is_array(&self) -> bool {
        self.sort.is_array()
    }
    pub fn is_fun(&self) -> bool {
        self.sort.is_fun()
    }
}
