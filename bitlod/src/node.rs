pub mod ast;
pub mod bitvec;
pub mod builder;
pub mod error;
pub mod sort;
pub mod store;

pub use ast::{Kind, Node, NodeId, NodeRef, Tag};
pub use bitvec::BitVec;
pub use builder::Builder;
pub use error::NodeError;
pub use sort::{bitvec_sort, bool_sort, fun_sort, Sort, SortRef};
pub use store::NodeStore;
