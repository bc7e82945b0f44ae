pub mod aig_map;
pub mod lower;
pub mod node_map;
pub mod subst;

pub use aig_map::AigMap;
pub use lower::Lowering;
pub use node_map::NodeMap;
pub use subst::NodeMapper;
