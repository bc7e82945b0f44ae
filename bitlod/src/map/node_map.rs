use crate::node::error::{NodeError, Result};
use crate::node::{NodeId, NodeRef, NodeStore};
use std::collections::HashMap;

/// Owning association from nodes to nodes.
///
/// Keys are base nodes. Looking up an inverted reference yields the inverted
/// image, so `map(~a) = ~map(a)`. The map holds one reference to every key
/// and every image until [`NodeMap::delete`] hands them back to the store.
#[derive(Debug, Default)]
pub struct NodeMap {
    table: HashMap<NodeId, NodeRef>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains(&self, src: NodeRef) -> bool {
        self.table.contains_key(&src.get_id())
    }

    pub fn insert(&mut self, store: &mut NodeStore, src: NodeRef, dst: NodeRef) -> Result<()> {
        if self.contains(src) {
            return Err(NodeError::AlreadyMapped(src));
        }
        store.get(src)?;
        store.get(dst)?;
        store.copy(src.base())?;
        store.copy(dst)?;
        self.table
            .insert(src.get_id(), dst.invert_if(src.is_inverted()));
        Ok(())
    }

    pub fn get(&self, src: NodeRef) -> Option<NodeRef> {
        self.table
            .get(&src.get_id())
            .map(|dst| dst.invert_if(src.is_inverted()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeRef, NodeRef)> + '_ {
        self.table
            .iter()
            .map(|(src, dst)| (NodeRef::new(*src), *dst))
    }

    pub fn delete(self, store: &mut NodeStore) -> Result<()> {
        for (src, dst) in self.table {
            store.release(NodeRef::new(src))?;
            store.release(dst)?;
        }
        Ok(())
    }
}
