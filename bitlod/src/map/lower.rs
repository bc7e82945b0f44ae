use crate::error::Result;
use crate::node::{NodeId, NodeRef, NodeStore};

/// Callback of [`lower`]: translates one base node once all of its
/// operands have been translated.
pub trait Lowering {
    fn is_lowered(&self, node: NodeId) -> bool;

    fn lower(&mut self, store: &mut NodeStore, node: NodeRef) -> Result<()>;
}

/// Post-order walk below `root` without recursion, skipping every node the
/// callback has already lowered.
pub fn lower(store: &mut NodeStore, lowering: &mut dyn Lowering, root: NodeRef) -> Result<()> {
    let mut stack = vec![(root.base(), false)];
    while let Some((node, expanded)) = stack.pop() {
        if lowering.is_lowered(node.get_id()) {
            continue;
        }
        if expanded {
            lowering.lower(store, node)?;
            continue;
        }
        stack.push((node, true));
        for op in store.get_ops(node)?.iter().rev() {
            if !lowering.is_lowered(op.get_id()) {
                stack.push((op.base(), false));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{lower, Lowering};
    use crate::error::Result;
    use crate::node::{Builder, NodeId, NodeRef, NodeStore};
    use std::collections::HashMap;

    /// Node depth, counted in operands.
    #[derive(Default)]
    struct Depth(HashMap<NodeId, usize>);

    impl Lowering for Depth {
        fn is_lowered(&self, node: NodeId) -> bool {
            self.0.contains_key(&node)
        }

        fn lower(&mut self, store: &mut NodeStore, node: NodeRef) -> Result<()> {
            let d = store
                .get_ops(node)?
                .iter()
                .map(|op| self.0[&op.get_id()] + 1)
                .max()
                .unwrap_or(0);
            self.0.insert(node.get_id(), d);
            Ok(())
        }
    }

    #[test]
    fn operands_first() {
        let mut b = Builder::new();
        b.set_rewrite_level(0).unwrap();
        let x = b.new_var(4, None).unwrap();
        let mut cur = b.copy(x).unwrap();
        for _ in 0..50_000 {
            let next = b.new_mul(cur, x).unwrap();
            b.release(cur).unwrap();
            cur = next;
        }
        let mut depth = Depth::default();
        lower(b.store_mut(), &mut depth, !cur).unwrap();
        assert_eq!(depth.0[&cur.get_id()], 50_000);
        assert_eq!(depth.0.len(), 50_001);
    }
}
