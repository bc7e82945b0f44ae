//! Non-recursive substitution over node DAGs.
//!
//! A [`NodeMap`] is both the input mapping and the result cache: every node
//! visited during a substitution ends up mapped to its image, so deep terms
//! are processed with an explicit stack and shared subterms only once.

use super::NodeMap;
use crate::node::error::{NodeError, Result};
use crate::node::builder::Binder;
use crate::node::{Builder, Kind, NodeRef};
use log::trace;

const BINDER: Binder = Binder {
    instantiate,
    rename_param,
};

impl Builder {
    pub fn new() -> Self {
        Builder::with_binder(BINDER)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hooks into [`substitute_with`].
pub trait NodeMapper {
    /// Image of the base node `node` before its operands are visited.
    /// Returned references are owned by the caller.
    fn map(&mut self, b: &mut Builder, node: NodeRef) -> Result<Option<NodeRef>>;

    /// Forces a rebuild of `node` even though none of its operands changed.
    fn rebuild(&mut self, _b: &Builder, _node: NodeRef) -> Result<bool> {
        Ok(false)
    }
}

struct Identity;

impl NodeMapper for Identity {
    fn map(&mut self, _b: &mut Builder, _node: NodeRef) -> Result<Option<NodeRef>> {
        Ok(None)
    }
}

/// Functions are closed, so substituting into one never changes it. During
/// forced beta reduction, applications of functions are rebuilt so that the
/// rewriter can reduce them.
struct ClosedLambdas;

impl NodeMapper for ClosedLambdas {
    fn map(&mut self, b: &mut Builder, node: NodeRef) -> Result<Option<NodeRef>> {
        if b.get_kind(node)? == &Kind::Lambda {
            return Ok(Some(b.copy(node)?));
        }
        Ok(None)
    }

    fn rebuild(&mut self, b: &Builder, node: NodeRef) -> Result<bool> {
        if !b.force_beta {
            return Ok(false);
        }
        let n = b.get(node)?;
        Ok(n.get_kind() == &Kind::Apply && b.get_kind(n.get_op(0))? == &Kind::Lambda)
    }
}

pub fn substitute(b: &mut Builder, map: &mut NodeMap, root: NodeRef) -> Result<NodeRef> {
    substitute_with(b, map, &mut Identity, root)
}

/// Returns an owned copy of `root` with every mapped node replaced by its
/// image. Nodes whose operands are unchanged are shared, not rebuilt.
pub fn substitute_with(
    b: &mut Builder,
    map: &mut NodeMap,
    mapper: &mut dyn NodeMapper,
    root: NodeRef,
) -> Result<NodeRef> {
    let mut stack = vec![(root.base(), false)];
    while let Some((node, expanded)) = stack.pop() {
        if map.contains(node) {
            continue;
        }
        if !expanded {
            if let Some(image) = mapper.map(b, node)? {
                map.insert(b.store_mut(), node, image)?;
                b.release(image)?;
                continue;
            }
            stack.push((node, true));
            for op in b.get_ops(node)?.iter().rev() {
                if !map.contains(*op) {
                    stack.push((op.base(), false));
                }
            }
            continue;
        }
        let (kind, ops) = {
            let n = b.get(node)?;
            (n.get_kind().clone(), n.get_ops().to_vec())
        };
        let new_ops = ops
            .iter()
            .map(|op| map.get(*op).ok_or(NodeError::InvalidNode(op.get_id())))
            .collect::<Result<Vec<_>>>()?;
        let image = if new_ops != ops || mapper.rebuild(b, node)? {
            trace!("substitute rebuild {} {}", node, kind);
            b.rebuild(kind, new_ops)?
        } else {
            b.copy(node)?
        };
        map.insert(b.store_mut(), node, image)?;
        b.release(image)?;
    }
    let image = map.get(root).ok_or(NodeError::InvalidNode(root.get_id()))?;
    b.copy(image)
}

/// Replaces the bound parameter `old` by `fresh` inside `body`.
pub fn rename_param(b: &mut Builder, body: NodeRef, old: NodeRef, fresh: NodeRef) -> Result<NodeRef> {
    let mut map = NodeMap::new();
    map.insert(b.store_mut(), old, fresh)?;
    let result = substitute(b, &mut map, body);
    map.delete(b.store_mut())?;
    result
}

/// Body of the function `fun` with its parameters bound to the flattened
/// argument list `args`.
pub fn instantiate(b: &mut Builder, fun: NodeRef, args: NodeRef) -> Result<NodeRef> {
    let (params, body) = b.lambda_params(fun)?;
    let args = b.args_of(args)?;
    if params.len() != args.len() {
        return Err(NodeError::ArityMismatch(fun, params.len(), args.len()));
    }
    let mut map = NodeMap::new();
    for (p, a) in params.iter().zip(args.iter()) {
        map.insert(b.store_mut(), *p, *a)?;
    }
    let result = substitute_with(b, &mut map, &mut ClosedLambdas, body);
    map.delete(b.store_mut())?;
    result
}

/// Eliminates every application of a function reachable from `root`,
/// regardless of the configured rewrite level.
pub fn beta_reduce(b: &mut Builder, root: NodeRef) -> Result<NodeRef> {
    let saved = b.force_beta;
    b.force_beta = true;
    let mut map = NodeMap::new();
    let result = substitute_with(b, &mut map, &mut ClosedLambdas, root);
    b.force_beta = saved;
    map.delete(b.store_mut())?;
    result
}
