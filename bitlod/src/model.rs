use crate::engine::{Solver, State};
use crate::error::{Error, Result};
use crate::lemma::ModelView;
use crate::node::{BitVec, Kind, NodeError, NodeId, NodeRef};
use crate::rewrite::fold_const;
use std::collections::HashMap;

impl Solver {
    fn expect_model(&self) -> Result<()> {
        if !self.options().model_gen {
            return Err(Error::ModelGenDisabled);
        }
        if self.state != State::Sat {
            return Err(Error::NoModel(self.status()));
        }
        Ok(())
    }

    /// Value of a bit-vector term in the last model, most significant bit
    /// first. Bits the model leaves open read as `x`.
    pub fn bv_assignment(&self, node: NodeRef) -> Result<String> {
        self.expect_model()?;
        let width = self.expect_bitvec(node)?;
        if let Some(cached) = self.model_cache.borrow().get(&node) {
            return Ok(cached.clone());
        }
        let view = self.view();
        let value = if self.enc.contains(node.get_id()) {
            view.assignment(node)?
        } else {
            match self.evaluate(&view, node)? {
                Some(bv) => bv.to_bin_string(),
                None => "x".repeat(width as usize),
            }
        };
        self.model_cache.borrow_mut().insert(node, value.clone());
        Ok(value)
    }

    fn view(&self) -> ModelView<'_> {
        ModelView {
            enc: &self.enc,
            aig: &self.aig,
            sat: &self.sat,
        }
    }

    /// Value of a term that was never lowered, computed bottom-up from its
    /// cone. `None` is a value the model leaves open, such as an input that
    /// no assertion mentions.
    fn evaluate(&self, view: &ModelView, root: NodeRef) -> Result<Option<BitVec>> {
        let mut values: HashMap<NodeId, Option<BitVec>> = HashMap::new();
        let value_of = |values: &HashMap<NodeId, Option<BitVec>>, op: NodeRef| {
            values
                .get(&op.get_id())
                .cloned()
                .flatten()
                .map(|v| if op.is_inverted() { v.invert() } else { v })
        };
        for id in self.topological(&[root])? {
            let node = NodeRef::new(id);
            let n = self.get(node)?;
            let value = if !n.get_sort().is_bitvec() {
                None
            } else if self.enc.contains(id) {
                Some(view.value(node)?)
            } else {
                match n.get_kind() {
                    Kind::Const(bv) => Some(bv.clone()),
                    Kind::Read => {
                        let array = n.get_op(0).get_id();
                        value_of(&values, n.get_op(1)).and_then(|i| {
                            self.arrays
                                .get(&array)
                                .and_then(|entries| entries.get(&i.to_bin_string()))
                                .and_then(|v| BitVec::from_bin(v))
                        })
                    }
                    Kind::Apply => {
                        let fun = n.get_op(0).get_id();
                        let args = self
                            .args_of(n.get_op(1))?
                            .into_iter()
                            .map(|a| value_of(&values, a).map(|v| v.to_bin_string()))
                            .collect::<Option<Vec<_>>>();
                        args.and_then(|args| {
                            self.ufs
                                .get(&fun)
                                .and_then(|entries| entries.get(&args.join(" ")))
                                .and_then(|v| BitVec::from_bin(v))
                        })
                    }
                    kind => n
                        .get_ops()
                        .iter()
                        .map(|op| value_of(&values, *op))
                        .collect::<Option<Vec<_>>>()
                        .and_then(|vals| fold_const(kind, &vals)),
                }
            };
            values.insert(id, value);
        }
        Ok(value_of(&values, root))
    }

    /// `(index, value)` pairs observed by the reads of the last model.
    pub fn array_assignment(&self, node: NodeRef) -> Result<Vec<(String, String)>> {
        self.expect_model()?;
        self.expect_array(node)?;
        Ok(self
            .arrays
            .get(&node.get_id())
            .map(|entries| entries.iter().map(|(i, v)| (i.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    /// `(arguments, value)` pairs of the applications in the last model,
    /// with arguments separated by a space.
    pub fn uf_assignment(&self, node: NodeRef) -> Result<Vec<(String, String)>> {
        self.expect_model()?;
        let sort = self.get_sort(node)?;
        if !sort.is_fun() {
            return Err(NodeError::UnexpectedSort(node, "a function", (*sort).clone()).into());
        }
        Ok(self
            .ufs
            .get(&node.get_id())
            .map(|entries| entries.iter().map(|(a, v)| (a.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}
