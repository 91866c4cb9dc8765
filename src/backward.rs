//! Reverse sweep that accumulates gradients into every node reachable from a root.

use log::debug;

use crate::{
    error::Result,
    graph::{Node, Op, ScalarNode},
    topo::sequence,
};

/// Adds the contribution of node `idx` to the gradients of its operands.
/// Reads only the node's own gradient and writes only into its operands.
fn backprop_node(nodes: &mut [Node], idx: u32) {
    use Op::*;
    let grad = nodes[idx as usize].grad;
    match nodes[idx as usize].op {
        Leaf => (),
        Add(lhs, rhs) => {
            nodes[lhs as usize].grad += grad;
            nodes[rhs as usize].grad += grad;
        }
        Mul(lhs, rhs) => {
            let (lhs_data, rhs_data) = (nodes[lhs as usize].data, nodes[rhs as usize].data);
            nodes[lhs as usize].grad += rhs_data * grad;
            nodes[rhs as usize].grad += lhs_data * grad;
        }
        Pow { base, exponent } => {
            let base_data = nodes[base as usize].data;
            nodes[base as usize].grad += exponent * base_data.powf(exponent - 1.) * grad;
        }
        Relu(term) => {
            let slope = if nodes[idx as usize].data > 0. { 1. } else { 0. };
            nodes[term as usize].grad += slope * grad;
        }
    }
}

impl<'a> ScalarNode<'a> {
    /// Computes the derivative of this node with respect to every node it depends on.
    ///
    /// The root's gradient is set to 1. Every other gradient is added to, not
    /// overwritten, so repeated calls accumulate until the gradients are zeroed
    /// with [`ScalarNode::zero_gradient`] or [`crate::Graph::zero_gradients`].
    /// A graph with a cycle is rejected before any gradient changes.
    pub fn backward_propagate(&self) -> Result<()> {
        let mut nodes = self.graph.nodes.borrow_mut();
        let order = sequence(&nodes, self.idx)?;
        debug!("backward pass from a{} over {} nodes", self.idx, order.len());
        nodes[self.idx as usize].grad = 1.;
        for &idx in order.iter().rev() {
            backprop_node(&mut nodes, idx);
        }
        Ok(())
    }
}
