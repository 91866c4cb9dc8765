//! Topological ordering of the nodes reachable from a root.

use log::{trace, warn};

use crate::{
    error::{Error, Result},
    graph::{Node, ScalarNode},
};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Depth-first post-order over operand edges, starting at `root`.
///
/// Uses an explicit stack, so deep graphs do not overflow the call stack.
/// Meeting a node that is still on the current path means the graph has a cycle.
pub(crate) fn sequence(nodes: &[Node], root: u32) -> Result<Vec<u32>> {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order = Vec::new();
    // (node, index of the next operand to visit)
    let mut stack = vec![(root, 0usize)];
    marks[root as usize] = Mark::OnPath;

    while let Some(top) = stack.last_mut() {
        let (idx, slot) = *top;
        let operands = nodes[idx as usize].op.operands();
        let Some(&next) = operands.get(slot) else {
            marks[idx as usize] = Mark::Done;
            trace!("sequence: a{idx} at position {}", order.len());
            order.push(idx);
            stack.pop();
            continue;
        };
        top.1 += 1;
        let Some(pred) = next else {
            continue;
        };
        match marks[pred as usize] {
            Mark::Unvisited => {
                marks[pred as usize] = Mark::OnPath;
                stack.push((pred, 0));
            }
            Mark::OnPath => {
                warn!("cycle through a{pred} while sequencing from a{root}");
                return Err(Error::CyclicGraphDetected(pred));
            }
            Mark::Done => (),
        }
    }

    Ok(order)
}

impl<'a> ScalarNode<'a> {
    /// Every node this one depends on, itself last, each after all of its predecessors.
    pub fn sequence(&self) -> Result<Vec<ScalarNode<'a>>> {
        let order = sequence(&self.graph.nodes.borrow(), self.idx)?;
        Ok(order.into_iter().map(|idx| self.graph.node(idx)).collect())
    }
}
