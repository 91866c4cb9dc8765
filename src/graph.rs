//! Implementation of shared memory arena for the scalar nodes, aka a tape.
//! See https://rufflewind.com/2016-12-30/reverse-mode-automatic-differentiation
//!
//! Nodes are never removed from the arena and refer to their operands by index,
//! so an operand always has a smaller index than any node built from it.
//!
//! A [`Graph`] uses interior mutability and is not `Sync`; it cannot be shared
//! between threads.

use std::cell::RefCell;

#[derive(Default, Debug)]
pub struct Graph {
    pub(crate) nodes: RefCell<Vec<Node>>,
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) name: Option<String>,
    pub(crate) op: Op,
    pub(crate) data: f64,
    pub(crate) grad: f64,
}

/// The operation that produced a node, with its operands as arena indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Op {
    Leaf,
    Add(u32, u32),
    Mul(u32, u32),
    Pow { base: u32, exponent: f64 },
    Relu(u32),
}

impl Op {
    pub(crate) fn operands(&self) -> [Option<u32>; 2] {
        use Op::*;
        match *self {
            Leaf => [None, None],
            Add(lhs, rhs) | Mul(lhs, rhs) => [Some(lhs), Some(rhs)],
            Pow { base, .. } => [Some(base), None],
            Relu(term) => [Some(term), None],
        }
    }

    pub(crate) fn tag(&self) -> Option<String> {
        use Op::*;
        match self {
            Leaf => None,
            Add(..) => Some("+".to_string()),
            Mul(..) => Some("*".to_string()),
            Pow { exponent, .. } => Some(format!("**{exponent}")),
            Relu(_) => Some("ReLU".to_string()),
        }
    }
}

/// A handle to a node in a [`Graph`].
///
/// Handles are cheap to copy; copying one does not duplicate the node.
#[derive(Copy, Clone)]
pub struct ScalarNode<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) idx: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unnamed leaf holding `value`.
    pub fn leaf(&self, value: f64) -> ScalarNode<'_> {
        self.push(None, Op::Leaf, value)
    }

    /// Creates a leaf with a name, which is shown when the graph is rendered.
    pub fn term(&self, name: impl Into<String>, value: f64) -> ScalarNode<'_> {
        self.push(Some(name.into()), Op::Leaf, value)
    }

    /// Creates one unnamed leaf per value.
    pub fn leaves(&self, values: &[f64]) -> Vec<ScalarNode<'_>> {
        values.iter().map(|&value| self.leaf(value)).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Resets the gradient of every node in the arena to 0.
    pub fn zero_gradients(&self) {
        for node in self.nodes.borrow_mut().iter_mut() {
            node.grad = 0.;
        }
    }

    pub(crate) fn push(&self, name: Option<String>, op: Op, data: f64) -> ScalarNode<'_> {
        let mut nodes = self.nodes.borrow_mut();
        let idx = nodes.len();
        nodes.push(Node {
            name,
            op,
            data,
            grad: 0.,
        });
        ScalarNode {
            graph: self,
            idx: idx as u32,
        }
    }

    pub(crate) fn node(&self, idx: u32) -> ScalarNode<'_> {
        ScalarNode { graph: self, idx }
    }

    pub(crate) fn owns(&self, node: &ScalarNode) -> bool {
        std::ptr::eq(self, node.graph)
    }
}

impl<'a> ScalarNode<'a> {
    /// The forward value, fixed when the node was created.
    pub fn value(&self) -> f64 {
        self.graph.nodes.borrow()[self.idx as usize].data
    }

    /// The accumulated derivative of the last backward root with respect to this node.
    pub fn gradient(&self) -> f64 {
        self.graph.nodes.borrow()[self.idx as usize].grad
    }

    pub fn zero_gradient(&self) {
        self.graph.nodes.borrow_mut()[self.idx as usize].grad = 0.;
    }

    /// `"+"`, `"*"`, `"**{exponent}"` or `"ReLU"`, or `None` for a leaf.
    pub fn operation_tag(&self) -> Option<String> {
        self.graph.nodes.borrow()[self.idx as usize].op.tag()
    }

    pub fn name(&self) -> Option<String> {
        self.graph.nodes.borrow()[self.idx as usize].name.clone()
    }

    /// The distinct nodes this node was computed from, in operand order.
    ///
    /// `a + a` has a single predecessor.
    pub fn predecessors(&self) -> Vec<ScalarNode<'a>> {
        let op = self.graph.nodes.borrow()[self.idx as usize].op;
        let mut res: Vec<ScalarNode<'a>> = Vec::with_capacity(2);
        for idx in op.operands().into_iter().flatten() {
            if res.iter().all(|p| p.idx != idx) {
                res.push(self.graph.node(idx));
            }
        }
        res
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.graph.nodes.borrow()[self.idx as usize].op, Op::Leaf)
    }

    /// Position of this node in its graph's arena.
    pub fn index(&self) -> u32 {
        self.idx
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }
}

impl<'a> PartialEq for ScalarNode<'a> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.graph, other.graph) && self.idx == other.idx
    }
}

impl<'a> Eq for ScalarNode<'a> {}

impl<'a> std::hash::Hash for ScalarNode<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.graph as *const Graph).hash(state);
        self.idx.hash(state);
    }
}

impl<'a> std::fmt::Debug for ScalarNode<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarNode")
            .field("index", &self.idx)
            .field("value", &self.value())
            .field("gradient", &self.gradient())
            .finish()
    }
}
