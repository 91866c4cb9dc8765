//! Operation builder: the arithmetic entry points that grow a [`Graph`].
//!
//! Only addition, multiplication, power and ReLU have their own backward rule.
//! Subtraction, negation and division are compositions of them.

use log::warn;

use crate::{
    error::{Error, Result},
    graph::{Graph, Op, ScalarNode},
};

/// Anything an operator accepts: an existing node, or a bare number that is
/// wrapped into a new leaf.
#[derive(Copy, Clone, Debug)]
pub enum Operand<'a> {
    Node(ScalarNode<'a>),
    Number(f64),
}

impl<'a> From<ScalarNode<'a>> for Operand<'a> {
    fn from(node: ScalarNode<'a>) -> Self {
        Self::Node(node)
    }
}

impl<'a> From<&ScalarNode<'a>> for Operand<'a> {
    fn from(node: &ScalarNode<'a>) -> Self {
        Self::Node(*node)
    }
}

impl<'a> From<f64> for Operand<'a> {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl<'a> From<i32> for Operand<'a> {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl Graph {
    pub fn add<'a>(
        &'a self,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> Result<ScalarNode<'a>> {
        let (lhs, rhs) = self.resolve_pair(lhs.into(), rhs.into())?;
        Ok(self.add_nodes(lhs, rhs))
    }

    pub fn multiply<'a>(
        &'a self,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> Result<ScalarNode<'a>> {
        let (lhs, rhs) = self.resolve_pair(lhs.into(), rhs.into())?;
        Ok(self.mul_nodes(lhs, rhs))
    }

    /// Raises `base` to a constant `exponent`.
    ///
    /// The exponent is not differentiated, so it must be a number. Passing a node
    /// is an [`Error::InvalidOperandKind`].
    pub fn power<'a>(
        &'a self,
        base: impl Into<Operand<'a>>,
        exponent: impl Into<Operand<'a>>,
    ) -> Result<ScalarNode<'a>> {
        let exponent = match exponent.into() {
            Operand::Number(exponent) => exponent,
            Operand::Node(node) => {
                warn!("rejected node a{} as an exponent", node.idx);
                return Err(Error::InvalidOperandKind(format!(
                    "exponent must be a number, got node a{} with value {}",
                    node.idx,
                    node.value()
                )));
            }
        };
        let base = self.resolve(base.into())?;
        Ok(self.pow_node(base, exponent))
    }

    pub fn divide<'a>(
        &'a self,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> Result<ScalarNode<'a>> {
        let (lhs, rhs) = self.resolve_pair(lhs.into(), rhs.into())?;
        Ok(self.div_nodes(lhs, rhs))
    }

    pub fn subtract<'a>(
        &'a self,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> Result<ScalarNode<'a>> {
        let (lhs, rhs) = self.resolve_pair(lhs.into(), rhs.into())?;
        Ok(self.sub_nodes(lhs, rhs))
    }

    pub fn negate<'a>(&'a self, term: impl Into<Operand<'a>>) -> Result<ScalarNode<'a>> {
        let term = self.resolve(term.into())?;
        Ok(self.neg_node(term))
    }

    pub fn relu<'a>(&'a self, term: impl Into<Operand<'a>>) -> Result<ScalarNode<'a>> {
        let term = self.resolve(term.into())?;
        Ok(self.relu_node(term))
    }

    fn check(&self, operand: &Operand) -> Result<()> {
        match operand {
            Operand::Node(node) if !self.owns(node) => {
                warn!("rejected operand a{} from another graph", node.idx);
                Err(Error::InvalidOperandKind(format!(
                    "node a{} belongs to a different graph",
                    node.idx
                )))
            }
            _ => Ok(()),
        }
    }

    fn resolve<'a>(&'a self, operand: Operand<'a>) -> Result<ScalarNode<'a>> {
        self.check(&operand)?;
        Ok(match operand {
            Operand::Node(node) => node,
            Operand::Number(value) => self.leaf(value),
        })
    }

    /// Both operands are checked before either number is wrapped, so a rejected
    /// call leaves no stray leaf behind.
    fn resolve_pair<'a>(
        &'a self,
        lhs: Operand<'a>,
        rhs: Operand<'a>,
    ) -> Result<(ScalarNode<'a>, ScalarNode<'a>)> {
        self.check(&lhs)?;
        self.check(&rhs)?;
        Ok((self.resolve(lhs)?, self.resolve(rhs)?))
    }

    fn add_nodes(&self, lhs: ScalarNode, rhs: ScalarNode) -> ScalarNode<'_> {
        self.push(None, Op::Add(lhs.idx, rhs.idx), lhs.value() + rhs.value())
    }

    fn mul_nodes(&self, lhs: ScalarNode, rhs: ScalarNode) -> ScalarNode<'_> {
        self.push(None, Op::Mul(lhs.idx, rhs.idx), lhs.value() * rhs.value())
    }

    fn pow_node(&self, base: ScalarNode, exponent: f64) -> ScalarNode<'_> {
        self.push(
            None,
            Op::Pow {
                base: base.idx,
                exponent,
            },
            base.value().powf(exponent),
        )
    }

    fn relu_node(&self, term: ScalarNode) -> ScalarNode<'_> {
        let data = term.value();
        // NaN stays NaN
        let data = if data < 0. { 0. } else { data };
        self.push(None, Op::Relu(term.idx), data)
    }

    fn neg_node(&self, term: ScalarNode) -> ScalarNode<'_> {
        let minus_one = self.leaf(-1.);
        self.mul_nodes(term, minus_one)
    }

    fn sub_nodes(&self, lhs: ScalarNode, rhs: ScalarNode) -> ScalarNode<'_> {
        let neg = self.neg_node(rhs);
        self.add_nodes(lhs, neg)
    }

    fn div_nodes(&self, lhs: ScalarNode, rhs: ScalarNode) -> ScalarNode<'_> {
        let inv = self.pow_node(rhs, -1.);
        self.mul_nodes(lhs, inv)
    }
}

impl<'a> ScalarNode<'a> {
    pub fn relu(self) -> Self {
        self.graph.relu_node(self)
    }

    /// Infallible form of [`Graph::power`] for a constant exponent.
    pub fn powf(self, exponent: f64) -> Self {
        self.graph.pow_node(self, exponent)
    }
}

fn assert_same_graph(lhs: &ScalarNode, rhs: &ScalarNode) {
    assert!(
        lhs.graph.owns(rhs),
        "operands a{} and a{} belong to different graphs",
        lhs.idx,
        rhs.idx
    );
}

/// Implements an infix operator for node/node, node/f64 and f64/node.
/// `reflected` builds the f64-on-the-left form from the node and the wrapped number.
macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $build:ident, |$node:ident, $num:ident| $reflected:expr) => {
        impl<'a> std::ops::$trait for ScalarNode<'a> {
            type Output = Self;
            fn $method(self, rhs: Self) -> Self::Output {
                assert_same_graph(&self, &rhs);
                self.graph.$build(self, rhs)
            }
        }

        impl<'a> std::ops::$trait<f64> for ScalarNode<'a> {
            type Output = Self;
            fn $method(self, rhs: f64) -> Self::Output {
                let rhs = self.graph.leaf(rhs);
                self.graph.$build(self, rhs)
            }
        }

        impl<'a> std::ops::$trait<ScalarNode<'a>> for f64 {
            type Output = ScalarNode<'a>;
            fn $method(self, rhs: ScalarNode<'a>) -> Self::Output {
                let $num = rhs.graph.leaf(self);
                let $node = rhs;
                $reflected
            }
        }
    };
}

impl_binary_op!(Add, add, add_nodes, |node, num| node.graph.add_nodes(node, num));
impl_binary_op!(Mul, mul, mul_nodes, |node, num| node.graph.mul_nodes(node, num));
impl_binary_op!(Sub, sub, sub_nodes, |node, num| node.graph.sub_nodes(num, node));
impl_binary_op!(Div, div, div_nodes, |node, num| node.graph.div_nodes(num, node));

impl<'a> std::ops::Neg for ScalarNode<'a> {
    type Output = Self;
    fn neg(self) -> Self::Output {
        self.graph.neg_node(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    #[test]
    fn add_forward_and_tag() {
        let graph = Graph::new();
        let a = graph.leaf(2.);
        let b = graph.leaf(-5.);
        let c = graph.add(a, b).unwrap();
        assert_eq!(c.value(), -3.);
        assert_eq!(c.operation_tag().as_deref(), Some("+"));
        assert_eq!(c.predecessors(), vec![a, b]);
    }

    #[test]
    fn multiply_forward() {
        let graph = Graph::new();
        let c = graph.multiply(3., 4.).unwrap();
        assert_eq!(c.value(), 12.);
        assert_eq!(c.operation_tag().as_deref(), Some("*"));
        assert!(c.predecessors().iter().all(|p| p.is_leaf()));
    }

    #[test]
    fn power_has_one_predecessor() {
        let graph = Graph::new();
        let a = graph.leaf(3.);
        let c = graph.power(a, 2.).unwrap();
        assert_eq!(c.value(), 9.);
        assert_eq!(c.operation_tag().as_deref(), Some("**2"));
        assert_eq!(c.predecessors(), vec![a]);
    }

    #[test]
    fn power_rejects_node_exponent() {
        let graph = Graph::new();
        let a = graph.leaf(3.);
        let k = graph.leaf(2.);
        let before = graph.len();
        let err = graph.power(a, k).unwrap_err();
        assert!(matches!(err, Error::InvalidOperandKind(_)));
        assert_eq!(graph.len(), before);
    }

    #[test]
    fn rejects_node_from_other_graph() {
        let graph = Graph::new();
        let other = Graph::new();
        let a = graph.leaf(1.);
        let b = other.leaf(2.);
        let before = graph.len();
        assert!(matches!(
            graph.add(a, b),
            Err(Error::InvalidOperandKind(_))
        ));
        assert!(matches!(
            graph.multiply(1., b),
            Err(Error::InvalidOperandKind(_))
        ));
        assert!(matches!(graph.relu(b), Err(Error::InvalidOperandKind(_))));
        assert_eq!(graph.len(), before);
    }

    #[test]
    #[should_panic(expected = "different graphs")]
    fn infix_panics_across_graphs() {
        let graph = Graph::new();
        let other = Graph::new();
        let _ = graph.leaf(1.) + other.leaf(2.);
    }

    #[test]
    fn subtract_is_add_of_negation() {
        let graph = Graph::new();
        let a = graph.leaf(5.);
        let b = graph.leaf(3.);
        let c = graph.subtract(a, b).unwrap();
        assert_eq!(c.value(), 2.);
        assert_eq!(c.operation_tag().as_deref(), Some("+"));
        let preds = c.predecessors();
        assert_eq!(preds[0], a);
        assert_eq!(preds[1].operation_tag().as_deref(), Some("*"));
        assert_eq!(preds[1].value(), -3.);
    }

    #[test]
    fn divide_is_multiply_by_inverse() {
        let graph = Graph::new();
        let a = graph.leaf(6.);
        let b = graph.leaf(4.);
        let c = graph.divide(a, b).unwrap();
        assert_eq!(c.value(), 1.5);
        assert_eq!(c.operation_tag().as_deref(), Some("*"));
        let preds = c.predecessors();
        assert_eq!(preds[1].operation_tag().as_deref(), Some("**-1"));
        assert_eq!(preds[1].predecessors(), vec![b]);
    }

    #[test]
    fn relu_clamps_negative() {
        let graph = Graph::new();
        assert_eq!(graph.relu(-2.).unwrap().value(), 0.);
        assert_eq!(graph.relu(2.5).unwrap().value(), 2.5);
        assert!(graph.relu(f64::NAN).unwrap().value().is_nan());
        assert_eq!(graph.leaf(-1.).relu().operation_tag().as_deref(), Some("ReLU"));
    }

    #[test]
    fn reflected_forms_match_node_first() {
        let graph = Graph::new();
        let x = graph.leaf(3.);
        for (left, right) in [(2. + x, x + 2.), (2. * x, x * 2.)] {
            assert_eq!(left.value(), right.value());
            assert_eq!(left.operation_tag(), right.operation_tag());
            let (lp, rp) = (left.predecessors(), right.predecessors());
            assert_eq!(lp[0], x);
            assert_eq!(rp[0], x);
            assert!(lp[1].is_leaf() && rp[1].is_leaf());
            assert_eq!(lp[1].value(), rp[1].value());
        }
        assert_eq!((10. - x).value(), 7.);
        assert!(approx_eq((6. / x).value(), 2.));
    }

    #[test]
    fn singular_power_follows_ieee() {
        let graph = Graph::new();
        let zero = graph.leaf(0.);
        let inv = zero.powf(-1.);
        assert_eq!(inv.value(), f64::INFINITY);
        inv.backward_propagate().unwrap();
        assert!(zero.gradient().is_infinite());
    }

    #[test]
    fn integer_operands_are_wrapped() {
        let graph = Graph::new();
        let c = graph.add(2, 3).unwrap();
        assert_eq!(c.value(), 5.);
        assert_eq!(graph.power(c, 2).unwrap().value(), 25.);
    }
}
