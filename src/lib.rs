//! Reverse-mode automatic differentiation over scalar values.
//!
//! Arithmetic on [`ScalarNode`]s records an expression graph in a [`Graph`]
//! arena. [`ScalarNode::backward_propagate`] then fills in the gradient of that
//! node with respect to everything it was computed from.
//!
//! ```
//! use microdiff::Graph;
//!
//! let graph = Graph::new();
//! let x = graph.term("x", 2.);
//! let w = graph.term("w", -3.);
//! let y = (w * x + 6.7).relu();
//! y.backward_propagate().unwrap();
//! assert_eq!(w.gradient(), 2.);
//! assert_eq!(x.gradient(), -3.);
//! ```

mod backward;
mod dot;
pub mod error;
mod graph;
pub mod nn;
mod ops;
mod topo;

pub use dot::{DotBuilder, RankDir};
pub use error::{Error, Result};
pub use graph::{Graph, ScalarNode};
pub use ops::Operand;

#[cfg(feature = "macro")]
pub use microdiff_macro::microdiff;
