//! A small multi-layer perceptron built from weighted sums of scalar nodes.

use std::fmt::Display;

use rand::Rng;

use crate::{
    error::{Error, Result},
    graph::{Graph, ScalarNode},
    ops::Operand,
};

/// Anything that owns trainable nodes.
pub trait Module<'a> {
    fn parameters(&self) -> Vec<ScalarNode<'a>>;

    fn zero_gradients(&self) {
        for param in self.parameters() {
            param.zero_gradient();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
}

pub struct Neuron<'a> {
    graph: &'a Graph,
    weights: Vec<ScalarNode<'a>>,
    bias: ScalarNode<'a>,
    activation: Activation,
}

impl<'a> Neuron<'a> {
    /// Weights are drawn uniformly from [-1, 1]; the bias starts at 0.
    pub fn new<R: Rng + ?Sized>(
        graph: &'a Graph,
        inputs: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let weights = (0..inputs)
            .map(|_| graph.leaf(rng.gen_range(-1.0..=1.0)))
            .collect();
        Self {
            graph,
            weights,
            bias: graph.leaf(0.),
            activation,
        }
    }

    pub fn inputs(&self) -> usize {
        self.weights.len()
    }

    /// `bias + w_0 * x_0 + w_1 * x_1 + ...`, summed left to right from the bias.
    pub fn forward<T>(&self, x: &[T]) -> Result<ScalarNode<'a>>
    where
        T: Into<Operand<'a>> + Copy,
    {
        if x.len() != self.weights.len() {
            return Err(Error::InvalidOperandKind(format!(
                "neuron takes {} inputs, got {}",
                self.weights.len(),
                x.len()
            )));
        }
        let mut sum = self.bias;
        for (&w, &xi) in self.weights.iter().zip(x) {
            let wx = self.graph.multiply(w, xi)?;
            sum = self.graph.add(sum, wx)?;
        }
        Ok(match self.activation {
            Activation::Linear => sum,
            Activation::Relu => sum.relu(),
        })
    }
}

impl<'a> Module<'a> for Neuron<'a> {
    fn parameters(&self) -> Vec<ScalarNode<'a>> {
        let mut params = self.weights.clone();
        params.push(self.bias);
        params
    }
}

impl<'a> Display for Neuron<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.activation {
            Activation::Linear => "Linear",
            Activation::Relu => "ReLU",
        };
        write!(f, "{kind}Neuron({})", self.weights.len())
    }
}

pub struct Layer<'a> {
    neurons: Vec<Neuron<'a>>,
}

impl<'a> Layer<'a> {
    pub fn new<R: Rng + ?Sized>(
        graph: &'a Graph,
        inputs: usize,
        outputs: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let neurons = (0..outputs)
            .map(|_| Neuron::new(graph, inputs, activation, rng))
            .collect();
        Self { neurons }
    }

    /// One output per neuron.
    pub fn forward<T>(&self, x: &[T]) -> Result<Vec<ScalarNode<'a>>>
    where
        T: Into<Operand<'a>> + Copy,
    {
        self.neurons.iter().map(|n| n.forward(x)).collect()
    }

    pub fn neurons(&self) -> &[Neuron<'a>] {
        &self.neurons
    }
}

impl<'a> Module<'a> for Layer<'a> {
    fn parameters(&self) -> Vec<ScalarNode<'a>> {
        self.neurons.iter().flat_map(|n| n.parameters()).collect()
    }
}

impl<'a> Display for Layer<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Layer of [")?;
        for (i, neuron) in self.neurons.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{neuron}")?;
        }
        write!(f, "]")
    }
}

/// Layers sized `[inputs] + outputs`. Hidden layers use ReLU, the last one is linear.
pub struct Mlp<'a> {
    layers: Vec<Layer<'a>>,
}

impl<'a> Mlp<'a> {
    pub fn new<R: Rng + ?Sized>(
        graph: &'a Graph,
        inputs: usize,
        outputs: &[usize],
        rng: &mut R,
    ) -> Self {
        let sizes: Vec<usize> = std::iter::once(inputs)
            .chain(outputs.iter().copied())
            .collect();
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, io)| {
                let activation = if i + 1 == outputs.len() {
                    Activation::Linear
                } else {
                    Activation::Relu
                };
                Layer::new(graph, io[0], io[1], activation, rng)
            })
            .collect();
        Self { layers }
    }

    pub fn forward<T>(&self, x: &[T]) -> Result<Vec<ScalarNode<'a>>>
    where
        T: Into<Operand<'a>> + Copy,
    {
        let Some((first, rest)) = self.layers.split_first() else {
            return x.iter().map(|&xi| self.input_node(xi)).collect();
        };
        let mut out = first.forward(x)?;
        for layer in rest {
            out = layer.forward(&out)?;
        }
        Ok(out)
    }

    pub fn layers(&self) -> &[Layer<'a>] {
        &self.layers
    }

    fn input_node<T: Into<Operand<'a>>>(&self, x: T) -> Result<ScalarNode<'a>> {
        match x.into() {
            Operand::Node(node) => Ok(node),
            Operand::Number(value) => Err(Error::InvalidOperandKind(format!(
                "an MLP without layers passes nodes through, got the number {value}"
            ))),
        }
    }
}

impl<'a> Module<'a> for Mlp<'a> {
    fn parameters(&self) -> Vec<ScalarNode<'a>> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }
}

impl<'a> Display for Mlp<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MLP of [")?;
        for (i, layer) in self.layers.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{layer}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn neuron_parameters_are_weights_then_bias() {
        let graph = Graph::new();
        let mut rng = StdRng::seed_from_u64(1337);
        let neuron = Neuron::new(&graph, 3, Activation::Linear, &mut rng);
        let params = neuron.parameters();
        assert_eq!(params.len(), 4);
        assert!(params[..3]
            .iter()
            .all(|w| (-1.0..=1.0).contains(&w.value())));
        assert_eq!(params[3].value(), 0.);
    }

    #[test]
    fn neuron_forward_is_weighted_sum() {
        let graph = Graph::new();
        let mut rng = StdRng::seed_from_u64(7);
        let neuron = Neuron::new(&graph, 2, Activation::Linear, &mut rng);
        let params = neuron.parameters();
        let y = neuron.forward(&[1., -2.]).unwrap();
        let expected = params[0].value() - 2. * params[1].value();
        assert!((y.value() - expected).abs() < 1e-12);
        y.backward_propagate().unwrap();
        assert_eq!(params[0].gradient(), 1.);
        assert_eq!(params[1].gradient(), -2.);
        assert_eq!(params[2].gradient(), 1.);
    }

    #[test]
    fn neuron_rejects_wrong_arity() {
        let graph = Graph::new();
        let mut rng = StdRng::seed_from_u64(0);
        let neuron = Neuron::new(&graph, 2, Activation::Relu, &mut rng);
        assert!(matches!(
            neuron.forward(&[1.]),
            Err(Error::InvalidOperandKind(_))
        ));
    }

    #[test]
    fn layer_outputs_one_per_neuron() {
        let graph = Graph::new();
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Layer::new(&graph, 3, 4, Activation::Relu, &mut rng);
        let out = layer.forward(&[0.5, -1., 2.]).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|o| o.value() >= 0.));
        assert_eq!(layer.parameters().len(), 4 * (3 + 1));
    }

    #[test]
    fn mlp_shapes_and_display() {
        let graph = Graph::new();
        let mut rng = StdRng::seed_from_u64(0);
        let mlp = Mlp::new(&graph, 3, &[4, 4, 1], &mut rng);
        assert_eq!(mlp.parameters().len(), 4 * 4 + 4 * 5 + 5);
        assert_eq!(
            mlp.layers()[2].to_string(),
            "Layer of [LinearNeuron(4)]"
        );
        assert!(mlp.to_string().starts_with("MLP of [Layer of [ReLUNeuron(3)"));
        let out = mlp.forward(&[2., 3., -1.]).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn zero_gradients_clears_parameters() {
        let graph = Graph::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mlp = Mlp::new(&graph, 2, &[3, 1], &mut rng);
        let x = graph.leaves(&[1., 2.]);
        let out = mlp.forward(&x).unwrap();
        out[0].backward_propagate().unwrap();
        let bias = *mlp.parameters().last().unwrap();
        assert_eq!(bias.gradient(), 1.);
        mlp.zero_gradients();
        assert!(mlp.parameters().iter().all(|p| p.gradient() == 0.));
    }
}
