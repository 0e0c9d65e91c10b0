//! Dense feed-forward network policy with tanh activations.

use racebots_core::{
    ACTUATION_SIZE, ActivationLayer, Actuation, Connection, Policy, PolicyActivations,
    PolicyError, PolicyInputs,
};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PolicyKind, normalized_inputs};

/// Rejected network layouts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("network has no layers")]
    Empty,
    #[error("layer {layer} must have at least one input and one output")]
    EmptyLayer { layer: usize },
    #[error("layer {layer} has {found} weights, expected {expected}")]
    WeightCount {
        layer: usize,
        expected: usize,
        found: usize,
    },
    #[error("layer {layer} has {found} biases, expected {expected}")]
    BiasCount {
        layer: usize,
        expected: usize,
        found: usize,
    },
    #[error("layer {layer} takes {found} inputs but the previous layer produces {expected}")]
    LayerMismatch {
        layer: usize,
        expected: usize,
        found: usize,
    },
    #[error("network produces {found} outputs, expected {expected}")]
    OutputSize { expected: usize, found: usize },
    #[error("layer {layer} contains a non-finite parameter")]
    NonFinite { layer: usize },
}

/// Fully connected layer followed by `tanh`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseLayer {
    inputs: usize,
    outputs: usize,
    /// Row-major, one row of `inputs` weights per output.
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl DenseLayer {
    /// Layer with explicit parameters. Shapes are checked when the layer is
    /// assembled into a [`FeedForwardPolicy`].
    #[must_use]
    pub fn new(inputs: usize, outputs: usize, weights: Vec<f32>, biases: Vec<f32>) -> Self {
        Self {
            inputs,
            outputs,
            weights,
            biases,
        }
    }

    /// Layer with weights and biases drawn uniformly from `[-1, 1)`.
    #[must_use]
    pub fn random(rng: &mut dyn RngCore, inputs: usize, outputs: usize) -> Self {
        let weights = (0..inputs * outputs)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect();
        let biases = (0..outputs).map(|_| rng.random_range(-1.0..1.0)).collect();
        Self::new(inputs, outputs, weights, biases)
    }

    #[must_use]
    pub const fn inputs(&self) -> usize {
        self.inputs
    }

    #[must_use]
    pub const fn outputs(&self) -> usize {
        self.outputs
    }

    /// Weight from input `from` into output `to`.
    #[must_use]
    pub fn weight(&self, to: usize, from: usize) -> Option<f32> {
        if from >= self.inputs {
            return None;
        }
        self.weights.get(to * self.inputs + from).copied()
    }

    #[must_use]
    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    fn validate(&self, layer: usize) -> Result<(), TopologyError> {
        if self.inputs == 0 || self.outputs == 0 {
            return Err(TopologyError::EmptyLayer { layer });
        }
        if self.weights.len() != self.inputs * self.outputs {
            return Err(TopologyError::WeightCount {
                layer,
                expected: self.inputs * self.outputs,
                found: self.weights.len(),
            });
        }
        if self.biases.len() != self.outputs {
            return Err(TopologyError::BiasCount {
                layer,
                expected: self.outputs,
                found: self.biases.len(),
            });
        }
        if !self
            .weights
            .iter()
            .chain(&self.biases)
            .all(|value| value.is_finite())
        {
            return Err(TopologyError::NonFinite { layer });
        }
        Ok(())
    }

    fn forward(&self, input: &[f32], output: &mut Vec<f32>) {
        output.clear();
        for (row, bias) in self.weights.chunks_exact(self.inputs).zip(&self.biases) {
            let sum: f32 = row.iter().zip(input).map(|(w, x)| w * x).sum();
            output.push((sum + bias).tanh());
        }
    }
}

/// Feed-forward network mapping normalized ray distances and speed to
/// throttle and steer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<DenseLayer>", into = "Vec<DenseLayer>")]
pub struct FeedForwardPolicy {
    layers: Vec<DenseLayer>,
    /// Values of every layer from the last decision, input layer first.
    activations: Vec<Vec<f32>>,
}

impl FeedForwardPolicy {
    /// Trait identifier for this policy family.
    pub const KIND: PolicyKind = PolicyKind::new("feedforward.tanh");

    /// Randomly initialized network with `hidden_layers` layers of
    /// `hidden_width` neurons between the inputs and the two outputs.
    #[must_use]
    pub fn random(
        rng: &mut dyn RngCore,
        inputs: usize,
        hidden_layers: usize,
        hidden_width: usize,
    ) -> Self {
        let mut widths = Vec::with_capacity(hidden_layers + 2);
        widths.push(inputs.max(1));
        widths.extend(std::iter::repeat_n(hidden_width.max(1), hidden_layers));
        widths.push(ACTUATION_SIZE);
        let layers = widths
            .windows(2)
            .map(|pair| DenseLayer::random(rng, pair[0], pair[1]))
            .collect();
        Self::assemble(layers)
    }

    /// Network from explicit layers, checking that consecutive layers line up
    /// and the last one produces exactly two outputs.
    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self, TopologyError> {
        let Some(last) = layers.last() else {
            return Err(TopologyError::Empty);
        };
        if last.outputs != ACTUATION_SIZE {
            return Err(TopologyError::OutputSize {
                expected: ACTUATION_SIZE,
                found: last.outputs,
            });
        }
        for (index, layer) in layers.iter().enumerate() {
            layer.validate(index)?;
        }
        for (index, pair) in layers.windows(2).enumerate() {
            if pair[0].outputs != pair[1].inputs {
                return Err(TopologyError::LayerMismatch {
                    layer: index + 1,
                    expected: pair[0].outputs,
                    found: pair[1].inputs,
                });
            }
        }
        Ok(Self::assemble(layers))
    }

    fn assemble(layers: Vec<DenseLayer>) -> Self {
        let activations = vec![Vec::new(); layers.len() + 1];
        Self {
            layers,
            activations,
        }
    }

    /// Inputs the first layer expects.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::inputs)
    }

    #[must_use]
    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    fn layer_name(&self, index: usize) -> String {
        if index == 0 {
            "input".to_string()
        } else if index == self.layers.len() {
            "output".to_string()
        } else {
            format!("hidden.{index}")
        }
    }
}

impl TryFrom<Vec<DenseLayer>> for FeedForwardPolicy {
    type Error = TopologyError;

    fn try_from(layers: Vec<DenseLayer>) -> Result<Self, Self::Error> {
        Self::from_layers(layers)
    }
}

impl From<FeedForwardPolicy> for Vec<DenseLayer> {
    fn from(policy: FeedForwardPolicy) -> Self {
        policy.layers
    }
}

impl Policy for FeedForwardPolicy {
    fn kind(&self) -> &'static str {
        Self::KIND.as_str()
    }

    fn decide(&mut self, inputs: &PolicyInputs<'_>) -> Result<Actuation, PolicyError> {
        let expected = self.input_size();
        let found = crate::input_size(inputs.distances.len());
        if found != expected {
            return Err(PolicyError::InputShape { expected, found });
        }
        let Self {
            layers,
            activations,
        } = self;
        if let Some(input) = activations.first_mut() {
            normalized_inputs(inputs, input);
        }
        for (index, layer) in layers.iter().enumerate() {
            let (done, pending) = activations.split_at_mut(index + 1);
            if let (Some(input), Some(output)) = (done.last(), pending.first_mut()) {
                layer.forward(input, output);
            }
        }
        let outputs = activations.last().map_or(&[][..], Vec::as_slice);
        Actuation::from_outputs(outputs)
    }

    fn snapshot_activations(&self) -> Option<PolicyActivations> {
        let layers = self
            .activations
            .iter()
            .enumerate()
            .map(|(index, values)| ActivationLayer {
                name: self.layer_name(index),
                values: values.clone(),
            })
            .collect();
        let mut connections = Vec::new();
        for (index, layer) in self.layers.iter().enumerate() {
            for (to, row) in layer.weights.chunks_exact(layer.inputs).enumerate() {
                connections.extend(row.iter().enumerate().map(|(from, weight)| Connection {
                    layer: index,
                    from,
                    to,
                    weight: *weight,
                }));
            }
        }
        Some(PolicyActivations {
            layers,
            connections,
        })
    }
}
