//! Concrete driving policies for racebots cars.
//!
//! Policies implement [`racebots_core::Policy`] and are attached to cars
//! through a [`PolicyBinding`]. The [`diagram`] module renders the
//! activations a policy exposes as a Graphviz network diagram.

use std::fmt;

use racebots_core::{Policy, PolicyBinding, PolicyInputs};

pub mod diagram;
pub mod feedforward;
pub mod rule;

pub use diagram::{network_diagram, write_network_diagram};
pub use feedforward::{DenseLayer, FeedForwardPolicy, TopologyError};
pub use rule::RulePolicy;

/// Static identifier for a policy family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyKind(&'static str);

impl PolicyKind {
    #[must_use]
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Box a policy and bind it to the genome it was built from.
#[must_use]
pub fn into_binding<P>(policy: P, genome: u64) -> PolicyBinding
where
    P: Policy + 'static,
{
    PolicyBinding::with_genome(Box::new(policy), genome)
}

/// Number of network inputs for a car with `rays` sensors: one normalized
/// distance per ray plus the normalized speed.
#[must_use]
pub const fn input_size(rays: usize) -> usize {
    rays + 1
}

/// Write normalized policy inputs into `out`.
///
/// Distances are scaled by the ray length into `[0, 1]`; speed is scaled by
/// the maximum speed and may be slightly negative while reversing.
pub fn normalized_inputs(inputs: &PolicyInputs<'_>, out: &mut Vec<f32>) {
    out.clear();
    let max_distance = inputs.max_distance.max(f32::EPSILON);
    out.extend(
        inputs
            .distances
            .iter()
            .map(|distance| (distance / max_distance).clamp(0.0, 1.0)),
    );
    let max_speed = inputs.max_speed.abs().max(f32::EPSILON);
    out.push((inputs.speed / max_speed).clamp(-1.0, 1.0));
}
