use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of values a policy must produce: throttle and steer.
pub const ACTUATION_SIZE: usize = 2;

/// Perception and motion state handed to a policy each frame.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInputs<'a> {
    /// Ray distances in sensor order.
    pub distances: &'a [f32],
    /// Angle offsets matching `distances`.
    pub offsets: &'a [f32],
    /// Ray length, for normalization.
    pub max_distance: f32,
    pub speed: f32,
    pub max_speed: f32,
    pub heading: f32,
}

/// Normalized control request produced by a policy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Actuation {
    /// Speed change request in `[-1, 1]`.
    pub throttle: f32,
    /// Heading change request in `[-1, 1]`.
    pub steer: f32,
}

impl Actuation {
    /// Neither accelerate nor turn.
    pub const IDLE: Self = Self {
        throttle: 0.0,
        steer: 0.0,
    };

    #[must_use]
    pub const fn new(throttle: f32, steer: f32) -> Self {
        Self { throttle, steer }
    }

    /// Interpret a raw output vector, rejecting the wrong shape or non-finite values.
    pub fn from_outputs(outputs: &[f32]) -> Result<Self, PolicyError> {
        let [throttle, steer] = outputs else {
            return Err(PolicyError::OutputShape {
                expected: ACTUATION_SIZE,
                found: outputs.len(),
            });
        };
        Self::new(*throttle, *steer).checked()
    }

    /// Reject NaN or infinite requests.
    pub fn checked(self) -> Result<Self, PolicyError> {
        if self.throttle.is_finite() && self.steer.is_finite() {
            Ok(self)
        } else {
            Err(PolicyError::NonFinite)
        }
    }

    /// Clamp both channels into `[-1, 1]`.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            throttle: self.throttle.clamp(-1.0, 1.0),
            steer: self.steer.clamp(-1.0, 1.0),
        }
    }
}

/// Failures reported by a policy query. Each one eliminates only the car
/// that asked.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("policy expected {expected} inputs but received {found}")]
    InputShape { expected: usize, found: usize },
    #[error("policy produced {found} outputs, expected {expected}")]
    OutputShape { expected: usize, found: usize },
    #[error("policy produced a non-finite output")]
    NonFinite,
    #[error("policy failed: {0}")]
    Failed(String),
}

/// One layer of values recorded during the last decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivationLayer {
    pub name: String,
    pub values: Vec<f32>,
}

/// Weighted edge between neurons of consecutive layers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    /// Index of the source layer; the target is `layer + 1`.
    pub layer: usize,
    pub from: usize,
    pub to: usize,
    pub weight: f32,
}

/// Snapshot of a policy's internals, used by debug visualizations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyActivations {
    pub layers: Vec<ActivationLayer>,
    pub connections: Vec<Connection>,
}

/// Decision-making capability queried once per frame per car.
///
/// Implementations must not have side effects the simulation can observe;
/// `&mut self` only permits scratch buffers and activation caching.
pub trait Policy: Send {
    /// Static identifier of the policy family.
    fn kind(&self) -> &'static str;

    /// Map the latest perception to an actuation request.
    fn decide(&mut self, inputs: &PolicyInputs<'_>) -> Result<Actuation, PolicyError>;

    /// Values recorded during the most recent decision, when supported.
    fn snapshot_activations(&self) -> Option<PolicyActivations> {
        None
    }
}

/// Policy attachment for a car, plus the genome it was built from.
#[derive(Default)]
pub struct PolicyBinding {
    runner: Option<Box<dyn Policy>>,
    genome: Option<u64>,
}

impl fmt::Debug for PolicyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyBinding")
            .field("kind", &self.kind())
            .field("genome", &self.genome)
            .finish()
    }
}

impl PolicyBinding {
    /// A car without a policy coasts with [`Actuation::IDLE`].
    #[must_use]
    pub fn unbound() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(policy: Box<dyn Policy>) -> Self {
        Self {
            runner: Some(policy),
            genome: None,
        }
    }

    /// Attach a policy built from the genome identified by `genome`.
    #[must_use]
    pub fn with_genome(policy: Box<dyn Policy>, genome: u64) -> Self {
        Self {
            runner: Some(policy),
            genome: Some(genome),
        }
    }

    #[must_use]
    pub const fn genome(&self) -> Option<u64> {
        self.genome
    }

    #[must_use]
    pub fn kind(&self) -> Option<&'static str> {
        self.runner.as_ref().map(|policy| policy.kind())
    }

    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.runner.is_some()
    }

    /// Produce a short descriptor suitable for logs.
    #[must_use]
    pub fn describe(&self) -> Cow<'static, str> {
        match (self.kind(), self.genome) {
            (Some(kind), Some(genome)) => Cow::Owned(format!("{kind}#{genome}")),
            (Some(kind), None) => Cow::Borrowed(kind),
            (None, _) => Cow::Borrowed("unbound"),
        }
    }

    /// Query the policy, validating its answer.
    pub fn decide(&mut self, inputs: &PolicyInputs<'_>) -> Result<Actuation, PolicyError> {
        match self.runner.as_mut() {
            Some(policy) => policy.decide(inputs)?.checked(),
            None => Ok(Actuation::IDLE),
        }
    }

    #[must_use]
    pub fn snapshot_activations(&self) -> Option<PolicyActivations> {
        self.runner.as_ref()?.snapshot_activations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Policy for Broken {
        fn kind(&self) -> &'static str {
            "test.broken"
        }

        fn decide(&mut self, _inputs: &PolicyInputs<'_>) -> Result<Actuation, PolicyError> {
            Ok(Actuation::new(f32::NAN, 0.0))
        }
    }

    fn inputs() -> PolicyInputs<'static> {
        PolicyInputs {
            distances: &[1.0, 2.0],
            offsets: &[0.0, 1.0],
            max_distance: 10.0,
            speed: 0.0,
            max_speed: 5.0,
            heading: 0.0,
        }
    }

    #[test]
    fn outputs_must_have_two_finite_values() {
        assert_eq!(
            Actuation::from_outputs(&[0.5, -0.5]),
            Ok(Actuation::new(0.5, -0.5))
        );
        assert_eq!(
            Actuation::from_outputs(&[0.5]),
            Err(PolicyError::OutputShape {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            Actuation::from_outputs(&[0.5, f32::INFINITY]),
            Err(PolicyError::NonFinite)
        );
    }

    #[test]
    fn clamped_limits_both_channels() {
        assert_eq!(
            Actuation::new(3.0, -7.0).clamped(),
            Actuation::new(1.0, -1.0)
        );
    }

    #[test]
    fn unbound_binding_idles() {
        let mut binding = PolicyBinding::unbound();
        assert!(!binding.is_bound());
        assert_eq!(binding.describe(), "unbound");
        assert_eq!(binding.decide(&inputs()), Ok(Actuation::IDLE));
        assert!(binding.snapshot_activations().is_none());
    }

    #[test]
    fn binding_rejects_non_finite_answers() {
        let mut binding = PolicyBinding::with_genome(Box::new(Broken), 7);
        assert_eq!(binding.genome(), Some(7));
        assert_eq!(binding.describe(), "test.broken#7");
        assert_eq!(binding.decide(&inputs()), Err(PolicyError::NonFinite));
    }
}
