//! Hand-written driving rules, useful as a baseline and for demos.

use racebots_core::{Actuation, Policy, PolicyError, PolicyInputs};
use serde::{Deserialize, Serialize};

use crate::PolicyKind;

/// Rays within this angle of the heading count as looking ahead.
const FORWARD_CONE: f32 = std::f32::consts::FRAC_PI_6;

/// Steers toward open space and slows down as the road ahead closes in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RulePolicy {
    /// Multiplier on the left/right clearance imbalance.
    pub steer_gain: f32,
    /// Target speed, as a fraction of the maximum, with a clear road ahead.
    pub cruise_fraction: f32,
    /// How hard the throttle chases the target speed.
    pub throttle_gain: f32,
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            steer_gain: 1.5,
            cruise_fraction: 0.5,
            throttle_gain: 4.0,
        }
    }
}

impl RulePolicy {
    pub const KIND: PolicyKind = PolicyKind::new("rule.clearance");
}

impl Policy for RulePolicy {
    fn kind(&self) -> &'static str {
        Self::KIND.as_str()
    }

    fn decide(&mut self, inputs: &PolicyInputs<'_>) -> Result<Actuation, PolicyError> {
        if inputs.distances.len() != inputs.offsets.len() {
            return Err(PolicyError::InputShape {
                expected: inputs.offsets.len(),
                found: inputs.distances.len(),
            });
        }
        let max_distance = inputs.max_distance.max(f32::EPSILON);
        let mut lateral = 0.0_f32;
        let mut ahead = 1.0_f32;
        for (distance, offset) in inputs.distances.iter().zip(inputs.offsets) {
            let clearance = (distance / max_distance).clamp(0.0, 1.0);
            // Positive offsets look to the left, which is also positive steer.
            lateral += clearance * offset.sin();
            if offset.abs() <= FORWARD_CONE {
                ahead = ahead.min(clearance);
            }
        }

        let max_speed = inputs.max_speed.abs().max(f32::EPSILON);
        let target = ahead * self.cruise_fraction * max_speed;
        let throttle = (target - inputs.speed) / max_speed * self.throttle_gain;
        let steer = lateral * self.steer_gain;
        Ok(Actuation::new(throttle, steer).clamped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const OFFSETS: [f32; 3] = [0.0, FRAC_PI_2, -FRAC_PI_2];

    fn inputs<'a>(distances: &'a [f32], speed: f32) -> PolicyInputs<'a> {
        PolicyInputs {
            distances,
            offsets: &OFFSETS,
            max_distance: 100.0,
            speed,
            max_speed: 100.0,
            heading: 0.0,
        }
    }

    #[test]
    fn steers_toward_the_more_open_side() {
        let mut policy = RulePolicy::default();
        let left_open = policy.decide(&inputs(&[100.0, 80.0, 20.0], 0.0)).expect("decision");
        assert!(left_open.steer > 0.0);
        let right_open = policy.decide(&inputs(&[100.0, 20.0, 80.0], 0.0)).expect("decision");
        assert!(right_open.steer < 0.0);
        let balanced = policy.decide(&inputs(&[100.0, 50.0, 50.0], 0.0)).expect("decision");
        assert!(balanced.steer.abs() < 1e-6);
    }

    #[test]
    fn brakes_when_the_road_ahead_closes() {
        let mut policy = RulePolicy::default();
        let open = policy.decide(&inputs(&[100.0, 50.0, 50.0], 10.0)).expect("decision");
        assert!(open.throttle > 0.0);
        let blocked = policy.decide(&inputs(&[5.0, 50.0, 50.0], 40.0)).expect("decision");
        assert!(blocked.throttle < 0.0);
    }

    #[test]
    fn mismatched_sensor_arrays_are_rejected() {
        let mut policy = RulePolicy::default();
        assert!(matches!(
            policy.decide(&inputs(&[1.0], 0.0)),
            Err(PolicyError::InputShape { .. })
        ));
    }
}
