use racebots_geometry::OrientedBox;
use serde::{Deserialize, Serialize};

use crate::{
    PolicyBinding, PolicyError, PolicyInputs, RayReading, Segment, SensorArray, SimulationConfig,
    SpawnPose, Track, Vec2,
};

/// Lifecycle of a car within a generation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CarStatus {
    #[default]
    Active,
    Eliminated,
}

/// Why a car left the live set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EliminationCause {
    /// The shortest sensor ray fell below the kill distance.
    Collision,
    /// The policy query failed or returned an invalid answer.
    PolicyFailure,
}

/// Simulated vehicle: physical state, sensor readings, policy, and fitness.
#[derive(Debug)]
pub struct Car {
    position: Vec2,
    heading: f32,
    speed: f32,
    rays: Vec<RayReading>,
    gates_passed: u64,
    score: f32,
    status: CarStatus,
    cause: Option<EliminationCause>,
    policy: PolicyBinding,
}

/// Shared, read-only state every car consults during a frame.
pub(crate) struct StepContext<'a> {
    pub config: &'a SimulationConfig,
    pub sensors: &'a SensorArray,
    pub track: &'a Track,
}

/// What happened to one car during a frame.
#[derive(Debug, Default)]
pub(crate) struct CarStep {
    pub gate: Option<usize>,
    pub eliminated: Option<EliminationCause>,
    pub policy_error: Option<PolicyError>,
}

impl Car {
    /// Stationary car without a policy.
    #[must_use]
    pub fn new(position: Vec2, heading: f32) -> Self {
        Self {
            position,
            heading: crate::wrap_signed_angle(heading),
            speed: 0.0,
            rays: Vec::new(),
            gates_passed: 0,
            score: 0.0,
            status: CarStatus::Active,
            cause: None,
            policy: PolicyBinding::unbound(),
        }
    }

    /// Place a car at a track's spawn pose.
    #[must_use]
    pub fn spawn(pose: SpawnPose) -> Self {
        Self::new(pose.position, pose.heading)
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: PolicyBinding) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Heading in radians within `(-π, π]`.
    #[must_use]
    pub const fn heading(&self) -> f32 {
        self.heading
    }

    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// Accumulated fitness.
    #[must_use]
    pub const fn score(&self) -> f32 {
        self.score
    }

    /// Gates crossed in order so far; never decreases.
    #[must_use]
    pub const fn gates_passed(&self) -> u64 {
        self.gates_passed
    }

    #[must_use]
    pub const fn status(&self) -> CarStatus {
        self.status
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.status == CarStatus::Active
    }

    #[must_use]
    pub const fn elimination_cause(&self) -> Option<EliminationCause> {
        self.cause
    }

    /// Readings from the most recent sensor cast.
    #[must_use]
    pub fn rays(&self) -> &[RayReading] {
        &self.rays
    }

    /// Shortest distance reported by the last cast, or infinity before any cast.
    #[must_use]
    pub fn shortest_distance(&self) -> f32 {
        self.rays
            .iter()
            .map(|ray| ray.distance)
            .fold(f32::INFINITY, f32::min)
    }

    #[must_use]
    pub fn policy(&self) -> &PolicyBinding {
        &self.policy
    }

    /// Body rectangle, long side along the heading.
    #[must_use]
    pub fn bounds(&self, half_extents: Vec2) -> OrientedBox {
        OrientedBox {
            center: self.position,
            heading: self.heading,
            half_extents,
        }
    }

    /// Cast every sensor against the track walls.
    pub(crate) fn perceive(&mut self, sensors: &SensorArray, track: &Track) {
        sensors.cast_into(self.position, self.heading, track.wall_index(), &mut self.rays);
    }

    /// Apply an actuation request within the configured clamps.
    pub(crate) fn actuate(&mut self, throttle: f32, steer: f32, config: &SimulationConfig) {
        self.speed = (self.speed + throttle * config.acceleration)
            .clamp(config.min_speed, config.max_speed);
        let turn =
            (steer * config.max_turn_rate).clamp(-config.max_turn_rate, config.max_turn_rate);
        self.heading = crate::wrap_signed_angle(self.heading + turn);
    }

    /// Advance the position, returning the path travelled this frame.
    pub(crate) fn integrate(&mut self, dt: f32) -> Segment {
        let previous = self.position;
        self.position += Vec2::from_angle(self.heading) * self.speed * dt;
        Segment::new(previous, self.position)
    }

    /// Count the next expected gate if `path` crosses it. Other gates crossed
    /// on the same path are ignored.
    ///
    /// A path that starts on the gate does not count: the crossing that ended
    /// there was already rewarded on the previous frame.
    pub(crate) fn check_progress(&mut self, path: &Segment, track: &Track) -> Option<usize> {
        let gate = track.expected_gate(self.gates_passed)?;
        let crossed = path
            .intersection(gate.segment())
            .is_some_and(|hit| hit.t > 0.0);
        if crossed {
            self.gates_passed += 1;
            Some(gate.index())
        } else {
            None
        }
    }

    pub(crate) fn reward(&mut self, amount: f32) {
        self.score += amount;
    }

    pub(crate) fn eliminate(&mut self, cause: EliminationCause, penalty: f32) {
        if self.status == CarStatus::Eliminated {
            return;
        }
        self.reward(penalty);
        self.status = CarStatus::Eliminated;
        self.cause = Some(cause);
    }

    /// Run one perceive, decide, actuate, integrate, and score cycle.
    pub(crate) fn step(&mut self, ctx: &StepContext<'_>) -> CarStep {
        let mut outcome = CarStep::default();
        if !self.is_alive() {
            return outcome;
        }
        let config = ctx.config;

        self.perceive(ctx.sensors, ctx.track);
        let distances: Vec<f32> = self.rays.iter().map(|ray| ray.distance).collect();
        let inputs = PolicyInputs {
            distances: &distances,
            offsets: ctx.sensors.offsets(),
            max_distance: ctx.sensors.max_distance(),
            speed: self.speed,
            max_speed: config.max_speed,
            heading: self.heading,
        };
        let actuation = match self.policy.decide(&inputs) {
            Ok(actuation) => actuation.clamped(),
            Err(error) => {
                self.eliminate(EliminationCause::PolicyFailure, config.collision_penalty);
                outcome.eliminated = Some(EliminationCause::PolicyFailure);
                outcome.policy_error = Some(error);
                return outcome;
            }
        };

        self.actuate(actuation.throttle, actuation.steer, config);
        let path = self.integrate(config.timestep);
        if let Some(gate) = self.check_progress(&path, ctx.track) {
            self.reward(config.gate_reward);
            outcome.gate = Some(gate);
        }
        self.reward(self.speed * config.survival_reward_per_speed);

        if self.shortest_distance() < config.kill_distance {
            self.eliminate(EliminationCause::Collision, config.collision_penalty);
            outcome.eliminated = Some(EliminationCause::Collision);
        }
        outcome
    }
}
