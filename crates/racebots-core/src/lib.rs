//! Core per-frame simulation for racebots generations.
//!
//! A [`Simulation`] owns one generation of cars on a fixed [`Track`]. Each
//! frame every live car casts its sensors, asks its policy for an
//! [`Actuation`], moves, collects gate and survival rewards, and is eliminated
//! when a wall comes within the kill distance. The loop ends when every car is
//! gone, the frame budget for the generation runs out, or the frame input asks
//! to skip or abort.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

mod arena;
mod car;
mod config;
mod policy;
mod sensor;
mod simulation;
mod track;

pub use arena::CarArena;
pub use car::{Car, CarStatus, EliminationCause};
pub use config::{SensorLayout, SimulationConfig};
pub use policy::{
    ACTUATION_SIZE, ActivationLayer, Actuation, Connection, Policy, PolicyActivations,
    PolicyBinding, PolicyError, PolicyInputs,
};
pub use racebots_geometry::{Segment, Vec2};
pub use sensor::{RayReading, SensorArray};
pub use simulation::{
    CarFitness, CarView, EndReason, FrameControl, FrameEvents, FrameInput, FrameObserver,
    FrameSnapshot, GenerationOutcome, GenerationResult, NoInput, NullObserver, Simulation,
};
pub use track::{
    BuiltinTracks, Gate, SpawnPose, Track, TrackDefinition, TrackError, TrackKind, TrackProvider,
};

new_key_type! {
    /// Stable handle for cars backed by a generational slot map.
    pub struct CarId;
}

/// Frames simulated since the generation started.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Frame(pub u64);

impl Frame {
    /// Returns the next sequential frame.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Generation number assigned by the training driver.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Generation(pub u32);

impl Generation {
    /// Advances to the next generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Errors that prevent a generation from starting.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The track supplies no walls for the sensors to hit.
    #[error("track has no walls")]
    EmptyWalls,
    /// The track supplies no gates to score progress against.
    #[error("track has no gates")]
    EmptyGates,
    /// The sensor layout produced zero rays.
    #[error("sensor layout has no rays")]
    NoSensors,
    #[error("wall {index} has zero length")]
    DegenerateWall { index: usize },
    #[error("gate {index} has zero length")]
    DegenerateGate { index: usize },
    /// Gate indices must match their position in the track's gate list.
    #[error("gate at position {position} carries index {index}")]
    GateOrder { position: usize, index: usize },
}

const FULL_TURN: f32 = std::f32::consts::TAU;
const HALF_TURN: f32 = std::f32::consts::PI;

/// Wrap into `(-π, π]`. Non-finite angles become zero.
pub(crate) fn wrap_signed_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + HALF_TURN).rem_euclid(FULL_TURN) - HALF_TURN;
    if wrapped <= -HALF_TURN {
        HALF_TURN
    } else {
        wrapped.min(HALF_TURN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_and_generation_advance() {
        assert_eq!(Frame::zero().next().next(), Frame(2));
        assert_eq!(Generation(4).next(), Generation(5));
    }

    #[test]
    fn wrap_signed_angle_stays_in_half_open_range() {
        for angle in [-7.0_f32, -HALF_TURN, -1.0, 0.0, 2.5, 5.0 * HALF_TURN, 40.0] {
            let wrapped = wrap_signed_angle(angle);
            assert!(wrapped > -HALF_TURN - 1e-5 && wrapped <= HALF_TURN + 1e-5);
            assert!((wrapped.sin() - angle.sin()).abs() < 1e-3);
            assert!((wrapped.cos() - angle.cos()).abs() < 1e-3);
        }
        assert_eq!(wrap_signed_angle(f32::NAN), 0.0);
        assert!((wrap_signed_angle(0.25) - 0.25).abs() < f32::EPSILON);
        assert_eq!(wrap_signed_angle(-HALF_TURN), HALF_TURN);
    }

    #[test]
    fn wrap_signed_angle_handles_huge_headings() {
        for angle in [1.0e9_f32, -1.0e12, f32::MAX, f32::MIN, 3.0e7] {
            let wrapped = wrap_signed_angle(angle);
            assert!(wrapped > -HALF_TURN && wrapped <= HALF_TURN, "{angle} -> {wrapped}");
        }
    }
}
