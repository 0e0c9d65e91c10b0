use racebots_geometry::{Ray, SegmentIndex};
use serde::{Deserialize, Serialize};

use crate::{SimulationConfig, SimulationError, Vec2};

/// Latest measurement of a single ray.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RayReading {
    /// Angle relative to the car heading, in radians.
    pub offset: f32,
    /// Distance from the car center to `end`.
    pub distance: f32,
    /// Terminal point: the nearest wall hit, or the far end of the ray.
    pub end: Vec2,
}

/// Fixed set of rays cast from a car's center.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorArray {
    offsets: Vec<f32>,
    max_distance: f32,
}

impl SensorArray {
    /// Build a sensor array from explicit offsets.
    pub fn new(offsets: Vec<f32>, max_distance: f32) -> Result<Self, SimulationError> {
        if offsets.is_empty() {
            return Err(SimulationError::NoSensors);
        }
        if !max_distance.is_finite() || max_distance <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "max_sensor_distance must be positive",
            ));
        }
        Ok(Self {
            offsets,
            max_distance,
        })
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimulationError> {
        Self::new(config.sensors.offsets(), config.max_sensor_distance)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    #[must_use]
    pub fn offsets(&self) -> &[f32] {
        &self.offsets
    }

    #[must_use]
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// Cast every ray into `readings`, reusing its allocation.
    pub fn cast_into(
        &self,
        origin: Vec2,
        heading: f32,
        walls: &dyn SegmentIndex,
        readings: &mut Vec<RayReading>,
    ) {
        readings.clear();
        readings.extend(self.offsets.iter().map(|&offset| {
            let hit = Ray::from_angle(origin, heading + offset, self.max_distance).cast(walls);
            RayReading {
                offset,
                distance: hit.distance,
                end: hit.point,
            }
        }));
    }

    /// Cast every ray and return the `(offset, distance)` readings.
    #[must_use]
    pub fn cast_all(
        &self,
        origin: Vec2,
        heading: f32,
        walls: &dyn SegmentIndex,
    ) -> Vec<RayReading> {
        let mut readings = Vec::with_capacity(self.offsets.len());
        self.cast_into(origin, heading, walls, &mut readings);
        readings
    }
}
