use serde::{Deserialize, Serialize};

use crate::{SimulationError, Vec2};

const FULL_TURN: f32 = std::f32::consts::TAU;

/// Arrangement of sensor rays relative to the car heading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SensorLayout {
    /// `count` rays spread evenly and symmetrically across `field_of_view`
    /// radians. A full turn places one ray straight ahead and none duplicated
    /// at the rear.
    Fan { count: usize, field_of_view: f32 },
    /// Explicit offsets in radians.
    Custom(Vec<f32>),
}

impl Default for SensorLayout {
    fn default() -> Self {
        Self::Fan {
            count: 8,
            field_of_view: FULL_TURN,
        }
    }
}

impl SensorLayout {
    /// Resolve the layout into concrete angle offsets.
    #[must_use]
    pub fn offsets(&self) -> Vec<f32> {
        match self {
            Self::Custom(offsets) => offsets.clone(),
            Self::Fan { count: 0, .. } => Vec::new(),
            Self::Fan { count: 1, .. } => vec![0.0],
            Self::Fan {
                count,
                field_of_view,
            } => {
                let count = *count;
                if *field_of_view >= FULL_TURN - 1e-5 {
                    // Ray 0 points straight ahead; the rest walk round the circle.
                    let step = FULL_TURN / count as f32;
                    (0..count)
                        .map(|i| crate::wrap_signed_angle(step * i as f32))
                        .collect()
                } else {
                    let step = field_of_view / (count - 1) as f32;
                    let start = -field_of_view * 0.5;
                    (0..count).map(|i| start + step * i as f32).collect()
                }
            }
        }
    }

    fn validate(&self) -> Result<(), SimulationError> {
        match self {
            Self::Fan {
                count,
                field_of_view,
            } => {
                if *count == 0 {
                    return Err(SimulationError::NoSensors);
                }
                if !field_of_view.is_finite() || *field_of_view < 0.0 || *field_of_view > FULL_TURN
                {
                    return Err(SimulationError::InvalidConfig(
                        "field_of_view must lie within [0, 2π]",
                    ));
                }
            }
            Self::Custom(offsets) => {
                if offsets.is_empty() {
                    return Err(SimulationError::NoSensors);
                }
                if offsets.iter().any(|offset| !offset.is_finite()) {
                    return Err(SimulationError::InvalidConfig(
                        "sensor offsets must be finite",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Static configuration for one generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds of motion integrated per frame.
    pub timestep: f32,
    /// Lowest speed a car may reach (negative values allow reversing).
    pub min_speed: f32,
    /// Highest speed a car may reach.
    pub max_speed: f32,
    /// Speed change per frame at full throttle.
    pub acceleration: f32,
    /// Heading change (radians) per frame at full steer.
    pub max_turn_rate: f32,
    /// Ray arrangement shared by every car.
    pub sensors: SensorLayout,
    /// Length of each sensor ray.
    pub max_sensor_distance: f32,
    /// A car whose shortest ray falls below this distance is eliminated.
    pub kill_distance: f32,
    /// Reward for crossing the next expected gate.
    pub gate_reward: f32,
    /// Reward (normally negative) applied on elimination.
    pub collision_penalty: f32,
    /// Survival reward per frame per unit of speed. Tied to a 60 fps
    /// baseline rather than to `timestep`.
    pub survival_reward_per_speed: f32,
    /// Frame budget for generation zero.
    pub base_timeout_frames: u64,
    /// Extra frames granted per generation number.
    pub timeout_growth_frames: u64,
    /// Half width and half length of the car body used for selection.
    pub car_half_extents: Vec2,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            min_speed: -2.0,
            max_speed: 300.0,
            acceleration: 10.0,
            max_turn_rate: 0.08,
            sensors: SensorLayout::default(),
            max_sensor_distance: 300.0,
            kill_distance: 10.0,
            gate_reward: 100.0,
            collision_penalty: -50.0,
            survival_reward_per_speed: 1.0 / 60.0,
            base_timeout_frames: 600,
            timeout_growth_frames: 60,
            car_half_extents: Vec2::new(20.0, 10.0),
        }
    }
}

impl SimulationConfig {
    /// Frames allowed before a generation times out.
    #[must_use]
    pub fn frame_budget(&self, generation: u32) -> u64 {
        self.base_timeout_frames
            .saturating_add(self.timeout_growth_frames.saturating_mul(u64::from(generation)))
    }

    /// Validates the configuration before any frame runs.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let scalars = [
            self.timestep,
            self.min_speed,
            self.max_speed,
            self.acceleration,
            self.max_turn_rate,
            self.max_sensor_distance,
            self.kill_distance,
            self.gate_reward,
            self.collision_penalty,
            self.survival_reward_per_speed,
            self.car_half_extents.x,
            self.car_half_extents.y,
        ];
        if scalars.iter().any(|value| !value.is_finite()) {
            return Err(SimulationError::InvalidConfig(
                "configuration values must be finite",
            ));
        }
        if self.timestep <= 0.0 {
            return Err(SimulationError::InvalidConfig("timestep must be positive"));
        }
        if self.min_speed > self.max_speed {
            return Err(SimulationError::InvalidConfig(
                "min_speed cannot exceed max_speed",
            ));
        }
        if self.acceleration < 0.0 || self.max_turn_rate < 0.0 {
            return Err(SimulationError::InvalidConfig(
                "acceleration and max_turn_rate must be non-negative",
            ));
        }
        if self.max_sensor_distance <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "max_sensor_distance must be positive",
            ));
        }
        if self.kill_distance < 0.0 {
            return Err(SimulationError::InvalidConfig(
                "kill_distance must be non-negative",
            ));
        }
        if self.car_half_extents.x < 0.0 || self.car_half_extents.y < 0.0 {
            return Err(SimulationError::InvalidConfig(
                "car_half_extents must be non-negative",
            ));
        }
        self.sensors.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SimulationConfig::default().validate().expect("valid defaults");
    }

    #[test]
    fn frame_budget_grows_with_generation() {
        let config = SimulationConfig::default();
        assert_eq!(config.frame_budget(0), 600);
        assert_eq!(config.frame_budget(5), 900);
        let huge = SimulationConfig {
            timeout_growth_frames: u64::MAX,
            ..SimulationConfig::default()
        };
        assert_eq!(huge.frame_budget(3), u64::MAX);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cases = [
            SimulationConfig {
                timestep: 0.0,
                ..SimulationConfig::default()
            },
            SimulationConfig {
                min_speed: 5.0,
                max_speed: 1.0,
                ..SimulationConfig::default()
            },
            SimulationConfig {
                max_sensor_distance: f32::NAN,
                ..SimulationConfig::default()
            },
            SimulationConfig {
                kill_distance: -1.0,
                ..SimulationConfig::default()
            },
        ];
        for config in cases {
            assert!(matches!(
                config.validate(),
                Err(SimulationError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn zero_rays_is_rejected() {
        let fan = SimulationConfig {
            sensors: SensorLayout::Fan {
                count: 0,
                field_of_view: 1.0,
            },
            ..SimulationConfig::default()
        };
        assert_eq!(fan.validate(), Err(SimulationError::NoSensors));
        let custom = SimulationConfig {
            sensors: SensorLayout::Custom(Vec::new()),
            ..SimulationConfig::default()
        };
        assert_eq!(custom.validate(), Err(SimulationError::NoSensors));
    }

    #[test]
    fn full_circle_fan_has_forward_ray_without_duplicate() {
        let offsets = SensorLayout::default().offsets();
        assert_eq!(offsets.len(), 8);
        assert_eq!(offsets[0], 0.0);
        let rear = offsets
            .iter()
            .filter(|offset| (offset.abs() - std::f32::consts::PI).abs() < 1e-4)
            .count();
        assert_eq!(rear, 1);
    }

    #[test]
    fn partial_fan_is_symmetric() {
        let offsets = SensorLayout::Fan {
            count: 5,
            field_of_view: std::f32::consts::PI,
        }
        .offsets();
        assert_eq!(offsets.len(), 5);
        assert!((offsets[0] + std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert!(offsets[2].abs() < 1e-5);
        assert!((offsets[4] - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{ "kill_distance": 4.0, "sensors": { "custom": [0.0, 1.0] } }"#)
                .expect("config");
        assert_eq!(config.kill_distance, 4.0);
        assert_eq!(config.sensors, SensorLayout::Custom(vec![0.0, 1.0]));
        assert_eq!(config.base_timeout_frames, 600);
    }
}
