use std::path::Path;

use racebots_core::{BuiltinTracks, SimulationConfig};
use serde::{Deserialize, Serialize};

use crate::SessionError;

pub const MIN_POPULATION: usize = 2;
pub const MAX_POPULATION: usize = 200;
pub const MAX_HIDDEN_LAYERS: usize = 10;

/// Policy family used to populate every generation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyChoice {
    /// Randomly initialized feed-forward networks.
    #[default]
    FeedForward,
    /// The fixed clearance-following rules.
    Rule,
}

/// Everything needed to run a multi-generation session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub generations: u32,
    /// Cars per generation.
    pub population: usize,
    /// Hidden layers for feed-forward networks.
    pub hidden_layers: usize,
    /// Neurons per hidden layer.
    pub hidden_width: usize,
    /// Jitter each car's spawn heading.
    pub random_angle: bool,
    /// Largest heading jitter in radians when `random_angle` is set.
    pub spawn_angle_jitter: f32,
    /// Tracks cycled through by generation number.
    pub map_pool: Vec<String>,
    /// Disable the per-generation frame budget.
    pub infinite_time: bool,
    pub rng_seed: Option<u64>,
    pub policy: PolicyChoice,
    pub simulation: SimulationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            generations: 100,
            population: 50,
            hidden_layers: 1,
            hidden_width: 8,
            random_angle: true,
            spawn_angle_jitter: std::f32::consts::FRAC_PI_6,
            map_pool: vec![BuiltinTracks::OVAL.to_string()],
            infinite_time: false,
            rng_seed: None,
            policy: PolicyChoice::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, SessionError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Check session limits and the embedded simulation settings.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !(MIN_POPULATION..=MAX_POPULATION).contains(&self.population) {
            return Err(SessionError::InvalidConfig(
                "population must be between 2 and 200",
            ));
        }
        if self.hidden_layers > MAX_HIDDEN_LAYERS {
            return Err(SessionError::InvalidConfig(
                "hidden_layers must be at most 10",
            ));
        }
        if self.hidden_layers > 0 && self.hidden_width == 0 {
            return Err(SessionError::InvalidConfig(
                "hidden_width must be positive when hidden layers are present",
            ));
        }
        if !self.spawn_angle_jitter.is_finite() || self.spawn_angle_jitter < 0.0 {
            return Err(SessionError::InvalidConfig(
                "spawn_angle_jitter must be finite and non-negative",
            ));
        }
        if self.map_pool.is_empty() {
            return Err(SessionError::InvalidConfig("map_pool must name at least one track"));
        }
        self.simulation.validate()?;
        Ok(())
    }

    /// Track name for `generation`.
    #[must_use]
    pub fn map_for(&self, generation: u32) -> Option<&str> {
        if self.map_pool.is_empty() {
            return None;
        }
        let index = generation as usize % self.map_pool.len();
        self.map_pool.get(index).map(String::as_str)
    }
}
