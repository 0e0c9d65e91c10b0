use std::f32::consts::{FRAC_PI_2, TAU};
use std::path::PathBuf;

use racebots_geometry::LinearSegmentIndex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Segment, SimulationError, Vec2};

/// Ordered checkpoint a car must cross to make progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Gate {
    index: usize,
    segment: Segment,
    center: Vec2,
}

impl Gate {
    #[must_use]
    pub fn new(index: usize, segment: Segment) -> Self {
        Self {
            index,
            segment,
            center: segment.midpoint(),
        }
    }

    /// Position of the gate in the required crossing order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Midpoint of the gate, used for HUD labels.
    #[must_use]
    pub const fn center(&self) -> Vec2 {
        self.center
    }
}

/// Starting position and heading handed to freshly spawned cars.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SpawnPose {
    pub position: Vec2,
    /// Radians, counter-clockwise from +x.
    pub heading: f32,
}

/// Whether progress wraps from the last gate back to the first.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    #[default]
    Closed,
    Open,
}

/// Serialized track format exchanged with track providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackDefinition {
    pub name: String,
    pub walls: Vec<Segment>,
    /// Gate segments in crossing order.
    pub gates: Vec<Segment>,
    #[serde(default)]
    pub spawn: SpawnPose,
    #[serde(default)]
    pub kind: TrackKind,
}

/// Validated, immutable track geometry shared by every car in a generation.
#[derive(Debug, Clone)]
pub struct Track {
    name: String,
    walls: LinearSegmentIndex,
    gates: Vec<Gate>,
    spawn: SpawnPose,
    kind: TrackKind,
}

impl Track {
    /// Validate geometry and build the wall index.
    pub fn new(
        name: impl Into<String>,
        walls: Vec<Segment>,
        gates: Vec<Gate>,
        spawn: SpawnPose,
        kind: TrackKind,
    ) -> Result<Self, SimulationError> {
        if walls.is_empty() {
            return Err(SimulationError::EmptyWalls);
        }
        if gates.is_empty() {
            return Err(SimulationError::EmptyGates);
        }
        if let Some(index) = walls.iter().position(Segment::is_degenerate) {
            return Err(SimulationError::DegenerateWall { index });
        }
        for (position, gate) in gates.iter().enumerate() {
            if gate.index != position {
                return Err(SimulationError::GateOrder {
                    position,
                    index: gate.index,
                });
            }
            if gate.segment.is_degenerate() {
                return Err(SimulationError::DegenerateGate { index: position });
            }
        }
        if !spawn.position.is_finite() || !spawn.heading.is_finite() {
            return Err(SimulationError::InvalidConfig("spawn pose must be finite"));
        }
        let walls = LinearSegmentIndex::from_segments(&walls)
            .map_err(|_| SimulationError::DegenerateWall { index: 0 })?;
        Ok(Self {
            name: name.into(),
            walls,
            gates,
            spawn,
            kind,
        })
    }

    pub fn from_definition(definition: TrackDefinition) -> Result<Self, SimulationError> {
        let gates = definition
            .gates
            .into_iter()
            .enumerate()
            .map(|(index, segment)| Gate::new(index, segment))
            .collect();
        Self::new(
            definition.name,
            definition.walls,
            gates,
            definition.spawn,
            definition.kind,
        )
    }

    /// Export back into the serialized format.
    #[must_use]
    pub fn to_definition(&self) -> TrackDefinition {
        TrackDefinition {
            name: self.name.clone(),
            walls: self.walls().to_vec(),
            gates: self.gates.iter().map(|gate| gate.segment).collect(),
            spawn: self.spawn,
            kind: self.kind,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn walls(&self) -> &[Segment] {
        self.walls.segments()
    }

    /// Wall lookup structure used by the sensors.
    #[must_use]
    pub fn wall_index(&self) -> &LinearSegmentIndex {
        &self.walls
    }

    #[must_use]
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    #[must_use]
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    #[must_use]
    pub const fn spawn(&self) -> SpawnPose {
        self.spawn
    }

    #[must_use]
    pub const fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Gate expected after `gates_passed` crossings; `None` once an open
    /// track has been completed.
    #[must_use]
    pub fn expected_gate(&self, gates_passed: u64) -> Option<&Gate> {
        let count = self.gates.len() as u64;
        let index = match self.kind {
            TrackKind::Closed => gates_passed % count,
            TrackKind::Open if gates_passed < count => gates_passed,
            TrackKind::Open => return None,
        };
        self.gates.get(index as usize)
    }
}

/// Errors raised while loading or saving tracks by name.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("unknown track `{0}`")]
    UnknownTrack(String),
    /// Only ASCII letters, digits, `-` and `_` map onto file names.
    #[error("track name `{0}` cannot be used as a file name")]
    InvalidName(String),
    #[error("failed to read track file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse track file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to encode track for {}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to write track file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("track geometry rejected")]
    Invalid(#[from] SimulationError),
}

/// Supplies track geometry by name.
pub trait TrackProvider {
    /// Load and validate the named track.
    fn load_track(&self, name: &str) -> Result<Track, TrackError>;

    /// Names this provider can load.
    fn track_names(&self) -> Vec<String>;
}

/// Procedurally generated tracks that need no asset files.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTracks;

impl BuiltinTracks {
    pub const OVAL: &'static str = "oval";
    pub const STRAIGHT: &'static str = "straight";

    /// Closed ring between two concentric polygons with radial gates.
    #[must_use]
    pub fn oval() -> TrackDefinition {
        const SIDES: usize = 24;
        const GATES: usize = 12;
        let center = Vec2::new(640.0, 480.0);
        let (inner, outer) = (200.0_f32, 300.0_f32);
        let point = |radius: f32, angle: f32| center + Vec2::from_angle(angle) * radius;

        let mut walls = Vec::with_capacity(SIDES * 2);
        for side in 0..SIDES {
            let a = TAU * side as f32 / SIDES as f32;
            let b = TAU * (side + 1) as f32 / SIDES as f32;
            walls.push(Segment::new(point(inner, a), point(inner, b)));
            walls.push(Segment::new(point(outer, a), point(outer, b)));
        }
        // Gate 0 sits just ahead of the spawn line; the last gate is the spawn line.
        let gates = (1..=GATES)
            .map(|k| {
                let angle = TAU * k as f32 / GATES as f32;
                Segment::new(point(inner - 5.0, angle), point(outer + 5.0, angle))
            })
            .collect();
        TrackDefinition {
            name: Self::OVAL.to_string(),
            walls,
            gates,
            spawn: SpawnPose {
                position: point((inner + outer) * 0.5, 0.0),
                heading: FRAC_PI_2,
            },
            kind: TrackKind::Closed,
        }
    }

    /// Open corridor with evenly spaced gates.
    #[must_use]
    pub fn straight() -> TrackDefinition {
        let (length, width) = (1_000.0_f32, 100.0_f32);
        let walls = vec![
            Segment::from_coords(0.0, 0.0, length, 0.0),
            Segment::from_coords(0.0, width, length, width),
            Segment::from_coords(0.0, 0.0, 0.0, width),
            Segment::from_coords(length, 0.0, length, width),
        ];
        let gates = (1..10)
            .map(|k| {
                let x = k as f32 * 100.0;
                Segment::from_coords(x, 0.0, x, width)
            })
            .collect();
        TrackDefinition {
            name: Self::STRAIGHT.to_string(),
            walls,
            gates,
            spawn: SpawnPose {
                position: Vec2::new(20.0, width * 0.5),
                heading: 0.0,
            },
            kind: TrackKind::Open,
        }
    }
}

impl TrackProvider for BuiltinTracks {
    fn load_track(&self, name: &str) -> Result<Track, TrackError> {
        let definition = match name {
            Self::OVAL => Self::oval(),
            Self::STRAIGHT => Self::straight(),
            other => return Err(TrackError::UnknownTrack(other.to_string())),
        };
        Ok(Track::from_definition(definition)?)
    }

    fn track_names(&self) -> Vec<String> {
        vec![Self::OVAL.to_string(), Self::STRAIGHT.to_string()]
    }
}
