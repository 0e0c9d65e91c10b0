use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::car::StepContext;
use crate::{
    Car, CarArena, CarId, EliminationCause, Frame, Generation, PolicyActivations, SensorArray,
    SimulationConfig, SimulationError, Track, Vec2,
};

/// Request returned by the per-frame input poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameControl {
    #[default]
    Continue,
    /// End the generation now and report its result.
    Skip,
    /// Stop immediately; no result is reported.
    Abort,
}

/// Polled once per frame before any car is updated.
pub trait FrameInput {
    fn poll(&mut self, frame: Frame) -> FrameControl;
}

impl<F> FrameInput for F
where
    F: FnMut(Frame) -> FrameControl,
{
    fn poll(&mut self, frame: Frame) -> FrameControl {
        self(frame)
    }
}

/// Input source that never interrupts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl FrameInput for NoInput {
    fn poll(&mut self, _frame: Frame) -> FrameControl {
        FrameControl::Continue
    }
}

/// Presentation hook invoked after every completed frame.
pub trait FrameObserver {
    fn on_frame(&mut self, simulation: &Simulation, events: &FrameEvents);
}

/// Observer that ignores every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl FrameObserver for NullObserver {
    fn on_frame(&mut self, _simulation: &Simulation, _events: &FrameEvents) {}
}

/// Everything that changed during one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameEvents {
    pub frame: Frame,
    /// `(car, gate index)` for every gate crossed in order.
    pub gates_crossed: Vec<(CarId, usize)>,
    pub eliminated: Vec<(CarId, EliminationCause)>,
    pub policy_failures: usize,
    /// Best score after the frame.
    pub best_score: f32,
    pub live_cars: usize,
}

/// Why a generation stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EndReason {
    AllEliminated,
    Timeout,
    Skipped,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AllEliminated => "all_eliminated",
            Self::Timeout => "timeout",
            Self::Skipped => "skipped",
        })
    }
}

/// Final fitness of one car, keyed by the genome its policy came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CarFitness {
    pub genome: Option<u64>,
    pub score: f32,
    pub gates_passed: u64,
    pub alive: bool,
}

/// Summary handed to the training driver when a generation ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResult {
    pub generation: Generation,
    pub final_score: f32,
    pub frames_elapsed: u64,
    pub surviving_count: usize,
    pub reason: EndReason,
    pub policy_failures: usize,
    /// Per-car fitness in spawn order.
    pub fitness: Vec<CarFitness>,
}

/// Outcome of [`Simulation::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Completed(GenerationResult),
    /// The frame input aborted the run; the partial state is not meaningful.
    Aborted { frames: Frame },
}

/// Read-only view of a car for presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarView {
    pub id: CarId,
    pub position: Vec2,
    pub heading: f32,
    pub speed: f32,
    pub alive: bool,
    pub score: f32,
    pub expected_gate: Option<usize>,
    pub ray_ends: Vec<Vec2>,
}

/// Observable state of the whole generation at the end of a frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameSnapshot {
    pub frame: Frame,
    pub generation: Generation,
    pub score: f32,
    pub cars: Vec<CarView>,
}

/// One generation of cars evaluated on a fixed track.
pub struct Simulation {
    config: SimulationConfig,
    track: Arc<Track>,
    sensors: SensorArray,
    generation: Generation,
    infinite_time: bool,
    frame: Frame,
    score: f32,
    cars: CarArena,
    /// Spawn order of every car, live or retired.
    roster: Vec<CarId>,
    retired: Vec<(CarId, Car)>,
    policy_failures: usize,
    skipped: bool,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("track", &self.track.name())
            .field("generation", &self.generation)
            .field("frame", &self.frame)
            .field("score", &self.score)
            .field("live_cars", &self.cars.len())
            .field("retired_cars", &self.retired.len())
            .finish()
    }
}

impl Simulation {
    /// Prepare a generation. Configuration and track problems are reported
    /// here, before any frame executes.
    pub fn new(
        config: SimulationConfig,
        track: Arc<Track>,
        cars: Vec<Car>,
        generation: Generation,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        if track.walls().is_empty() {
            return Err(SimulationError::EmptyWalls);
        }
        if track.gates().is_empty() {
            return Err(SimulationError::EmptyGates);
        }
        let sensors = SensorArray::from_config(&config)?;

        let mut arena = CarArena::with_capacity(cars.len());
        let mut roster = Vec::with_capacity(cars.len());
        for car in cars {
            roster.push(arena.insert(car));
        }
        info!(
            generation = generation.0,
            track = track.name(),
            cars = roster.len(),
            rays = sensors.len(),
            "Generation prepared",
        );
        Ok(Self {
            config,
            track,
            sensors,
            generation,
            infinite_time: false,
            frame: Frame::zero(),
            score: 0.0,
            cars: arena,
            roster,
            retired: Vec::new(),
            policy_failures: 0,
            skipped: false,
        })
    }

    /// Disable the frame budget so only eliminations end the generation.
    #[must_use]
    pub fn with_infinite_time(mut self, infinite_time: bool) -> Self {
        self.infinite_time = infinite_time;
        self
    }

    pub fn set_infinite_time(&mut self, infinite_time: bool) {
        self.infinite_time = infinite_time;
    }

    #[must_use]
    pub const fn infinite_time(&self) -> bool {
        self.infinite_time
    }

    /// Frames allowed for this generation, or `None` with infinite time.
    #[must_use]
    pub fn frame_budget(&self) -> Option<u64> {
        (!self.infinite_time).then(|| self.config.frame_budget(self.generation.0))
    }

    /// Whether another frame should run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.skipped
            && !self.cars.is_empty()
            && self.frame_budget().is_none_or(|budget| self.frame.0 < budget)
    }

    /// Reason the generation would stop right now, if it would.
    #[must_use]
    pub fn end_reason(&self) -> Option<EndReason> {
        (!self.is_running()).then(|| self.stop_reason())
    }

    /// Meaningful only once `is_running` is false.
    fn stop_reason(&self) -> EndReason {
        if self.skipped {
            EndReason::Skipped
        } else if self.cars.is_empty() {
            EndReason::AllEliminated
        } else {
            EndReason::Timeout
        }
    }

    /// End the generation early; the surviving cars keep their scores.
    pub fn end_generation(&mut self) {
        self.skipped = true;
    }

    /// Advance every live car by one frame.
    pub fn step(&mut self) -> FrameEvents {
        let next = self.frame.next();
        let mut events = FrameEvents {
            frame: next,
            ..FrameEvents::default()
        };
        let ctx = StepContext {
            config: &self.config,
            sensors: &self.sensors,
            track: &self.track,
        };

        let mut dead = HashSet::new();
        let mut best = self.score;
        for (id, car) in self.cars.iter_mut() {
            let outcome = car.step(&ctx);
            if let Some(gate) = outcome.gate {
                debug!(frame = next.0, car = ?id, gate, score = car.score(), "Gate crossed");
                events.gates_crossed.push((id, gate));
            }
            if let Some(error) = outcome.policy_error {
                warn!(
                    frame = next.0,
                    car = ?id,
                    policy = %car.policy().describe(),
                    %error,
                    "Policy query failed; eliminating car",
                );
                events.policy_failures += 1;
            }
            if let Some(cause) = outcome.eliminated {
                debug!(frame = next.0, car = ?id, ?cause, score = car.score(), "Car eliminated");
                events.eliminated.push((id, cause));
                dead.insert(id);
            }
            best = best.max(car.score());
        }

        self.score = best;
        self.retired.extend(self.cars.remove_many(&dead));
        self.policy_failures += events.policy_failures;
        self.frame = next;
        events.best_score = self.score;
        events.live_cars = self.cars.len();
        events
    }

    /// Run frames until the generation ends, polling `input` before each
    /// frame and notifying `observer` after it.
    pub fn run(
        &mut self,
        input: &mut dyn FrameInput,
        observer: &mut dyn FrameObserver,
    ) -> GenerationOutcome {
        while self.is_running() {
            match input.poll(self.frame) {
                FrameControl::Continue => {}
                FrameControl::Skip => {
                    self.end_generation();
                    break;
                }
                FrameControl::Abort => {
                    info!(
                        generation = self.generation.0,
                        frames = self.frame.0,
                        "Generation aborted",
                    );
                    self.cars.clear();
                    self.retired.clear();
                    return GenerationOutcome::Aborted { frames: self.frame };
                }
            }
            let events = self.step();
            observer.on_frame(self, &events);
        }
        GenerationOutcome::Completed(self.finish())
    }

    /// Run to completion without input or presentation.
    pub fn run_headless(&mut self) -> GenerationResult {
        while self.is_running() {
            self.step();
        }
        self.finish()
    }

    fn finish(&self) -> GenerationResult {
        let result = self.summarize(self.stop_reason());
        info!(
            generation = result.generation.0,
            frames = result.frames_elapsed,
            score = result.final_score,
            survivors = result.surviving_count,
            policy_failures = result.policy_failures,
            reason = %result.reason,
            "Generation finished",
        );
        result
    }

    /// Summary of a generation that has ended; `None` while frames remain.
    #[must_use]
    pub fn result(&self) -> Option<GenerationResult> {
        self.end_reason().map(|reason| self.summarize(reason))
    }

    fn summarize(&self, reason: EndReason) -> GenerationResult {
        let fitness = self
            .roster
            .iter()
            .filter_map(|id| self.car(*id))
            .map(|car| CarFitness {
                genome: car.policy().genome(),
                score: car.score(),
                gates_passed: car.gates_passed(),
                alive: car.is_alive(),
            })
            .collect();
        GenerationResult {
            generation: self.generation,
            final_score: self.score,
            frames_elapsed: self.frame.0,
            surviving_count: self.cars.len(),
            reason,
            policy_failures: self.policy_failures,
            fitness,
        }
    }

    /// Look up a car whether it is still live or already eliminated.
    #[must_use]
    pub fn car(&self, id: CarId) -> Option<&Car> {
        self.cars.get(id).or_else(|| {
            self.retired
                .iter()
                .find(|(retired, _)| *retired == id)
                .map(|(_, car)| car)
        })
    }

    /// First live car whose body contains `point`.
    #[must_use]
    pub fn car_at(&self, point: Vec2) -> Option<CarId> {
        let half_extents = self.config.car_half_extents;
        self.cars
            .iter()
            .find(|(_, car)| car.bounds(half_extents).contains(point))
            .map(|(id, _)| id)
    }

    /// Select the car at `point` and capture its policy internals.
    #[must_use]
    pub fn inspect(&self, point: Vec2) -> Option<(CarId, PolicyActivations)> {
        let id = self.car_at(point)?;
        let activations = self.cars.get(id)?.policy().snapshot_activations()?;
        Some((id, activations))
    }

    /// Observable state of every car spawned this generation.
    #[must_use]
    pub fn snapshot(&self) -> FrameSnapshot {
        let cars = self
            .roster
            .iter()
            .filter_map(|id| self.car(*id).map(|car| (*id, car)))
            .map(|(id, car)| CarView {
                id,
                position: car.position(),
                heading: car.heading(),
                speed: car.speed(),
                alive: car.is_alive(),
                score: car.score(),
                expected_gate: self
                    .track
                    .expected_gate(car.gates_passed())
                    .map(|gate| gate.index()),
                ray_ends: car.rays().iter().map(|ray| ray.end).collect(),
            })
            .collect();
        FrameSnapshot {
            frame: self.frame,
            generation: self.generation,
            score: self.score,
            cars,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub fn track(&self) -> &Track {
        &self.track
    }

    #[must_use]
    pub fn sensors(&self) -> &SensorArray {
        &self.sensors
    }

    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Frames completed so far.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        self.frame
    }

    /// Best score seen this generation; never decreases.
    #[must_use]
    pub const fn score(&self) -> f32 {
        self.score
    }

    /// Live cars.
    #[must_use]
    pub fn cars(&self) -> &CarArena {
        &self.cars
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.cars.len()
    }

    /// Cars eliminated so far, in elimination order.
    pub fn retired(&self) -> impl Iterator<Item = (CarId, &Car)> + '_ {
        self.retired.iter().map(|(id, car)| (*id, car))
    }
}
