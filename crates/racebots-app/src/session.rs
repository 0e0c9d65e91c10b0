use std::sync::Arc;

use racebots_core::{
    Car, FrameInput, FrameObserver, Generation, GenerationOutcome, GenerationResult, SensorArray,
    Simulation, SpawnPose, Track, TrackProvider,
};
use racebots_policy::{FeedForwardPolicy, RulePolicy, input_size, into_binding};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{PolicyChoice, SessionConfig, SessionError};

const DEFAULT_SEED: u64 = 0xFACA_DEAF_0123_4567;

/// Results of every completed generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub generations: Vec<GenerationResult>,
    /// A frame input aborted the session before the last generation.
    pub aborted: bool,
}

impl SessionSummary {
    /// Highest generation score seen.
    #[must_use]
    pub fn best_score(&self) -> Option<f32> {
        self.generations
            .iter()
            .map(|result| result.final_score)
            .reduce(f32::max)
    }
}

/// Runs consecutive generations, spawning a fresh population for each.
pub struct Session {
    config: SessionConfig,
    /// Loaded once, parallel to `config.map_pool`.
    tracks: Vec<Arc<Track>>,
    rays: usize,
    rng: SmallRng,
    next: Generation,
    summary: SessionSummary,
}

impl Session {
    /// Validate `config` and load every track in its map pool up front.
    pub fn new(config: SessionConfig, provider: &dyn TrackProvider) -> Result<Self, SessionError> {
        config.validate()?;
        let rays = SensorArray::from_config(&config.simulation)?.len();
        let tracks = config
            .map_pool
            .iter()
            .map(|name| provider.load_track(name).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let rng = SmallRng::seed_from_u64(config.rng_seed.unwrap_or(DEFAULT_SEED));
        info!(
            generations = config.generations,
            population = config.population,
            maps = ?config.map_pool,
            policy = ?config.policy,
            "Session configured",
        );
        Ok(Self {
            config,
            tracks,
            rays,
            rng,
            next: Generation::default(),
            summary: SessionSummary::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Generation the next call to [`Session::run_generation`] evaluates.
    #[must_use]
    pub const fn next_generation(&self) -> Generation {
        self.next
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.summary.aborted || self.next.0 >= self.config.generations
    }

    #[must_use]
    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Track used by `generation`.
    #[must_use]
    pub fn track_for(&self, generation: Generation) -> Arc<Track> {
        let index = generation.0 as usize % self.tracks.len();
        Arc::clone(&self.tracks[index])
    }

    /// Fresh cars for `generation`, each bound to a new policy whose genome
    /// id is unique across the session.
    pub fn spawn_population(&mut self, spawn: SpawnPose, generation: Generation) -> Vec<Car> {
        let population = self.config.population;
        let jitter = if self.config.random_angle {
            self.config.spawn_angle_jitter
        } else {
            0.0
        };
        (0..population)
            .map(|index| {
                let heading = spawn.heading + self.rng.random_range(-jitter..=jitter);
                let genome = u64::from(generation.0) * population as u64 + index as u64;
                let binding = match self.config.policy {
                    PolicyChoice::FeedForward => into_binding(
                        FeedForwardPolicy::random(
                            &mut self.rng,
                            input_size(self.rays),
                            self.config.hidden_layers,
                            self.config.hidden_width,
                        ),
                        genome,
                    ),
                    PolicyChoice::Rule => into_binding(RulePolicy::default(), genome),
                };
                Car::spawn(SpawnPose {
                    position: spawn.position,
                    heading,
                })
                .with_policy(binding)
            })
            .collect()
    }

    /// Build the simulation for the next generation without running it.
    pub fn prepare_generation(&mut self) -> Result<Simulation, SessionError> {
        let generation = self.next;
        let track = self.track_for(generation);
        let cars = self.spawn_population(track.spawn(), generation);
        let simulation = Simulation::new(self.config.simulation.clone(), track, cars, generation)?
            .with_infinite_time(self.config.infinite_time);
        Ok(simulation)
    }

    /// Run the next generation to completion.
    pub fn run_generation(
        &mut self,
        input: &mut dyn FrameInput,
        observer: &mut dyn FrameObserver,
    ) -> Result<GenerationOutcome, SessionError> {
        let mut simulation = self.prepare_generation()?;
        let outcome = simulation.run(input, observer);
        match &outcome {
            GenerationOutcome::Completed(result) => {
                self.summary.generations.push(result.clone());
                self.next = self.next.next();
            }
            GenerationOutcome::Aborted { .. } => self.summary.aborted = true,
        }
        Ok(outcome)
    }

    /// Run generations until the configured count is reached or an input
    /// aborts.
    pub fn run(
        &mut self,
        input: &mut dyn FrameInput,
        observer: &mut dyn FrameObserver,
    ) -> Result<&SessionSummary, SessionError> {
        while !self.is_finished() {
            self.run_generation(input, observer)?;
        }
        info!(
            generations = self.summary.generations.len(),
            aborted = self.summary.aborted,
            best = self.summary.best_score().unwrap_or(0.0),
            "Session finished",
        );
        Ok(&self.summary)
    }
}
