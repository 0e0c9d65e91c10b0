use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use racebots_core::{
    Actuation, BuiltinTracks, Car, Generation, Policy, PolicyBinding, PolicyError, PolicyInputs,
    SensorLayout, Simulation, SimulationConfig, TrackProvider,
};
use std::sync::Arc;
use std::time::Duration;

/// Cheap steering so the bench measures sensing and bookkeeping.
struct Cruise;

impl Policy for Cruise {
    fn kind(&self) -> &'static str {
        "bench.cruise"
    }

    fn decide(&mut self, inputs: &PolicyInputs<'_>) -> Result<Actuation, PolicyError> {
        let ahead = inputs.distances.first().copied().unwrap_or(0.0) / inputs.max_distance;
        Ok(Actuation::new(ahead - 0.5, 0.3))
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn bench_frame_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_step");
    let samples: usize = env_or("RB_BENCH_SAMPLES", 30).max(10);
    group.sample_size(samples);
    group.warm_up_time(Duration::from_secs(env_or("RB_BENCH_WARMUP_SECS", 2)));
    group.measurement_time(Duration::from_secs(env_or("RB_BENCH_MEASURE_SECS", 10)));
    // Frames per bench iteration (override via RB_BENCH_FRAMES)
    let frames: usize = env_or("RB_BENCH_FRAMES", 64).max(1);
    let rays: usize = env_or("RB_BENCH_RAYS", 8).max(1);
    let populations: Vec<usize> = std::env::var("RB_BENCH_CARS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![50_usize, 200]);

    let track = Arc::new(
        BuiltinTracks
            .load_track(BuiltinTracks::OVAL)
            .expect("oval track"),
    );
    for &cars in &populations {
        group.bench_function(format!("frames{frames}_cars{cars}_rays{rays}"), |b| {
            b.iter_batched(
                || {
                    let config = SimulationConfig {
                        sensors: SensorLayout::Fan {
                            count: rays,
                            field_of_view: std::f32::consts::TAU,
                        },
                        ..SimulationConfig::default()
                    };
                    let population = (0..cars as u64)
                        .map(|genome| {
                            Car::spawn(track.spawn())
                                .with_policy(PolicyBinding::with_genome(Box::new(Cruise), genome))
                        })
                        .collect();
                    Simulation::new(config, Arc::clone(&track), population, Generation(0))
                        .expect("simulation")
                        .with_infinite_time(true)
                },
                |mut sim| {
                    for _ in 0..frames {
                        sim.step();
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_frame_steps);
criterion_main!(benches);
