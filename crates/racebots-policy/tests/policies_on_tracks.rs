use std::sync::Arc;

use racebots_core::{
    BuiltinTracks, Car, Generation, Policy, Simulation, SimulationConfig, TrackProvider,
};
use racebots_policy::{
    FeedForwardPolicy, RulePolicy, input_size, into_binding, network_diagram,
    write_network_diagram,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn load(name: &str) -> Arc<racebots_core::Track> {
    Arc::new(BuiltinTracks.load_track(name).expect("builtin track"))
}

#[test]
fn rule_policy_drives_down_the_straight() {
    let track = load(BuiltinTracks::STRAIGHT);
    let car = Car::spawn(track.spawn()).with_policy(into_binding(RulePolicy::default(), 0));
    let mut sim = Simulation::new(SimulationConfig::default(), track, vec![car], Generation(0))
        .expect("simulation");
    let result = sim.run_headless();

    assert_eq!(result.fitness.len(), 1);
    let fitness = result.fitness[0];
    assert_eq!(fitness.genome, Some(0));
    assert!(fitness.alive, "rule policy crashed: {result:?}");
    assert!(fitness.gates_passed >= 7, "only {} gates", fitness.gates_passed);
    assert!(result.final_score >= 700.0);
}

#[test]
fn random_networks_run_a_full_generation() {
    let track = load(BuiltinTracks::OVAL);
    let config = SimulationConfig::default();
    let rays = config.sensors.offsets().len();
    let mut rng = SmallRng::seed_from_u64(0x5EED);
    let cars = (0..20_u64)
        .map(|genome| {
            let policy = FeedForwardPolicy::random(&mut rng, input_size(rays), 1, 8);
            Car::spawn(track.spawn()).with_policy(into_binding(policy, genome))
        })
        .collect();
    let mut sim = Simulation::new(config, track, cars, Generation(0)).expect("simulation");
    let result = sim.run_headless();

    assert!(result.frames_elapsed <= 600);
    assert_eq!(result.policy_failures, 0);
    assert_eq!(result.fitness.len(), 20);
    assert!(result.fitness.iter().all(|f| f.score.is_finite()));
}

#[test]
fn mis_sized_network_is_eliminated_without_stopping_others() {
    let track = load(BuiltinTracks::OVAL);
    let mut rng = SmallRng::seed_from_u64(3);
    let wrong = FeedForwardPolicy::random(&mut rng, 4, 1, 4);
    let cars = vec![
        Car::spawn(track.spawn()).with_policy(into_binding(wrong, 1)),
        Car::spawn(track.spawn()).with_policy(into_binding(RulePolicy::default(), 2)),
    ];
    let mut sim = Simulation::new(SimulationConfig::default(), track, cars, Generation(0))
        .expect("simulation");
    let events = sim.step();
    assert_eq!(events.policy_failures, 1);
    assert_eq!(events.live_cars, 1);
}

#[test]
fn selected_car_produces_a_network_diagram() {
    let track = load(BuiltinTracks::OVAL);
    let config = SimulationConfig::default();
    let rays = config.sensors.offsets().len();
    let mut rng = SmallRng::seed_from_u64(99);
    let policy = FeedForwardPolicy::random(&mut rng, input_size(rays), 2, 5);
    assert_eq!(policy.kind(), "feedforward.tanh");
    let spawn = track.spawn();
    let car = Car::spawn(spawn).with_policy(into_binding(policy, 42));
    let mut sim = Simulation::new(config, track, vec![car], Generation(0)).expect("simulation");
    sim.step();

    let position = sim.cars().iter().next().expect("live car").1.position();
    let (_, activations) = sim.inspect(position).expect("inspectable car");
    assert_eq!(activations.layers.len(), 4);
    assert_eq!(activations.layers[0].values.len(), rays + 1);
    assert_eq!(activations.connections.len(), 9 * 5 + 5 * 5 + 5 * 2);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("policy.dot");
    write_network_diagram(&path, &activations).expect("write diagram");
    let written = std::fs::read_to_string(&path).expect("read diagram");
    assert_eq!(written, network_diagram(&activations));
    assert!(written.contains("label=\"hidden.1\""));
}

#[test]
fn network_survives_a_json_round_trip() {
    let mut rng = SmallRng::seed_from_u64(8);
    let policy = FeedForwardPolicy::random(&mut rng, 5, 1, 3);
    let json = serde_json::to_string(&policy).expect("serialize");
    let back: FeedForwardPolicy = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.layers(), policy.layers());

    let broken = r#"[{"inputs":2,"outputs":3,"weights":[0,0,0,0,0,0],"biases":[0,0,0]}]"#;
    assert!(serde_json::from_str::<FeedForwardPolicy>(broken).is_err());
}
