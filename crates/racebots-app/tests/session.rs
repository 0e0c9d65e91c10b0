use std::collections::HashSet;

use racebots_app::{
    ConsoleControl, DiagramRequest, JsonTrackDirectory, ObserverStack, PolicyChoice, Session,
    SessionConfig, SessionError, TrackLibrary,
};
use racebots_core::{
    BuiltinTracks, EndReason, Frame, FrameControl, GenerationOutcome, NullObserver, Segment,
    SimulationError, SpawnPose, TrackDefinition, TrackError, TrackKind, TrackProvider, Vec2,
};

fn small_config(policy: PolicyChoice) -> SessionConfig {
    SessionConfig {
        generations: 3,
        population: 4,
        hidden_layers: 1,
        hidden_width: 4,
        rng_seed: Some(7),
        policy,
        map_pool: vec![
            BuiltinTracks::STRAIGHT.to_string(),
            BuiltinTracks::OVAL.to_string(),
        ],
        ..SessionConfig::default()
    }
}

fn box_track() -> TrackDefinition {
    TrackDefinition {
        name: "box".to_string(),
        walls: vec![
            Segment::from_coords(0.0, 0.0, 400.0, 0.0),
            Segment::from_coords(400.0, 0.0, 400.0, 400.0),
            Segment::from_coords(400.0, 400.0, 0.0, 400.0),
            Segment::from_coords(0.0, 400.0, 0.0, 0.0),
        ],
        gates: vec![Segment::from_coords(200.0, 0.0, 200.0, 400.0)],
        spawn: SpawnPose {
            position: Vec2::new(100.0, 200.0),
            heading: 0.0,
        },
        kind: TrackKind::Closed,
    }
}

#[test]
fn track_directory_loads_saved_tracks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracks = JsonTrackDirectory::new(dir.path());
    let track = racebots_core::Track::from_definition(box_track()).expect("box track");
    let path = tracks.save(&track).expect("save track");
    assert_eq!(path, dir.path().join("box.json"));

    let loaded = tracks.load_track("box").expect("load track");
    assert_eq!(loaded.name(), "box");
    assert_eq!(loaded.gate_count(), 1);
    assert_eq!(loaded.spawn(), track.spawn());
    assert_eq!(tracks.track_names(), vec!["box".to_string()]);
}

#[test]
fn track_directory_reports_each_failure_kind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracks = JsonTrackDirectory::new(dir.path());

    assert!(matches!(
        tracks.load_track("missing"),
        Err(TrackError::UnknownTrack(name)) if name == "missing"
    ));
    assert!(matches!(
        tracks.load_track("../escape"),
        Err(TrackError::UnknownTrack(_))
    ));

    std::fs::write(dir.path().join("garbage.json"), "{ not json").expect("write");
    assert!(matches!(
        tracks.load_track("garbage"),
        Err(TrackError::Parse { .. })
    ));

    let mut no_gates = box_track();
    no_gates.name = "nogates".to_string();
    no_gates.gates.clear();
    std::fs::write(
        dir.path().join("nogates.json"),
        serde_json::to_string(&no_gates).expect("encode"),
    )
    .expect("write");
    assert!(matches!(
        tracks.load_track("nogates"),
        Err(TrackError::Invalid(SimulationError::EmptyGates))
    ));
}

#[test]
fn saving_reports_write_side_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut spaced = box_track();
    spaced.name = "my box".to_string();
    let spaced = racebots_core::Track::from_definition(spaced).expect("track");
    assert!(matches!(
        JsonTrackDirectory::new(dir.path()).save(&spaced),
        Err(TrackError::InvalidName(name)) if name == "my box"
    ));

    let track = racebots_core::Track::from_definition(box_track()).expect("track");
    let missing = JsonTrackDirectory::new(dir.path().join("absent"));
    assert!(matches!(
        missing.save(&track),
        Err(TrackError::Write { path, .. }) if path.ends_with("box.json")
    ));
}

#[test]
fn library_prefers_files_and_falls_back_to_builtins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut custom = box_track();
    custom.name = "oval".to_string();
    std::fs::write(
        dir.path().join("oval.json"),
        serde_json::to_string(&custom).expect("encode"),
    )
    .expect("write");

    let library = TrackLibrary::with_directory(JsonTrackDirectory::new(dir.path()));
    assert_eq!(library.load_track("oval").expect("oval").gate_count(), 1);
    assert_eq!(
        library.load_track("straight").expect("straight").kind(),
        TrackKind::Open
    );
    assert_eq!(
        library.track_names(),
        vec!["oval".to_string(), "straight".to_string()]
    );
    assert!(matches!(
        TrackLibrary::builtin().load_track("nowhere"),
        Err(TrackError::UnknownTrack(_))
    ));
}

#[test]
fn session_config_file_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");
    let config = small_config(PolicyChoice::Rule);
    std::fs::write(&path, serde_json::to_string_pretty(&config).expect("encode")).expect("write");
    assert_eq!(SessionConfig::load(&path).expect("load"), config);
    assert!(matches!(
        SessionConfig::load(&dir.path().join("absent.json")),
        Err(SessionError::Io { .. })
    ));
}

#[test]
fn session_runs_every_generation_across_the_map_pool() {
    let mut config = small_config(PolicyChoice::FeedForward);
    config.simulation.base_timeout_frames = 120;
    config.simulation.timeout_growth_frames = 30;
    let mut session = Session::new(config, &TrackLibrary::builtin()).expect("session");
    assert_eq!(session.track_for(racebots_core::Generation(0)).name(), "straight");
    assert_eq!(session.track_for(racebots_core::Generation(1)).name(), "oval");

    let summary = session
        .run(&mut racebots_core::NoInput, &mut NullObserver)
        .expect("session run")
        .clone();
    assert!(session.is_finished());
    assert!(!summary.aborted);
    assert_eq!(summary.generations.len(), 3);
    for (index, result) in summary.generations.iter().enumerate() {
        assert_eq!(result.generation.0, index as u32);
        assert!(result.frames_elapsed <= 120 + 30 * index as u64);
        assert_eq!(result.fitness.len(), 4);
    }
    let genomes: HashSet<u64> = summary
        .generations
        .iter()
        .flat_map(|result| result.fitness.iter().filter_map(|f| f.genome))
        .collect();
    assert_eq!(genomes.len(), 12);
    assert!(summary.best_score().is_some());
}

#[test]
fn same_seed_gives_same_results() {
    let run = || {
        let mut config = small_config(PolicyChoice::FeedForward);
        config.generations = 2;
        config.simulation.base_timeout_frames = 90;
        let mut session = Session::new(config, &TrackLibrary::builtin()).expect("session");
        session
            .run(&mut racebots_core::NoInput, &mut NullObserver)
            .expect("run")
            .clone()
    };
    assert_eq!(run(), run());
}

#[test]
fn skip_after_and_abort_control_the_session() {
    let mut config = small_config(PolicyChoice::Rule);
    config.infinite_time = true;
    let mut session = Session::new(config, &TrackLibrary::builtin()).expect("session");

    let mut control = ConsoleControl::new().with_skip_after(Some(25));
    let outcome = session
        .run_generation(&mut control, &mut NullObserver)
        .expect("generation");
    let GenerationOutcome::Completed(result) = outcome else {
        panic!("expected a completed generation");
    };
    assert_eq!(result.reason, EndReason::Skipped);
    assert_eq!(result.frames_elapsed, 25);

    control.handle().request_abort();
    let outcome = session
        .run_generation(&mut control, &mut NullObserver)
        .expect("generation");
    assert_eq!(outcome, GenerationOutcome::Aborted { frames: Frame(0) });
    assert!(session.is_finished());
    assert_eq!(session.summary().generations.len(), 1);
    assert!(session.summary().aborted);
}

#[test]
fn closure_inputs_can_skip_mid_session() {
    let mut session =
        Session::new(small_config(PolicyChoice::Rule), &TrackLibrary::builtin()).expect("session");
    let mut input = |frame: Frame| {
        if frame.0 >= 10 {
            FrameControl::Skip
        } else {
            FrameControl::Continue
        }
    };
    let summary = session.run(&mut input, &mut NullObserver).expect("run");
    assert_eq!(summary.generations.len(), 3);
    assert!(summary.generations.iter().all(|r| r.frames_elapsed == 10));
}

#[test]
fn selection_writes_a_diagram_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("net.dot");
    let mut config = small_config(PolicyChoice::FeedForward);
    config.generations = 1;
    config.random_angle = false;
    config.map_pool = vec![BuiltinTracks::STRAIGHT.to_string()];
    let spawn = BuiltinTracks
        .load_track(BuiltinTracks::STRAIGHT)
        .expect("straight")
        .spawn();
    let mut session = Session::new(config, &TrackLibrary::builtin()).expect("session");

    let mut observers = ObserverStack::new();
    observers.push(Box::new(DiagramRequest::new(spawn.position, path.clone())));
    let mut control = ConsoleControl::new().with_skip_after(Some(1));
    session
        .run_generation(&mut control, &mut observers)
        .expect("generation");

    let dot = std::fs::read_to_string(&path).expect("diagram written");
    assert!(dot.starts_with("digraph policy {"));
    assert!(dot.contains("label=\"hidden.1\""));
}

#[test]
fn missing_map_fails_before_any_generation() {
    let mut config = small_config(PolicyChoice::Rule);
    config.map_pool = vec!["atlantis".to_string()];
    assert!(matches!(
        Session::new(config, &TrackLibrary::builtin()),
        Err(SessionError::Track(TrackError::UnknownTrack(_)))
    ));
}
