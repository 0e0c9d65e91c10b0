use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use racebots_app::{
    ConsoleControl, DiagramRequest, JsonTrackDirectory, ObserverStack, PolicyChoice, ProgressLog,
    RealtimePacer, Session, SessionConfig, TrackLibrary,
};
use racebots_core::{GenerationOutcome, TrackProvider, Vec2};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "racebots",
    version,
    about = "Evaluate populations of driving policies on racing tracks"
)]
struct Cli {
    /// JSON session configuration; missing fields take their defaults.
    #[arg(short, long, env = "RACEBOTS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of `<name>.json` track files, searched before the builtin tracks.
    #[arg(long, env = "RACEBOTS_TRACKS")]
    tracks: Option<PathBuf>,

    /// Track names to cycle through, overriding the configured map pool.
    #[arg(long = "map")]
    maps: Vec<String>,

    #[arg(long)]
    generations: Option<u32>,

    /// Cars per generation (2..=200).
    #[arg(long)]
    population: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Pace frames at wall-clock speed and read `s`/`q` commands from stdin.
    #[arg(long)]
    realtime: bool,

    /// Ignore the per-generation frame budget.
    #[arg(long)]
    infinite_time: bool,

    /// Skip each generation after this many frames.
    #[arg(long)]
    skip_after: Option<u64>,

    /// Write the network diagram of the car found at X Y.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    select: Option<Vec<f32>>,

    /// Output path for the `--select` diagram (Graphviz DOT).
    #[arg(long, default_value = "policy.dot")]
    diagram: PathBuf,

    /// Write every generation result as JSON.
    #[arg(long)]
    results: Option<PathBuf>,

    /// List loadable tracks and exit.
    #[arg(long)]
    list_tracks: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Feedforward,
    Rule,
}

impl From<PolicyArg> for PolicyChoice {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Feedforward => Self::FeedForward,
            PolicyArg::Rule => Self::Rule,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let library = match &cli.tracks {
        Some(dir) => TrackLibrary::with_directory(JsonTrackDirectory::new(dir)),
        None => TrackLibrary::builtin(),
    };
    if cli.list_tracks {
        for name in library.track_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let config = session_config(&cli)?;
    let mut session = Session::new(config, &library).context("failed to start session")?;

    let mut control = ConsoleControl::new().with_skip_after(cli.skip_after);
    let mut observers = ObserverStack::new();
    observers.push(Box::new(ProgressLog::new(60)));
    if cli.realtime {
        observers.push(Box::new(RealtimePacer::new(
            session.config().simulation.timestep,
        )));
        // Detached: the listener blocks on stdin until the process exits.
        let _listener = control.listen_stdin();
        info!("Realtime mode: type `s` to skip a generation, `q` to quit");
    }
    if let Some(point) = &cli.select {
        let [x, y] = point.as_slice() else {
            bail!("--select expects exactly two coordinates");
        };
        observers.push(Box::new(DiagramRequest::new(
            Vec2::new(*x, *y),
            cli.diagram.clone(),
        )));
    }

    while !session.is_finished() {
        let generation = session.next_generation();
        match session
            .run_generation(&mut control, &mut observers)
            .with_context(|| format!("generation {} failed", generation.0))?
        {
            GenerationOutcome::Completed(result) => println!(
                "generation {:>4}  score {:>10.2}  frames {:>6}  survivors {:>3}  {}",
                result.generation.0,
                result.final_score,
                result.frames_elapsed,
                result.surviving_count,
                result.reason,
            ),
            GenerationOutcome::Aborted { frames } => {
                warn!(generation = generation.0, frames = frames.0, "Session aborted");
            }
        }
    }

    let summary = session.summary();
    if let Some(path) = &cli.results {
        let json = serde_json::to_string_pretty(summary).context("failed to encode results")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        info!(path = %path.display(), "Wrote generation results");
    }
    if let Some(best) = summary.best_score() {
        println!("best score {best:.2} over {} generations", summary.generations.len());
    }
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn session_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if !cli.maps.is_empty() {
        config.map_pool = cli.maps.clone();
    }
    if let Some(generations) = cli.generations {
        config.generations = generations;
    }
    if let Some(population) = cli.population {
        config.population = population;
    }
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    if let Some(policy) = cli.policy {
        config.policy = policy.into();
    }
    config.infinite_time |= cli.infinite_time;
    config.validate().context("invalid session configuration")?;
    Ok(config)
}
