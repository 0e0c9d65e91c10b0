//! Frame inputs and observers used by the binary.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use racebots_core::{
    Frame, FrameControl, FrameEvents, FrameInput, FrameObserver, Simulation, Vec2,
};
use racebots_policy::write_network_diagram;
use tracing::{debug, info, warn};

/// Skip and quit requests shared between the frame loop and other threads.
#[derive(Debug, Default)]
pub struct ConsoleControl {
    abort: Arc<AtomicBool>,
    skip: Arc<AtomicBool>,
    skip_after: Option<u64>,
}

/// Cloneable handle for raising requests on a [`ConsoleControl`].
#[derive(Debug, Clone)]
pub struct ControlHandle {
    abort: Arc<AtomicBool>,
    skip: Arc<AtomicBool>,
}

impl ControlHandle {
    /// End the current generation and move on to the next one.
    pub fn request_skip(&self) {
        self.skip.store(true, Ordering::Release);
    }

    /// Stop the session without reporting the current generation.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Release);
    }
}

impl ConsoleControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip every generation once it reaches `frames` frames.
    #[must_use]
    pub fn with_skip_after(mut self, frames: Option<u64>) -> Self {
        self.skip_after = frames;
        self
    }

    #[must_use]
    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            abort: Arc::clone(&self.abort),
            skip: Arc::clone(&self.skip),
        }
    }

    /// Read commands from stdin on a background thread: `s` skips the
    /// current generation, `q` quits.
    pub fn listen_stdin(&self) -> JoinHandle<()> {
        let handle = self.handle();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match line.trim() {
                    "s" | "skip" => handle.request_skip(),
                    "q" | "quit" => {
                        handle.request_abort();
                        break;
                    }
                    "" => {}
                    other => warn!(command = other, "Unknown command; use `s` or `q`"),
                }
            }
        })
    }
}

impl FrameInput for ConsoleControl {
    fn poll(&mut self, frame: Frame) -> FrameControl {
        if self.abort.load(Ordering::Acquire) {
            FrameControl::Abort
        } else if self.skip.swap(false, Ordering::AcqRel) {
            FrameControl::Skip
        } else if self.skip_after.is_some_and(|limit| frame.0 >= limit) {
            FrameControl::Skip
        } else {
            FrameControl::Continue
        }
    }
}

/// Sleeps after each frame so the simulation advances at wall-clock speed.
#[derive(Debug)]
pub struct RealtimePacer {
    frame_time: Duration,
    deadline: Option<Instant>,
}

impl RealtimePacer {
    /// Pace frames `timestep` seconds apart.
    #[must_use]
    pub fn new(timestep: f32) -> Self {
        Self {
            frame_time: Duration::from_secs_f32(timestep.max(0.0)),
            deadline: None,
        }
    }
}

impl FrameObserver for RealtimePacer {
    fn on_frame(&mut self, _simulation: &Simulation, events: &FrameEvents) {
        let now = Instant::now();
        let deadline = match self.deadline {
            // Restart the clock at the start of each generation.
            Some(deadline) if events.frame.0 > 1 => deadline + self.frame_time,
            _ => now + self.frame_time,
        };
        if deadline > now {
            thread::sleep(deadline - now);
            self.deadline = Some(deadline);
        } else {
            // Running behind; do not try to catch up.
            self.deadline = Some(now);
        }
    }
}

/// Periodic progress lines at debug level.
#[derive(Debug)]
pub struct ProgressLog {
    every: u64,
}

impl ProgressLog {
    #[must_use]
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl FrameObserver for ProgressLog {
    fn on_frame(&mut self, simulation: &Simulation, events: &FrameEvents) {
        if events.frame.0 % self.every != 0 {
            return;
        }
        debug!(
            generation = simulation.generation().0,
            frame = events.frame.0,
            live = events.live_cars,
            score = events.best_score,
            budget = ?simulation.frame_budget(),
            "Generation progress",
        );
    }
}

/// Writes the network diagram of the car under `point` once it is found.
#[derive(Debug)]
pub struct DiagramRequest {
    point: Vec2,
    path: PathBuf,
    written: bool,
}

impl DiagramRequest {
    #[must_use]
    pub fn new(point: Vec2, path: impl Into<PathBuf>) -> Self {
        Self {
            point,
            path: path.into(),
            written: false,
        }
    }

    #[must_use]
    pub const fn is_written(&self) -> bool {
        self.written
    }
}

impl FrameObserver for DiagramRequest {
    fn on_frame(&mut self, simulation: &Simulation, events: &FrameEvents) {
        if self.written {
            return;
        }
        let Some((car, activations)) = simulation.inspect(self.point) else {
            return;
        };
        self.written = true;
        match write_network_diagram(&self.path, &activations) {
            Ok(()) => info!(
                car = ?car,
                frame = events.frame.0,
                path = %self.path.display(),
                "Wrote network diagram",
            ),
            Err(error) => warn!(
                path = %self.path.display(),
                %error,
                "Failed to write network diagram",
            ),
        }
    }
}

/// Fans each frame out to several observers in order.
#[derive(Default)]
pub struct ObserverStack {
    observers: Vec<Box<dyn FrameObserver>>,
}

impl ObserverStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Box<dyn FrameObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl FrameObserver for ObserverStack {
    fn on_frame(&mut self, simulation: &Simulation, events: &FrameEvents) {
        for observer in &mut self.observers {
            observer.on_frame(simulation, events);
        }
    }
}
