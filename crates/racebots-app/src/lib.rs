//! Application plumbing for running racebots sessions: configuration files,
//! track directories, the multi-generation session loop, and the frame
//! inputs and observers the binary wires together.

use std::io;
use std::path::PathBuf;

use racebots_core::{SimulationError, TrackError};
use thiserror::Error;

pub mod config;
pub mod driver;
pub mod session;
pub mod tracks;

pub use config::{PolicyChoice, SessionConfig};
pub use driver::{
    ConsoleControl, ControlHandle, DiagramRequest, ObserverStack, ProgressLog, RealtimePacer,
};
pub use session::{Session, SessionSummary};
pub use tracks::{JsonTrackDirectory, TrackLibrary};

/// Failures raised while configuring or running a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse session configuration")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Track(#[from] TrackError),
}
