use std::io;
use std::path::{Path, PathBuf};

use racebots_core::{BuiltinTracks, Track, TrackDefinition, TrackError, TrackProvider};
use tracing::debug;

/// Loads `<root>/<name>.json` track definitions.
#[derive(Debug, Clone)]
pub struct JsonTrackDirectory {
    root: PathBuf,
}

impl JsonTrackDirectory {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let plain = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
        plain.then(|| self.root.join(format!("{name}.json")))
    }

    /// Serialize `track` into the directory under its own name.
    pub fn save(&self, track: &Track) -> Result<PathBuf, TrackError> {
        let path = self
            .path_for(track.name())
            .ok_or_else(|| TrackError::InvalidName(track.name().to_string()))?;
        let json = serde_json::to_string_pretty(&track.to_definition()).map_err(|source| {
            TrackError::Encode {
                path: path.clone(),
                source: Box::new(source),
            }
        })?;
        std::fs::write(&path, json).map_err(|source| TrackError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl TrackProvider for JsonTrackDirectory {
    fn load_track(&self, name: &str) -> Result<Track, TrackError> {
        let path = self
            .path_for(name)
            .ok_or_else(|| TrackError::UnknownTrack(name.to_string()))?;
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(TrackError::UnknownTrack(name.to_string()));
            }
            Err(source) => return Err(TrackError::Io { path, source }),
        };
        let definition: TrackDefinition =
            serde_json::from_str(&text).map_err(|source| TrackError::Parse {
                path: path.clone(),
                source: Box::new(source),
            })?;
        let track = Track::from_definition(definition)?;
        debug!(track = track.name(), path = %path.display(), "Loaded track file");
        Ok(track)
    }

    fn track_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

/// Track files first, falling back to the builtin tracks.
#[derive(Debug, Clone, Default)]
pub struct TrackLibrary {
    directory: Option<JsonTrackDirectory>,
}

impl TrackLibrary {
    #[must_use]
    pub fn builtin() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_directory(directory: JsonTrackDirectory) -> Self {
        Self {
            directory: Some(directory),
        }
    }
}

impl TrackProvider for TrackLibrary {
    fn load_track(&self, name: &str) -> Result<Track, TrackError> {
        if let Some(directory) = &self.directory {
            match directory.load_track(name) {
                Err(TrackError::UnknownTrack(_)) => {}
                other => return other,
            }
        }
        BuiltinTracks.load_track(name)
    }

    fn track_names(&self) -> Vec<String> {
        let mut names = self
            .directory
            .as_ref()
            .map(|directory| directory.track_names())
            .unwrap_or_default();
        for name in BuiltinTracks.track_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}
