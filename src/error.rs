use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe failed for {}: {message}", path.display())]
    Probe { path: PathBuf, message: String },

    #[error("duration undefined for {}", path.display())]
    DurationUndefined { path: PathBuf },

    #[error("stage '{stage}' failed: {message}")]
    FilterGraph { stage: String, message: String },

    #[error("stage '{stage}' reported success but wrote no file at {}", path.display())]
    MissingOutput { stage: String, path: PathBuf },

    #[error("stage '{stage}' timed out after {}s", after.as_secs_f64())]
    Timeout { stage: String, after: Duration },

    #[error("song volume {0} is outside [0, 1]")]
    InvalidVolume(f64),

    #[error("no songs found in {}", .0.display())]
    NoSongs(PathBuf),

    #[error("no mp3 clips found in {}", .0.display())]
    NoClips(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn stage(&self) -> Option<&str> {
        match self {
            MediaError::FilterGraph { stage, .. }
            | MediaError::MissingOutput { stage, .. }
            | MediaError::Timeout { stage, .. } => Some(stage),
            _ => None,
        }
    }
}
