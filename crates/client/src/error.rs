use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EstablishError>;

/// Failure modes of session establishment.
///
/// All of these are handled inside the pipeline: each one is logged as a
/// warning and collapsed into [`WatchSession::Unavailable`](crate::WatchSession::Unavailable),
/// so callers branch on the session outcome rather than on a cause.
#[derive(Error, Debug)]
pub enum EstablishError {
    #[error("daemon launch failed: {0}")]
    Launch(String),

    #[error("could not connect to daemon socket {}", .0.display())]
    Connect(PathBuf),

    #[error("undecodable reply during {stage}: {detail}")]
    Decode { stage: &'static str, detail: String },

    #[error("daemon does not support a required capability: {0}")]
    CapabilityUnsupported(String),

    #[error("daemon {version} is too old to report capabilities")]
    LegacyDaemon { version: String },

    #[error("watch registration failed for {}: {detail}", .root.display())]
    Registration { root: PathBuf, detail: String },

    #[error("time budget exhausted during {0}")]
    DeadlineExceeded(&'static str),
}

impl EstablishError {
    pub(crate) fn decode(stage: &'static str, detail: impl ToString) -> Self {
        EstablishError::Decode {
            stage,
            detail: detail.to_string(),
        }
    }
}
