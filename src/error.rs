// ============================================================
// Cross-cutting — Typed Errors
// ============================================================
// The library layers (data, ml, infra) report failures through
// this enum so callers can tell a client mistake (bad image)
// from a fatal startup problem (missing checkpoint).
//
// The application and CLI layers wrap these in anyhow with
// extra context, the same way the rest of the binary does.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Every failure kind the core pipeline can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Input bytes are not a decodable image, or it has no pixels.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The corpus directory contained no usable images.
    #[error("no labelled images found under '{}'", .0.display())]
    EmptyCorpus(PathBuf),

    /// Too few samples to give every split at least one element.
    #[error("need at least {required} samples to split, found {found}")]
    InsufficientSamples {
        /// Samples available after subsampling.
        found: usize,
        /// Smallest accepted sample count.
        required: usize,
    },

    /// The checkpoint could not be turned into a servable model.
    #[error("cannot load model from '{}': {reason}", path.display())]
    ModelLoad {
        /// Checkpoint path that was attempted.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The trained model could not be published.
    #[error("cannot write checkpoint '{}': {reason}", path.display())]
    CheckpointWrite {
        /// Destination path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Experiment tracker rejected a write.
    #[error("tracker error: {0}")]
    Tracker(String),

    /// Filesystem error outside checkpoint publishing.
    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage(reason.into())
    }

    pub fn model_load(path: &Path, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn checkpoint_write(path: &Path, reason: impl Into<String>) -> Self {
        Self::CheckpointWrite {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    pub fn tracker(reason: impl Into<String>) -> Self {
        Self::Tracker(reason.into())
    }

    /// True for errors caused by the caller's input rather than the system.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidImage(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("serialization: {err}"))
    }
}

/// Result alias for the core pipeline.
pub type Result<T> = std::result::Result<T, Error>;

// ─── Monitor Cycle Errors ─────────────────────────────────────────────────────
/// Why a single monitor cycle failed.
///
/// In periodic mode these are logged and the loop moves on;
/// in one-shot mode they end the process.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Connection refused, DNS failure, non-2xx status, ...
    #[error("network error: {0}")]
    Network(String),

    /// The service did not answer within the client timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The service answered with a body that breaks the contract.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Logging the observation failed.
    #[error("tracker error: {0}")]
    Tracker(String),

    /// Reading a labelled image from disk failed.
    #[error("IO error: {0}")]
    Io(String),

    /// Evaluation mode ended without scoring a single image.
    #[error("no labelled images could be evaluated under '{}'", .0.display())]
    NoImages(PathBuf),
}

impl From<std::io::Error> for CycleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Inside a cycle, the only anyhow-returning collaborator is the tracker.
impl From<anyhow::Error> for CycleError {
    fn from(err: anyhow::Error) -> Self {
        Self::Tracker(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_samples_message_names_both_counts() {
        let err = Error::InsufficientSamples { found: 3, required: 10 };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains("10"));
    }

    #[test]
    fn model_load_message_contains_path() {
        let err = Error::model_load(Path::new("models/model.bin"), "missing");
        assert!(err.to_string().contains("models/model.bin"));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn only_invalid_image_is_a_client_error() {
        assert!(Error::invalid_image("bad").is_client_error());
        assert!(!Error::EmptyCorpus(PathBuf::from("x")).is_client_error());
        assert!(!Error::tracker("down").is_client_error());
    }

    #[test]
    fn cycle_error_messages() {
        assert!(CycleError::Timeout("30s".into()).to_string().contains("timed out"));
        assert!(CycleError::Network("refused".into()).to_string().contains("refused"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(Error::from(io), Error::Io(_)));
    }
}
