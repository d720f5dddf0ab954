// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the core logic and its collaborators:
//
//   ImageClassifier   → the scoring model behind /predict
//                       (Inferencer in production, a fake in tests)
//   ExperimentTracker → the write-only experiment sink
//                       (MLflow server or a local directory)
//   PredictClient     → how the monitor reaches the service
//                       (HTTP in production, a fake in tests)
//
// Programming against these traits keeps the HTTP handlers,
// the training loop and the monitor testable without a GPU,
// a tracking server or a running service.

use std::path::Path;

use anyhow::Result;

use crate::domain::image_tensor::ImageTensor;
use crate::domain::prediction::{Prediction, RemotePrediction};
use crate::error::CycleError;

// ─── ImageClassifier ──────────────────────────────────────────────────────────
/// Anything that turns one preprocessed image into a prediction.
///
/// Implementations are shared read-only across concurrent
/// requests, hence `Send + Sync` and `&self`.
pub trait ImageClassifier: Send + Sync {
    /// Side length the classifier expects its input tensors to have.
    fn image_size(&self) -> u32;

    fn classify(&self, image: &ImageTensor) -> Result<Prediction>;
}

// ─── ExperimentTracker ────────────────────────────────────────────────────────
/// Final state reported when a run is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Finished => "FINISHED",
            Self::Failed   => "FAILED",
        }
    }
}

/// Write-only experiment tracking backend.
pub trait ExperimentTracker {
    /// Open a new run. The caller must close it with [`TrackerRun::finish`].
    fn start_run(&self, name: &str) -> Result<Box<dyn TrackerRun>>;
}

/// One open run on an [`ExperimentTracker`].
pub trait TrackerRun {
    fn log_param(&mut self, key: &str, value: &str) -> Result<()>;

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<()>;

    /// Attach a file (or every file under a directory) to the run
    /// under `destination`.
    fn log_artifact(&mut self, path: &Path, destination: &str) -> Result<()>;

    fn finish(self: Box<Self>, status: RunStatus) -> Result<()>;
}

// ─── PredictClient ────────────────────────────────────────────────────────────
/// The monitor's view of the inference service.
pub trait PredictClient {
    /// Where requests go, for logging and tracker params.
    fn endpoint(&self) -> &str;

    /// Upload one image and return the service's answer.
    fn predict(
        &self,
        file_name: &str,
        bytes:     Vec<u8>,
    ) -> std::result::Result<RemotePrediction, CycleError>;
}
