// ============================================================
// Layer 2 — MonitorUseCase
// ============================================================
// Post-deployment check of a running inference service.
//
// Each cycle picks its mode from the test directory:
//
//   no labelled images → smoke:      POST one synthetic 1×1 PNG,
//                                    expect a known label back,
//                                    log predict_ok = 1
//   labelled images    → evaluation: POST every image, compare the
//                                    returned label with its folder,
//                                    log post_deploy_accuracy
//
// Execution:
//   sleep = 0  → one cycle, its error (if any) is the exit status
//   sleep > 0  → repeat forever (or up to max_cycles); a failed
//                cycle is logged and the loop carries on
//
// HTTP calls are sequential; the client owns the timeout.

use std::{
    fs,
    io::Cursor,
    path::PathBuf,
    thread,
    time::Duration,
};

use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};
use serde::Serialize;

use crate::config;
use crate::data::loader::CorpusLoader;
use crate::domain::{
    corpus::LabeledImage,
    label::ClassLabel,
    prediction::RemotePrediction,
    traits::{ExperimentTracker, PredictClient, TrackerRun},
};
use crate::error::CycleError;
use crate::infra::{
    predict_client::HttpPredictClient,
    tracker::{now_millis, tracker_from_uri, with_run},
};

pub const SMOKE_RUN: &str = "post_deploy_smoke";
pub const EVALUATION_RUN: &str = "post_deploy_monitor";

const SMOKE_FILE_NAME: &str = "smoke.png";

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub api_url:         String,
    pub test_dir:        PathBuf,
    pub sleep_seconds:   u64,
    pub tracking_uri:    String,
    pub experiment_name: String,
    /// Stop the periodic loop after this many cycles.
    pub max_cycles:      Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    Smoke,
    Evaluation,
}

/// What one cycle saw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub mode:          MonitorMode,
    pub total_samples: usize,
    /// Only set in evaluation mode.
    pub accuracy:      Option<f64>,
    /// Unix seconds.
    pub timestamp:     u64,
}

/// Counts from a periodic run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeriodicSummary {
    pub cycles:   usize,
    pub failures: usize,
}

// ─── Monitor ──────────────────────────────────────────────────────────────────
pub struct Monitor<'a> {
    client:   &'a dyn PredictClient,
    tracker:  &'a dyn ExperimentTracker,
    test_dir: PathBuf,
}

impl<'a> Monitor<'a> {
    pub fn new(
        client:   &'a dyn PredictClient,
        tracker:  &'a dyn ExperimentTracker,
        test_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { client, tracker, test_dir: test_dir.into() }
    }

    /// One smoke or evaluation pass, depending on what the test directory holds.
    pub fn run_cycle(&self) -> Result<Observation, CycleError> {
        let corpus = CorpusLoader::new(&self.test_dir)
            .discover()
            .map_err(|e| CycleError::Io(e.to_string()))?;

        let observation = if corpus.is_empty() {
            with_run(self.tracker, SMOKE_RUN, |run| self.smoke(run))?
        } else {
            with_run(self.tracker, EVALUATION_RUN, |run| self.evaluate(run, &corpus.entries))?
        };

        tracing::info!(
            mode          = ?observation.mode,
            total_samples = observation.total_samples,
            accuracy      = ?observation.accuracy,
            timestamp     = observation.timestamp,
            "monitor observation"
        );
        Ok(observation)
    }

    fn smoke(&self, run: &mut dyn TrackerRun) -> Result<Observation, CycleError> {
        tracing::info!("No labelled images in '{}'; running smoke test", self.test_dir.display());
        let reply = self.client.predict(SMOKE_FILE_NAME, synthetic_png()?)?;
        parse_label(&reply)?;

        run.log_metric("predict_ok", 1.0, None)?;
        Ok(Observation {
            mode:          MonitorMode::Smoke,
            total_samples: 1,
            accuracy:      None,
            timestamp:     now_secs(),
        })
    }

    fn evaluate(
        &self,
        run:    &mut dyn TrackerRun,
        images: &[LabeledImage],
    ) -> Result<Observation, CycleError> {
        run.log_param("api_url", self.client.endpoint())?;
        run.log_param("test_dir", &self.test_dir.display().to_string())?;

        let mut correct = 0usize;
        let mut total   = 0usize;
        for item in images {
            let bytes = fs::read(&item.path)?;
            let reply = self.client.predict(&item.file_name(), bytes)?;
            match parse_label(&reply) {
                Ok(label) if label == item.label => correct += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!("{}: {e}; counted as incorrect", item.file_name()),
            }
            total += 1;
        }

        if total == 0 {
            return Err(CycleError::NoImages(self.test_dir.clone()));
        }
        let accuracy = correct as f64 / total as f64;

        run.log_param("num_samples", &total.to_string())?;
        run.log_metric("post_deploy_accuracy", accuracy, None)?;
        tracing::info!("Post-deploy accuracy {:.4} on {} images", accuracy, total);

        Ok(Observation {
            mode:          MonitorMode::Evaluation,
            total_samples: total,
            accuracy:      Some(accuracy),
            timestamp:     now_secs(),
        })
    }

    /// Repeat cycles every `interval`, logging failures instead of stopping.
    pub fn run_periodic(&self, interval: Duration, max_cycles: Option<usize>) -> PeriodicSummary {
        let mut summary = PeriodicSummary::default();
        loop {
            summary.cycles += 1;
            if let Err(e) = self.run_cycle() {
                summary.failures += 1;
                tracing::error!("Monitor cycle {} failed: {}", summary.cycles, e);
            }

            if max_cycles.is_some_and(|max| summary.cycles >= max) {
                return summary;
            }
            thread::sleep(interval);
        }
    }
}

fn parse_label(reply: &RemotePrediction) -> Result<ClassLabel, CycleError> {
    reply
        .label
        .parse::<ClassLabel>()
        .map_err(CycleError::InvalidResponse)
}

fn synthetic_png() -> Result<Vec<u8>, CycleError> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]))
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| CycleError::Io(e.to_string()))?;
    Ok(out.into_inner())
}

fn now_secs() -> u64 {
    now_millis() / 1000
}

// ─── MonitorUseCase ───────────────────────────────────────────────────────────
pub struct MonitorUseCase {
    config: MonitorConfig,
}

impl MonitorUseCase {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg     = &self.config;
        let client  = HttpPredictClient::new(&cfg.api_url, Duration::from_secs(config::HTTP_TIMEOUT_SECS))?;
        let tracker = tracker_from_uri(&cfg.tracking_uri, &cfg.experiment_name)?;
        let monitor = Monitor::new(&client, tracker.as_ref(), &cfg.test_dir);

        if cfg.sleep_seconds == 0 {
            monitor.run_cycle()?;
            return Ok(());
        }

        tracing::info!("Monitoring {} every {}s", cfg.api_url, cfg.sleep_seconds);
        let summary = monitor.run_periodic(Duration::from_secs(cfg.sleep_seconds), cfg.max_cycles);
        tracing::info!("Monitor stopped after {} cycles ({} failed)", summary.cycles, summary.failures);
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::path::Path;

    use super::*;
    use crate::domain::traits::RunStatus;
    use crate::infra::tracker::testing::RecordingTracker;
    use tempfile::TempDir;

    /// Answers with a fixed label, failing on the listed call numbers (1-based).
    struct ScriptedClient {
        label:    &'static str,
        fail_on:  Vec<usize>,
        calls:    Cell<usize>,
        uploaded: RefCell<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(label: &'static str) -> Self {
            Self { label, fail_on: Vec::new(), calls: Cell::new(0), uploaded: RefCell::new(Vec::new()) }
        }
    }

    impl PredictClient for ScriptedClient {
        fn endpoint(&self) -> &str {
            "http://test/predict"
        }

        fn predict(&self, file_name: &str, _bytes: Vec<u8>) -> Result<RemotePrediction, CycleError> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            self.uploaded.borrow_mut().push(file_name.to_string());
            if self.fail_on.contains(&call) {
                return Err(CycleError::Network("connection refused".into()));
            }
            Ok(RemotePrediction { label: self.label.to_string(), confidence: Some(0.9) })
        }
    }

    fn write_images(root: &Path, class: &str, count: usize) {
        let dir = root.join(class);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            fs::write(dir.join(format!("{i}.jpg")), b"bytes").unwrap();
        }
    }

    #[test]
    fn test_evaluation_accuracy() {
        let dir = TempDir::new().unwrap();
        write_images(dir.path(), "Cat", 4);
        write_images(dir.path(), "Dog", 1);

        let client  = ScriptedClient::new("Cat");
        let tracker = RecordingTracker::default();
        let obs     = Monitor::new(&client, &tracker, dir.path()).run_cycle().unwrap();

        assert_eq!(obs.mode, MonitorMode::Evaluation);
        assert_eq!(obs.total_samples, 5);
        assert!((obs.accuracy.unwrap() - 0.8).abs() < 1e-12);

        let run = &tracker.snapshot()[0];
        assert_eq!(run.name, EVALUATION_RUN);
        assert_eq!(run.param("num_samples"), Some("5"));
        assert_eq!(run.param("api_url"), Some("http://test/predict"));
        assert_eq!(run.metric_values("post_deploy_accuracy"), vec![0.8]);
        assert_eq!(run.status, Some(RunStatus::Finished));
    }

    #[test]
    fn test_smoke_mode_when_directory_missing() {
        let dir     = TempDir::new().unwrap();
        let client  = ScriptedClient::new("dog");
        let tracker = RecordingTracker::default();
        let obs     = Monitor::new(&client, &tracker, dir.path().join("absent")).run_cycle().unwrap();

        assert_eq!(obs.mode, MonitorMode::Smoke);
        assert_eq!(obs.accuracy, None);
        assert_eq!(*client.uploaded.borrow(), vec![SMOKE_FILE_NAME.to_string()]);

        let run = &tracker.snapshot()[0];
        assert_eq!(run.name, SMOKE_RUN);
        assert_eq!(run.metric_values("predict_ok"), vec![1.0]);
    }

    #[test]
    fn test_unknown_label_counts_as_incorrect() {
        let dir = TempDir::new().unwrap();
        write_images(dir.path(), "Cat", 2);

        let client  = ScriptedClient::new("Hamster");
        let tracker = RecordingTracker::default();
        let obs     = Monitor::new(&client, &tracker, dir.path()).run_cycle().unwrap();

        assert_eq!(obs.total_samples, 2);
        assert_eq!(obs.accuracy, Some(0.0));
        let run = &tracker.snapshot()[0];
        assert_eq!(run.metric_values("post_deploy_accuracy"), vec![0.0]);
        assert_eq!(run.status, Some(RunStatus::Finished));
    }

    #[test]
    fn test_smoke_unknown_label_is_invalid_response() {
        let dir     = TempDir::new().unwrap();
        let client  = ScriptedClient::new("Hamster");
        let tracker = RecordingTracker::default();
        let err     = Monitor::new(&client, &tracker, dir.path()).run_cycle().unwrap_err();

        assert!(matches!(err, CycleError::InvalidResponse(_)));
        assert_eq!(tracker.snapshot()[0].status, Some(RunStatus::Failed));
    }

    #[test]
    fn test_periodic_survives_a_failed_cycle() {
        let dir     = TempDir::new().unwrap();
        let client  = ScriptedClient { fail_on: vec![2], ..ScriptedClient::new("Cat") };
        let tracker = RecordingTracker::default();
        let summary = Monitor::new(&client, &tracker, dir.path())
            .run_periodic(Duration::ZERO, Some(3));

        assert_eq!(summary, PeriodicSummary { cycles: 3, failures: 1 });
        let statuses: Vec<Option<RunStatus>> = tracker.snapshot().iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![Some(RunStatus::Finished), Some(RunStatus::Failed), Some(RunStatus::Finished)]
        );
    }

    #[test]
    fn test_synthetic_png_decodes() {
        let bytes = synthetic_png().unwrap();
        let img   = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
    }
}
