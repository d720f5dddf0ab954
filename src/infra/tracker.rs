// ============================================================
// Layer 6 — Experiment Tracking
// ============================================================
// Chooses an ExperimentTracker from a tracking URI and provides
// the local directory store.
//
//   http://… / https://…  → MlflowTracker (REST, see mlflow.rs)
//   file://<dir> or <dir> → LocalTracker
//
// LocalTracker layout, one directory per run:
//
//   <root>/<experiment>/<run_id>/
//     meta.json          name, status, start/end time (ms)
//     params/<key>       one value per file
//     metrics/<key>      "<timestamp_ms> <value> <step>" per line
//     artifacts/<dest>/  copied files
//
// with_run() opens a run, hands it to a closure and always closes
// it: FINISHED when the closure succeeds, FAILED otherwise.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::domain::traits::{ExperimentTracker, RunStatus, TrackerRun};
use crate::infra::mlflow::MlflowTracker;

/// Build the tracker named by `uri` for `experiment`.
pub fn tracker_from_uri(uri: &str, experiment: &str) -> Result<Box<dyn ExperimentTracker>> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        tracing::info!("Tracking to MLflow server at {}", uri);
        Ok(Box::new(MlflowTracker::new(uri, experiment)?))
    } else {
        let root = uri.strip_prefix("file://").unwrap_or(uri);
        tracing::info!("Tracking to local store '{}'", root);
        Ok(Box::new(LocalTracker::new(root, experiment)))
    }
}

/// Run `body` inside a fresh run named `name`, closing it with the
/// status that matches the outcome.
pub fn with_run<T, E>(
    tracker: &dyn ExperimentTracker,
    name:    &str,
    body:    impl FnOnce(&mut dyn TrackerRun) -> std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    E: From<anyhow::Error>,
{
    let mut run = tracker.start_run(name)?;
    match body(run.as_mut()) {
        Ok(value) => {
            run.finish(RunStatus::Finished)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(finish_err) = run.finish(RunStatus::Failed) {
                tracing::warn!("Could not mark run '{}' as failed: {:#}", name, finish_err);
            }
            Err(err)
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─── LocalTracker ─────────────────────────────────────────────────────────────
pub struct LocalTracker {
    experiment_dir: PathBuf,
}

impl LocalTracker {
    pub fn new(root: impl AsRef<Path>, experiment: &str) -> Self {
        Self { experiment_dir: root.as_ref().join(experiment) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id:     String,
    pub run_name:   String,
    pub status:     String,
    pub start_time: u64,
    pub end_time:   Option<u64>,
}

impl ExperimentTracker for LocalTracker {
    fn start_run(&self, name: &str) -> Result<Box<dyn TrackerRun>> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let dir    = self.experiment_dir.join(&run_id);
        for sub in ["params", "metrics", "artifacts"] {
            fs::create_dir_all(dir.join(sub))
                .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;
        }

        let meta = RunMeta {
            run_id:     run_id.clone(),
            run_name:   name.to_string(),
            status:     "RUNNING".to_string(),
            start_time: now_millis(),
            end_time:   None,
        };
        let run = LocalRun { dir, meta };
        run.write_meta()?;

        tracing::info!("Started run '{}' ({})", name, run_id);
        Ok(Box::new(run))
    }
}

struct LocalRun {
    dir:  PathBuf,
    meta: RunMeta,
}

impl LocalRun {
    fn write_meta(&self) -> Result<()> {
        let path = self.dir.join("meta.json");
        fs::write(&path, serde_json::to_string_pretty(&self.meta)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }
}

impl TrackerRun for LocalRun {
    fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.dir.join("params").join(key);
        fs::write(&path, value).with_context(|| format!("Cannot write param '{key}'"))
    }

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<()> {
        let path = self.dir.join("metrics").join(key);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open metric '{key}'"))?;
        writeln!(f, "{} {} {}", now_millis(), value, step.unwrap_or(0))?;
        Ok(())
    }

    fn log_artifact(&mut self, path: &Path, destination: &str) -> Result<()> {
        let dest_root = self.dir.join("artifacts").join(destination);

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Cannot read artifact '{}'", path.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            // A single file lands directly under the destination.
            let relative = match entry.path().strip_prefix(path) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
                _ => PathBuf::from(entry.file_name()),
            };
            let target = dest_root.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Cannot copy artifact '{}'", entry.path().display())
            })?;
        }
        tracing::debug!("Logged artifact '{}' under '{}'", path.display(), destination);
        Ok(())
    }

    fn finish(mut self: Box<Self>, status: RunStatus) -> Result<()> {
        self.meta.status   = status.as_str().to_string();
        self.meta.end_time = Some(now_millis());
        self.write_meta()?;
        tracing::info!("Run '{}' ended: {}", self.meta.run_name, status.as_str());
        Ok(())
    }
}

// ─── Test double ──────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, Default)]
    pub struct RecordedRun {
        pub name:      String,
        pub params:    Vec<(String, String)>,
        pub metrics:   Vec<(String, f64, Option<u64>)>,
        pub artifacts: Vec<(PathBuf, String)>,
        pub status:    Option<RunStatus>,
    }

    impl RecordedRun {
        pub fn metric_values(&self, key: &str) -> Vec<f64> {
            self.metrics.iter().filter(|(k, _, _)| k == key).map(|(_, v, _)| *v).collect()
        }

        pub fn param(&self, key: &str) -> Option<&str> {
            self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
        }
    }

    /// Keeps every run in memory so tests can inspect what was logged.
    #[derive(Clone, Default)]
    pub struct RecordingTracker {
        pub runs: Arc<Mutex<Vec<RecordedRun>>>,
    }

    impl RecordingTracker {
        pub fn snapshot(&self) -> Vec<RecordedRun> {
            self.runs.lock().unwrap().clone()
        }
    }

    impl ExperimentTracker for RecordingTracker {
        fn start_run(&self, name: &str) -> Result<Box<dyn TrackerRun>> {
            let mut runs = self.runs.lock().unwrap();
            runs.push(RecordedRun { name: name.to_string(), ..Default::default() });
            Ok(Box::new(RecordingRun { runs: Arc::clone(&self.runs), index: runs.len() - 1 }))
        }
    }

    struct RecordingRun {
        runs:  Arc<Mutex<Vec<RecordedRun>>>,
        index: usize,
    }

    impl RecordingRun {
        fn with<R>(&self, f: impl FnOnce(&mut RecordedRun) -> R) -> R {
            f(&mut self.runs.lock().unwrap()[self.index])
        }
    }

    impl TrackerRun for RecordingRun {
        fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
            self.with(|r| r.params.push((key.into(), value.into())));
            Ok(())
        }

        fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<()> {
            self.with(|r| r.metrics.push((key.into(), value, step)));
            Ok(())
        }

        fn log_artifact(&mut self, path: &Path, destination: &str) -> Result<()> {
            self.with(|r| r.artifacts.push((path.to_path_buf(), destination.into())));
            Ok(())
        }

        fn finish(self: Box<Self>, status: RunStatus) -> Result<()> {
            self.with(|r| r.status = Some(status));
            Ok(())
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::testing::RecordingTracker;
    use super::*;
    use tempfile::TempDir;

    fn only_run_dir(tracker_root: &Path) -> PathBuf {
        let exp = tracker_root.join("exp");
        let mut dirs: Vec<PathBuf> = fs::read_dir(&exp).unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(dirs.len(), 1);
        dirs.remove(0)
    }

    #[test]
    fn test_local_run_layout() {
        let root    = TempDir::new().unwrap();
        let tracker = LocalTracker::new(root.path(), "exp");

        let artifact = root.path().join("split.json");
        fs::write(&artifact, "{}").unwrap();

        let mut run = tracker.start_run("training").unwrap();
        run.log_param("epochs", "2").unwrap();
        run.log_metric("val_loss", 1.5, Some(1)).unwrap();
        run.log_metric("val_loss", 1.25, Some(2)).unwrap();
        run.log_artifact(&artifact, "artifacts").unwrap();
        run.finish(RunStatus::Finished).unwrap();

        let dir = only_run_dir(root.path());
        assert_eq!(fs::read_to_string(dir.join("params/epochs")).unwrap(), "2");

        let metric = fs::read_to_string(dir.join("metrics/val_loss")).unwrap();
        let lines: Vec<&str> = metric.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(" 1.25 2"));

        assert!(dir.join("artifacts/artifacts/split.json").is_file());

        let meta: RunMeta = serde_json::from_str(&fs::read_to_string(dir.join("meta.json")).unwrap()).unwrap();
        assert_eq!(meta.run_name, "training");
        assert_eq!(meta.status, "FINISHED");
        assert!(meta.end_time.is_some());
    }

    #[test]
    fn test_directory_artifact_keeps_structure() {
        let root = TempDir::new().unwrap();
        let src  = root.path().join("model");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("model.bin"), [1u8, 2, 3]).unwrap();
        fs::write(src.join("model.bin.config.json"), "{}").unwrap();

        let tracker = LocalTracker::new(root.path().join("store"), "exp");
        let mut run = tracker.start_run("r").unwrap();
        run.log_artifact(&src, "model").unwrap();
        run.finish(RunStatus::Finished).unwrap();

        let dir = only_run_dir(&root.path().join("store"));
        assert!(dir.join("artifacts/model/model.bin").is_file());
        assert!(dir.join("artifacts/model/model.bin.config.json").is_file());
    }

    #[test]
    fn test_with_run_marks_failure() {
        let tracker = RecordingTracker::default();
        let result: Result<()> = with_run(&tracker, "boom", |run| {
            run.log_metric("x", 1.0, None)?;
            anyhow::bail!("exploded")
        });
        assert!(result.is_err());

        let runs = tracker.snapshot();
        assert_eq!(runs[0].status, Some(RunStatus::Failed));
        assert_eq!(runs[0].metric_values("x"), vec![1.0]);
    }

    #[test]
    fn test_with_run_marks_success() {
        let tracker = RecordingTracker::default();
        let value: Result<u32> = with_run(&tracker, "ok", |_| Ok(7));
        assert_eq!(value.unwrap(), 7);
        assert_eq!(tracker.snapshot()[0].status, Some(RunStatus::Finished));
    }

    #[test]
    fn test_file_uri_selects_local_store() {
        let root    = TempDir::new().unwrap();
        let uri     = format!("file://{}", root.path().display());
        let tracker = tracker_from_uri(&uri, "exp").unwrap();
        tracker.start_run("r").unwrap().finish(RunStatus::Finished).unwrap();
        assert!(root.path().join("exp").is_dir());
    }
}
