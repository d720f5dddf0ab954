// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Discover labelled images      (Layer 4 - data)
//   Step 2: Seeded train/val/test split   (Layer 4 - data)
//   Step 3: Open the tracker run          (Layer 6 - infra)
//   Step 4: Log params + split artifact   (Layer 6 - infra)
//   Step 5: Decode + resize each split    (Layer 4 - data)
//   Step 6: Build Burn datasets           (Layer 4 - data)
//   Step 7: Run training loop             (Layer 5 - ml)
//   Step 8: Write reports                 (Layer 6 - infra)
//   Step 9: Publish checkpoint            (Layer 6 - infra)
//
// Any failure after Step 3 closes the run as FAILED. The
// checkpoint is only written once training and evaluation have
// both succeeded.
//
// Reference: Burn Book §5 (Training)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::data::{
    dataset::ImageDataset,
    loader::{decode_all, CorpusLoader, LoadedImage},
    preprocessor::{Augmentation, Preprocessor},
    splitter::{partition, Split},
};
use crate::domain::{
    corpus::Corpus,
    traits::{ExperimentTracker, TrackerRun},
};
use crate::error::Error;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tracker::{tracker_from_uri, with_run},
};
use crate::ml::{
    backend::backend_name,
    evaluation::EvalReport,
    model::SimpleCnnConfig,
    trainer::{run_training, TrainingData, TrainingPhase},
};

pub const TRAINING_RUN: &str = "training";
pub const MODEL_NAME: &str = "SimpleCnn";

const SPLIT_FILE: &str = "split.json";
const CONFUSION_FILE: &str = "confusion_matrix.json";
const CONFIG_FILE: &str = "train_config.json";

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a training run depends on. Saved as a run artifact
// so a run can be reproduced from the tracker alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:        PathBuf,
    pub model_path:      PathBuf,
    pub reports_dir:     PathBuf,
    pub tracking_uri:    String,
    pub experiment_name: String,
    pub seed:            u64,
    /// `None` trains on the whole corpus.
    pub max_samples:     Option<usize>,
    pub epochs:          usize,
    pub batch_size:      usize,
    pub learning_rate:   f64,
    pub image_size:      u32,
    pub num_workers:     usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:        PathBuf::from(config::DATA_DIR),
            model_path:      PathBuf::from(config::MODEL_PATH),
            reports_dir:     PathBuf::from(config::REPORTS_DIR),
            tracking_uri:    config::TRACKING_URI.to_string(),
            experiment_name: config::EXPERIMENT_NAME.to_string(),
            seed:            config::SEED,
            max_samples:     Some(config::MAX_SAMPLES),
            epochs:          config::EPOCHS,
            batch_size:      config::BATCH_SIZE,
            learning_rate:   config::LEARNING_RATE,
            image_size:      config::IMAGE_SIZE,
            num_workers:     config::NUM_WORKERS,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> SimpleCnnConfig {
        SimpleCnnConfig::new().with_image_size(self.image_size as usize)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.epochs == 0 {
            return Err(Error::invalid_config("epochs must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid_config("batch size must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::invalid_config(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        self.model_config().validate()
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub model_path: PathBuf,
    pub test:       EvalReport,
    pub epochs:     usize,
}

/// The split as written to `split.json`: indices plus the files they name.
#[derive(Debug, Serialize)]
struct SplitReport<'a> {
    seed:    u64,
    indices: &'a Split,
    train:   Vec<PathBuf>,
    val:     Vec<PathBuf>,
    test:    Vec<PathBuf>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full pipeline against the tracker named by the config.
    pub fn execute(&self) -> Result<TrainSummary> {
        self.config.validate()?;
        let tracker = tracker_from_uri(&self.config.tracking_uri, &self.config.experiment_name)?;
        self.execute_with(tracker.as_ref())
    }

    pub fn execute_with(&self, tracker: &dyn ExperimentTracker) -> Result<TrainSummary> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Discover labelled images ─────────────────────────────────
        let corpus = CorpusLoader::new(&cfg.data_dir).discover()?;
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus(corpus.root.clone()).into());
        }
        let [cats, dogs] = corpus.class_counts();
        tracing::info!("Corpus: {} images ({} Cat, {} Dog)", corpus.len(), cats, dogs);

        // ── Step 2: Seeded split ─────────────────────────────────────────────
        let split = partition(corpus.len(), cfg.seed, cfg.max_samples)?;
        tracing::info!(
            "Split: {} train, {} val, {} test",
            split.train.len(),
            split.val.len(),
            split.test.len()
        );

        // ── Steps 3-9 inside one tracker run ─────────────────────────────────
        with_run(tracker, TRAINING_RUN, |run| self.train_in_run(run, &corpus, &split))
    }

    fn train_in_run(
        &self,
        run:    &mut dyn TrackerRun,
        corpus: &Corpus,
        split:  &Split,
    ) -> Result<TrainSummary> {
        let cfg = &self.config;
        fs::create_dir_all(&cfg.reports_dir)
            .with_context(|| format!("Cannot create '{}'", cfg.reports_dir.display()))?;

        // ── Step 4: Params + split artifact ──────────────────────────────────
        let max_samples = cfg.max_samples.map_or_else(|| "all".to_string(), |m| m.to_string());
        let params: [(&str, String); 11] = [
            ("epochs",        cfg.epochs.to_string()),
            ("learning_rate", cfg.learning_rate.to_string()),
            ("batch_size",    cfg.batch_size.to_string()),
            ("image_size",    cfg.image_size.to_string()),
            ("model",         MODEL_NAME.to_string()),
            ("seed",          cfg.seed.to_string()),
            ("max_samples",   max_samples),
            ("train_size",    split.train.len().to_string()),
            ("val_size",      split.val.len().to_string()),
            ("test_size",     split.test.len().to_string()),
            ("backend",       backend_name().to_string()),
        ];
        for (key, value) in &params {
            run.log_param(key, value)?;
        }

        let paths = |idx: &[usize]| -> Vec<PathBuf> {
            corpus.select(idx).into_iter().map(|item| item.path).collect()
        };
        let split_report = SplitReport {
            seed:    cfg.seed,
            indices: split,
            train:   paths(&split.train),
            val:     paths(&split.val),
            test:    paths(&split.test),
        };
        let split_path = write_json(&cfg.reports_dir, SPLIT_FILE, &split_report)?;
        run.log_artifact(&split_path, "reports")?;
        let config_path = write_json(&cfg.reports_dir, CONFIG_FILE, cfg)?;
        run.log_artifact(&config_path, "reports")?;

        // ── Step 5: Decode + resize ──────────────────────────────────────────
        let preprocessor = Preprocessor::new(cfg.image_size);
        let decode = |name: &str, idx: &[usize]| -> Result<Vec<LoadedImage>> {
            let images = decode_all(&corpus.select(idx), &preprocessor, cfg.num_workers)?;
            if images.is_empty() {
                bail!("no decodable images left in the {name} split");
            }
            Ok(images)
        };
        let train_images = decode("train", &split.train)?;
        let val_images   = decode("validation", &split.val)?;
        let test_images  = decode("test", &split.test)?;

        // ── Step 6: Burn datasets ────────────────────────────────────────────
        let data = TrainingData {
            train: ImageDataset::new(
                train_images,
                preprocessor,
                Augmentation::RandomHorizontalFlip { seed: cfg.seed },
            ),
            val:  ImageDataset::new(val_images, preprocessor, Augmentation::None),
            test: ImageDataset::new(test_images, preprocessor, Augmentation::None),
        };

        // ── Step 7: Training loop ────────────────────────────────────────────
        let metrics = MetricsLogger::new(&cfg.reports_dir)?;
        let trained = run_training(cfg, data, run, &metrics)?;

        // ── Step 8: Reports ──────────────────────────────────────────────────
        let confusion_path = write_json(&cfg.reports_dir, CONFUSION_FILE, &trained.test.confusion)?;
        run.log_artifact(&confusion_path, "reports")?;
        run.log_artifact(metrics.csv_path(), "reports")?;

        // ── Step 9: Publish checkpoint ───────────────────────────────────────
        TrainingPhase::Persisting.enter();
        let ckpt = CheckpointManager::new(&cfg.model_path);
        ckpt.save(&trained.model, &trained.model_config)?;
        run.log_artifact(ckpt.path(), "artifacts")?;
        run.log_artifact(ckpt.path(), "model")?;
        run.log_artifact(&ckpt.config_path(), "model")?;

        TrainingPhase::Completed.enter();
        Ok(TrainSummary {
            model_path: cfg.model_path.clone(),
            test:       trained.test,
            epochs:     trained.history.len(),
        })
    }
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    Ok(path)
}
