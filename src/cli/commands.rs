// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `serve`, `monitor`.
//
// Every flag falls back to an environment variable, then to the
// default in config.rs, so the binary can be driven entirely
// from the environment in a container.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    monitor_use_case::MonitorConfig,
    serve_use_case::ServeConfig,
    train_use_case::TrainConfig,
};
use crate::config;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the classifier and publish a checkpoint
    Train(TrainArgs),

    /// Serve /predict, /health and /metrics from a checkpoint
    Serve(ServeArgs),

    /// Check a deployed service (smoke test or labelled evaluation)
    Monitor(MonitorArgs),
}

/// Tracking options shared by `train` and `monitor`.
#[derive(Args, Debug, Clone)]
pub struct TrackingArgs {
    /// MLflow server URL, or a directory for the local store
    #[arg(long, env = "MLFLOW_TRACKING_URI", default_value = config::TRACKING_URI)]
    pub tracking_uri: String,

    /// Experiment that runs are grouped under
    #[arg(long, env = "MLFLOW_EXPERIMENT_NAME", default_value = config::EXPERIMENT_NAME)]
    pub experiment_name: String,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Root with one sub-folder per class (Cat/, Dog/)
    #[arg(long, env = "DATA_DIR", default_value = config::DATA_DIR)]
    pub data_dir: PathBuf,

    /// Where the trained checkpoint is published
    #[arg(long, env = "MODEL_PATH", default_value = config::MODEL_PATH)]
    pub model_path: PathBuf,

    /// Where split, confusion matrix and loss curves are written
    #[arg(long, env = "REPORTS_DIR", default_value = config::REPORTS_DIR)]
    pub reports_dir: PathBuf,

    #[command(flatten)]
    pub tracking: TrackingArgs,

    /// Seeds the split, model init, shuffling and augmentation
    #[arg(long, env = "SEED", default_value_t = config::SEED)]
    pub seed: u64,

    /// Cap on images used; 0 uses the whole corpus
    #[arg(long, env = "MAX_SAMPLES", default_value_t = config::MAX_SAMPLES)]
    pub max_samples: usize,

    #[arg(long, env = "EPOCHS", default_value_t = config::EPOCHS)]
    pub epochs: usize,

    #[arg(long, env = "BATCH_SIZE", default_value_t = config::BATCH_SIZE)]
    pub batch_size: usize,

    #[arg(long, env = "LEARNING_RATE", default_value_t = config::LEARNING_RATE)]
    pub learning_rate: f64,

    /// Side length images are resized to (multiple of 8)
    #[arg(long, env = "IMAGE_SIZE", default_value_t = config::IMAGE_SIZE)]
    pub image_size: u32,

    /// Threads used to decode the corpus
    #[arg(long, env = "NUM_WORKERS", default_value_t = config::NUM_WORKERS)]
    pub num_workers: usize,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:        a.data_dir,
            model_path:      a.model_path,
            reports_dir:     a.reports_dir,
            tracking_uri:    a.tracking.tracking_uri,
            experiment_name: a.tracking.experiment_name,
            seed:            a.seed,
            max_samples:     (a.max_samples > 0).then_some(a.max_samples),
            epochs:          a.epochs,
            batch_size:      a.batch_size,
            learning_rate:   a.learning_rate,
            image_size:      a.image_size,
            num_workers:     a.num_workers,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "MODEL_PATH", default_value = config::MODEL_PATH)]
    pub model_path: PathBuf,

    /// Must match the size the checkpoint was trained with
    #[arg(long, env = "IMAGE_SIZE", default_value_t = config::IMAGE_SIZE)]
    pub image_size: u32,

    #[arg(long, env = "BIND_ADDR", default_value = config::BIND_ADDR)]
    pub bind_addr: String,
}

impl From<ServeArgs> for ServeConfig {
    fn from(a: ServeArgs) -> Self {
        ServeConfig {
            model_path: a.model_path,
            image_size: a.image_size,
            bind_addr:  a.bind_addr,
        }
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Full URL of the predict endpoint
    #[arg(long, env = "API_URL", default_value = config::API_URL)]
    pub api_url: String,

    /// Labelled images to evaluate; smoke test when empty or missing
    #[arg(long, env = "TEST_DIR", default_value = config::TEST_DIR)]
    pub test_dir: PathBuf,

    /// Seconds between cycles; 0 runs a single cycle
    #[arg(long, env = "SLEEP_SECONDS", default_value_t = 0)]
    pub sleep_seconds: u64,

    /// Stop after this many cycles in periodic mode
    #[arg(long)]
    pub max_cycles: Option<usize>,

    #[command(flatten)]
    pub tracking: TrackingArgs,
}

impl From<MonitorArgs> for MonitorConfig {
    fn from(a: MonitorArgs) -> Self {
        MonitorConfig {
            api_url:         a.api_url,
            test_dir:        a.test_dir,
            sleep_seconds:   a.sleep_seconds,
            tracking_uri:    a.tracking.tracking_uri,
            experiment_name: a.tracking.experiment_name,
            max_cycles:      a.max_cycles,
        }
    }
}
