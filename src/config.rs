// ============================================================
// Defaults shared by the CLI and the use cases
// ============================================================
// Every value here can be overridden by a CLI flag or its
// environment variable (see cli/commands.rs).

pub const DATA_DIR: &str = "data/raw/cats_dogs";
pub const MODEL_PATH: &str = "models/model.bin";
pub const REPORTS_DIR: &str = "reports";

pub const TRACKING_URI: &str = "mlruns";
pub const EXPERIMENT_NAME: &str = "cats_vs_dogs";

pub const IMAGE_SIZE: u32 = 224;
pub const BATCH_SIZE: usize = 16;
pub const EPOCHS: usize = 2;
pub const LEARNING_RATE: f64 = 1e-3;
pub const SEED: u64 = 42;
pub const MAX_SAMPLES: usize = 2000;
pub const NUM_WORKERS: usize = 2;

pub const BIND_ADDR: &str = "0.0.0.0:8000";
pub const API_URL: &str = "http://localhost:8000/predict";
pub const TEST_DIR: &str = "data/test_monitor";

/// Blocking HTTP calls made by the monitor give up after this many seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;
