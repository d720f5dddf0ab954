// ============================================================
// Layer 6 — Loss Curve Logger
// ============================================================
// Records per-epoch training metrics to a CSV file. The file
// is the loss-curve summary attached to the training run as an
// artifact; plotting it is left to whoever downloads it.
//
// Metrics recorded per epoch:
//   - epoch:        1-based epoch number
//   - train_loss:   SUM of batch losses over the training set
//   - val_loss:     SUM of batch losses over the validation set
//   - val_accuracy: exact matches / validation samples
//
// Example CSV output:
//   epoch,train_loss,val_loss,val_accuracy
//   1,68.912345,8.123456,0.565000
//   2,61.004321,7.654321,0.610000
//
// Losses are sums, not means: a bigger training split gives a
// bigger number. Compare runs with equal split sizes only.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

pub const LOSS_CURVE_FILE: &str = "loss_curves.csv";

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:        usize,
    pub train_loss:   f64,
    pub val_loss:     f64,
    pub val_accuracy: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, val_accuracy: f64) -> Self {
        Self { epoch, train_loss, val_loss, val_accuracy }
    }
}

/// Writes epoch metrics to `<dir>/loss_curves.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the directory and start a fresh CSV with its header row.
    ///
    /// Any file left by a previous run is replaced.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create reports directory '{}'", dir.display()))?;

        let csv_path = dir.join(LOSS_CURVE_FILE);
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "epoch,train_loss,val_loss,val_accuracy")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.val_loss,
            m.val_accuracy,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_header_and_rows() {
        let dir    = TempDir::new().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 10.5, 2.25, 0.5)).unwrap();
        logger.log(&EpochMetrics::new(2, 9.0, 2.0, 0.625)).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,val_loss,val_accuracy");
        assert_eq!(lines[1], "1,10.500000,2.250000,0.500000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_new_run_truncates_previous_file() {
        let dir = TempDir::new().unwrap();
        MetricsLogger::new(dir.path()).unwrap()
            .log(&EpochMetrics::new(1, 1.0, 1.0, 1.0)).unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        let text   = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
