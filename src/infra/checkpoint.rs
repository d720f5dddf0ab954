// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the classifier weights with Burn's
// BinBytesRecorder (full precision).
//
// What gets written per checkpoint:
//   1. <path>              — model record, bincode bytes
//   2. <path>.config.json  — SimpleCnnConfig the weights belong to
//
// Both files are written to a temporary sibling, synced and
// renamed into place, so a reader never sees a half-written
// checkpoint. The config is published before the weights: a
// weights file on disk always has its config next to it.
//
// Loading rebuilds the architecture from the caller's expected
// config, then checks:
//   - the stored config matches the expected one
//   - the restored parameter count matches a fresh model
// Burn's load_record does not check tensor shapes itself.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use burn::{
    module::Module,
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
};

use crate::error::{Error, Result};
use crate::ml::model::{SimpleCnn, SimpleCnnConfig};

type WeightsRecorder = BinBytesRecorder<FullPrecisionSettings>;

const CONFIG_SUFFIX: &str = ".config.json";
const TMP_SUFFIX: &str = ".tmp";

/// Manages the single published checkpoint at `path`.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    path: PathBuf,
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar holding the architecture config, `<path>.config.json`.
    pub fn config_path(&self) -> PathBuf {
        with_suffix(&self.path, CONFIG_SUFFIX)
    }

    /// Persist `model` and its config, replacing any previous checkpoint.
    pub fn save<B: Backend>(&self, model: &SimpleCnn<B>, config: &SimpleCnnConfig) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::checkpoint_write(&self.path, e.to_string()))?;
        }

        let bytes = WeightsRecorder::default()
            .record(model.clone().into_record(), ())
            .map_err(|e| Error::checkpoint_write(&self.path, format!("{e:?}")))?;
        let config_json = serde_json::to_vec_pretty(config)
            .map_err(|e| Error::checkpoint_write(&self.path, e.to_string()))?;

        let config_path = self.config_path();
        write_atomically(&config_path, &config_json)
            .map_err(|e| Error::checkpoint_write(&config_path, e.to_string()))?;
        write_atomically(&self.path, &bytes)
            .map_err(|e| Error::checkpoint_write(&self.path, e.to_string()))?;

        tracing::info!(
            "Saved checkpoint '{}' ({} bytes, image_size={})",
            self.path.display(),
            bytes.len(),
            config.image_size
        );
        Ok(())
    }

    /// Read the stored architecture config.
    pub fn load_config(&self) -> Result<SimpleCnnConfig> {
        let config_path = self.config_path();
        let json = fs::read(&config_path)
            .map_err(|e| Error::model_load(&config_path, e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| Error::model_load(&config_path, e.to_string()))
    }

    /// Rebuild a model for `expected` and restore the stored weights into it.
    pub fn load<B: Backend>(
        &self,
        expected: &SimpleCnnConfig,
        device:   &B::Device,
    ) -> Result<SimpleCnn<B>> {
        let stored = self.load_config()?;
        if !stored.is_compatible_with(expected) {
            return Err(Error::model_load(
                &self.path,
                format!(
                    "checkpoint was trained for image_size={} num_classes={}, expected image_size={} num_classes={}",
                    stored.image_size, stored.num_classes, expected.image_size, expected.num_classes
                ),
            ));
        }

        let bytes = fs::read(&self.path).map_err(|e| Error::model_load(&self.path, e.to_string()))?;
        let record = WeightsRecorder::default()
            .load(bytes, device)
            .map_err(|e| Error::model_load(&self.path, format!("{e:?}")))?;

        let fresh: SimpleCnn<B> = expected.init(device);
        let expected_params = fresh.num_params();
        let model = fresh.load_record(record);
        if model.num_params() != expected_params {
            return Err(Error::model_load(
                &self.path,
                format!(
                    "parameter count mismatch: checkpoint has {}, architecture has {}",
                    model.num_params(),
                    expected_params
                ),
            ));
        }

        tracing::info!("Loaded checkpoint '{}'", self.path.display());
        Ok(model)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = with_suffix(path, TMP_SUFFIX);
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn small() -> SimpleCnnConfig {
        SimpleCnnConfig::new().with_image_size(16)
    }

    #[test]
    fn test_save_then_load_gives_same_logits() {
        let dir    = TempDir::new().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path().join("models/model.bin"));

        let _rng = crate::ml::trainer::lock_backend_rng();
        let model: SimpleCnn<TestBackend> = small().init(&device);
        ckpt.save(&model, &small()).unwrap();
        assert!(ckpt.path().is_file());
        assert!(ckpt.config_path().is_file());

        let loaded: SimpleCnn<TestBackend> = ckpt.load(&small(), &device).unwrap();
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 16, 16], &device);
        let a: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(input).into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_missing_file_is_model_load_error() {
        let dir  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("nope.bin"));
        let err  = ckpt.load::<TestBackend>(&small(), &Default::default()).unwrap_err();
        assert!(matches!(err, Error::ModelLoad { .. }));
    }

    #[test]
    fn test_incompatible_config_is_rejected() {
        let dir    = TempDir::new().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path().join("model.bin"));
        let _rng = crate::ml::trainer::lock_backend_rng();
        let model: SimpleCnn<TestBackend> = small().init(&device);
        ckpt.save(&model, &small()).unwrap();

        let other = SimpleCnnConfig::new().with_image_size(32);
        let err   = ckpt.load::<TestBackend>(&other, &device).unwrap_err();
        assert!(matches!(err, Error::ModelLoad { .. }));
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let dir    = TempDir::new().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path().join("model.bin"));
        let _rng = crate::ml::trainer::lock_backend_rng();
        let model: SimpleCnn<TestBackend> = small().init(&device);
        ckpt.save(&model, &small()).unwrap();
        ckpt.save(&model, &small()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path()).unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{names:?}");
        assert_eq!(names.len(), 2);
    }
}
