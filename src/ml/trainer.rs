// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validate + test using Burn's DataLoader and Adam.
//
// Phases (each transition is logged):
//   Initializing     → seed, build model, optimiser, loaders
//   Training(epoch)  → one pass over train, one no-grad pass over val
//   FinalEvaluation  → one no-grad pass over test
//   Persisting       → handled by the use case (checkpoint + artifacts)
//   Completed
//
// Nothing is retried. Any error ends the run; the caller marks
// the tracker run FAILED and never publishes a checkpoint.
//
// Burn notes:
//   - Training uses TrainBackend (Autodiff<..>) for gradients
//   - model.valid() returns the model on InferBackend, so the
//     validation and test loaders use that backend directly
//   - argmax(1) returns [batch, 1]; flatten before comparing
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::fmt;

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::ImageBatcher, dataset::ImageDataset};
use crate::domain::traits::TrackerRun;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::backend::{default_device, InferBackend, TrainBackend};
use crate::ml::evaluation::{evaluate, EvalReport};
use crate::ml::model::{SimpleCnn, SimpleCnnConfig};

/// One prefetch worker keeps batch order, and so the update order, reproducible.
const LOADER_WORKERS: usize = 1;

// ─── Phases ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    Initializing,
    Training { epoch: usize },
    FinalEvaluation,
    Persisting,
    Completed,
}

impl TrainingPhase {
    pub fn enter(self) {
        tracing::info!(phase = %self, "Entering training phase");
    }
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing      => f.write_str("initializing"),
            Self::Training { epoch } => write!(f, "training(epoch={epoch})"),
            Self::FinalEvaluation   => f.write_str("final-evaluation"),
            Self::Persisting        => f.write_str("persisting"),
            Self::Completed         => f.write_str("completed"),
        }
    }
}

// ─── Inputs / Outputs ─────────────────────────────────────────────────────────
pub struct TrainingData {
    pub train: ImageDataset,
    pub val:   ImageDataset,
    pub test:  ImageDataset,
}

pub struct TrainedModel {
    pub model:        SimpleCnn<InferBackend>,
    pub model_config: SimpleCnnConfig,
    pub history:      Vec<EpochMetrics>,
    pub test:         EvalReport,
}

// ─── Loop ─────────────────────────────────────────────────────────────────────
pub fn run_training(
    cfg:     &TrainConfig,
    data:    TrainingData,
    run:     &mut dyn TrackerRun,
    metrics: &MetricsLogger,
) -> Result<TrainedModel> {
    TrainingPhase::Initializing.enter();

    let device = default_device();
    TrainBackend::seed(cfg.seed);

    let model_cfg = cfg.model_config();
    model_cfg.validate()?;
    let mut model: SimpleCnn<TrainBackend> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: image_size={}, {} parameters",
        model_cfg.image_size,
        model.num_params()
    );

    let mut optim = AdamConfig::new().init();

    // ── Training data loader (autodiff backend, reshuffled every epoch) ──────
    let epoch_counter = data.train.epoch_counter();
    let train_loader  = DataLoaderBuilder::new(ImageBatcher::<TrainBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(LOADER_WORKERS)
        .build(data.train);

    // ── Evaluation loaders (inner backend, fixed order) ──────────────────────
    let val_loader = DataLoaderBuilder::new(ImageBatcher::<InferBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(LOADER_WORKERS)
        .build(data.val);
    let test_loader = DataLoaderBuilder::new(ImageBatcher::<InferBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(LOADER_WORKERS)
        .build(data.test);

    let mut history = Vec::with_capacity(cfg.epochs);

    for epoch in 1..=cfg.epochs {
        TrainingPhase::Training { epoch }.enter();
        epoch_counter.set(epoch as u64);

        // ── Training phase ────────────────────────────────────────────────────
        let mut running_loss = 0.0f64;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(batch.images, batch.targets);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            if !loss_val.is_finite() {
                bail!("training diverged in epoch {epoch}: batch loss is {loss_val}");
            }
            running_loss += loss_val;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let val = evaluate(&model.valid(), &val_loader)?;

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_acc={:.4}",
            epoch, cfg.epochs, running_loss, val.loss, val.accuracy,
        );

        let step = Some(epoch as u64);
        run.log_metric("train_loss", running_loss, step)?;
        run.log_metric("val_loss", val.loss, step)?;
        run.log_metric("val_accuracy", val.accuracy, step)?;

        let row = EpochMetrics::new(epoch, running_loss, val.loss, val.accuracy);
        metrics.log(&row)?;
        history.push(row);
    }

    // ── Final evaluation on held-out test split ──────────────────────────────
    TrainingPhase::FinalEvaluation.enter();
    let model = model.valid();
    let test  = evaluate(&model, &test_loader)?;

    run.log_metric("test_loss", test.loss, None)?;
    run.log_metric("test_accuracy", test.accuracy, None)?;
    tracing::info!(
        "Test: loss={:.4} accuracy={:.4} over {} samples",
        test.loss,
        test.accuracy,
        test.samples
    );

    Ok(TrainedModel { model, model_config: model_cfg, history, test })
}

/// The ndarray backend draws from one process-wide RNG; tests that
/// seed it or draw from it hold this guard.
#[cfg(test)]
pub(crate) fn lock_backend_rng() -> std::sync::MutexGuard<'static, ()> {
    static BACKEND_RNG: std::sync::Mutex<()> = std::sync::Mutex::new(());
    BACKEND_RNG.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(TrainingPhase::Training { epoch: 3 }.to_string(), "training(epoch=3)");
        assert_eq!(TrainingPhase::FinalEvaluation.to_string(), "final-evaluation");
    }
}
