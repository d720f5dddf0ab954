// ============================================================
// Layer 5 — No-Gradient Evaluation
// ============================================================
// Runs a model over a DataLoader without updating it and
// reports:
//   - loss:     SUM of per-batch mean cross-entropy values
//               (the same convention as the training loss)
//   - accuracy: exact matches / samples seen
//   - a 2×2 confusion matrix indexed [true][predicted]
//
// Used for the per-epoch validation pass and for the final
// test pass.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use burn::{data::dataloader::DataLoader, prelude::*};
use serde::{Deserialize, Serialize};

use crate::data::batcher::ImageBatch;
use crate::domain::label::ClassLabel;
use crate::ml::model::SimpleCnn;

// ─── ConfusionMatrix ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Class names in index order, for readers of the JSON artifact.
    pub labels: Vec<String>,
    /// counts[true][predicted]
    pub counts: [[u64; ClassLabel::COUNT]; ClassLabel::COUNT],
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self {
            labels: ClassLabel::ALL.iter().map(|l| l.as_str().to_string()).collect(),
            counts: [[0; ClassLabel::COUNT]; ClassLabel::COUNT],
        }
    }

    pub fn record(&mut self, truth: usize, predicted: usize) {
        if truth < ClassLabel::COUNT && predicted < ClassLabel::COUNT {
            self.counts[truth][predicted] += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> u64 {
        (0..ClassLabel::COUNT).map(|i| self.counts[i][i]).sum()
    }

    /// correct / total, 0 when nothing was recorded.
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }
}

// ─── EvalReport ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub loss:      f64,
    pub accuracy:  f64,
    pub samples:   u64,
    pub confusion: ConfusionMatrix,
}

/// Evaluate `model` over every batch of `loader`.
///
/// Call this with an inner-backend model (`model.valid()`) so no
/// autodiff graph is built.
pub fn evaluate<B: Backend>(
    model:  &SimpleCnn<B>,
    loader: &Arc<dyn DataLoader<ImageBatch<B>>>,
) -> Result<EvalReport> {
    let mut loss_sum  = 0.0f64;
    let mut confusion = ConfusionMatrix::new();

    for batch in loader.iter() {
        let (loss, logits) = model.forward_loss(batch.images, batch.targets.clone());
        loss_sum += loss.into_scalar().elem::<f64>();

        // argmax(1) returns [batch, 1]; flatten to [batch]
        let predicted = to_indices(logits.argmax(1).flatten::<1>(0, 1))?;
        let truth     = to_indices(batch.targets)?;

        for (t, p) in truth.into_iter().zip(predicted) {
            confusion.record(t, p);
        }
    }

    Ok(EvalReport {
        loss:      loss_sum,
        accuracy:  confusion.accuracy(),
        samples:   confusion.total(),
        confusion,
    })
}

fn to_indices<B: Backend>(tensor: Tensor<B, 1, Int>) -> Result<Vec<usize>> {
    let values: Vec<i64> = tensor
        .into_data()
        .convert::<i64>()
        .to_vec()
        .map_err(|e| anyhow!("cannot read class indices: {e:?}"))?;
    Ok(values.into_iter().map(|v| v.max(0) as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_accuracy() {
        let mut cm = ConfusionMatrix::new();
        cm.record(0, 0);
        cm.record(0, 0);
        cm.record(1, 0);
        cm.record(1, 1);
        assert_eq!(cm.total(), 4);
        assert_eq!(cm.counts, [[2, 0], [1, 1]]);
        assert!((cm.accuracy() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_empty_confusion_is_zero_accuracy() {
        assert_eq!(ConfusionMatrix::new().accuracy(), 0.0);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut cm = ConfusionMatrix::new();
        cm.record(5, 0);
        assert_eq!(cm.total(), 0);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(ConfusionMatrix::new()).unwrap();
        assert_eq!(json["labels"][0], "Cat");
        assert_eq!(json["counts"][1][1], 0);
    }
}
