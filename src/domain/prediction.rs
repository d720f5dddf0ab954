// ============================================================
// Layer 3 — Prediction Domain Type
// ============================================================
// The result of classifying one image:
//   - label:         the argmax class
//   - confidence:    the probability mass of that class
//   - probabilities: one entry per class, summing to 1
//
// A Prediction can only be built from a probability vector
// that passes validation, so every value that reaches the
// HTTP layer already satisfies the response contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::label::ClassLabel;
use crate::error::{Error, Result};

/// Allowed drift of the probability sum away from 1.0.
pub const PROBABILITY_TOLERANCE: f32 = 1e-4;

/// A validated classification of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    label:         ClassLabel,
    confidence:    f32,
    probabilities: [f32; ClassLabel::COUNT],
}

impl Prediction {
    /// Build a prediction from softmax output in logit order.
    ///
    /// Fails if any probability is outside [0, 1], not finite,
    /// or if they do not sum to 1 within [`PROBABILITY_TOLERANCE`].
    pub fn from_probabilities(probabilities: &[f32]) -> Result<Self> {
        let probabilities: [f32; ClassLabel::COUNT] = probabilities
            .try_into()
            .map_err(|_| {
                Error::invalid_config(format!(
                    "expected {} class probabilities, got {}",
                    ClassLabel::COUNT,
                    probabilities.len()
                ))
            })?;

        if probabilities
            .iter()
            .any(|p| !p.is_finite() || !(0.0..=1.0).contains(p))
        {
            return Err(Error::invalid_config(format!(
                "probabilities out of range: {probabilities:?}"
            )));
        }

        let sum: f32 = probabilities.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(Error::invalid_config(format!(
                "probabilities sum to {sum}, expected 1"
            )));
        }

        // Ties resolve to the lower index.
        let (best, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |acc, (i, p)| {
                if p > acc.1 { (i, p) } else { acc }
            });

        let label = ClassLabel::from_index(best)
            .ok_or_else(|| Error::invalid_config(format!("no class at index {best}")))?;

        Ok(Self { label, confidence, probabilities })
    }

    pub fn label(&self) -> ClassLabel {
        self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Probability assigned to a specific class.
    pub fn probability(&self, label: ClassLabel) -> f32 {
        self.probabilities[label.index()]
    }

    /// Probabilities keyed by canonical class name.
    pub fn probability_map(&self) -> BTreeMap<String, f32> {
        ClassLabel::ALL
            .into_iter()
            .map(|label| (label.as_str().to_string(), self.probability(label)))
            .collect()
    }
}

// ─── Wire Format ─────────────────────────────────────────────────────────────
/// JSON body returned by `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub label:         String,
    pub confidence:    f32,
    pub probabilities: BTreeMap<String, f32>,
}

impl From<&Prediction> for PredictionResponse {
    fn from(p: &Prediction) -> Self {
        Self {
            label:         p.label().as_str().to_string(),
            confidence:    p.confidence(),
            probabilities: p.probability_map(),
        }
    }
}

/// What a client needs from a `/predict` reply: at least a label.
///
/// Extra fields from the service are ignored so the monitor keeps
/// working against any server that honours the minimal contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePrediction {
    pub label: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}
