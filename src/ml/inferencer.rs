// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads the published checkpoint once and scores single images
// for the HTTP service.
//
//   ImageTensor [3,S,S] → batch of one [1,3,S,S]
//                       → logits [1,2]
//                       → softmax over dim 1
//                       → Prediction (validated)
//
// burn modules are Send but not Sync. The model sits behind a
// Mutex that is held only to clone it; parameters are
// reference-counted, so the clone is cheap and the forward pass
// runs outside the lock. Concurrent requests never serialise on
// inference.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::activation::softmax};

use crate::data::batcher::stack_images;
use crate::domain::image_tensor::ImageTensor;
use crate::domain::prediction::Prediction;
use crate::domain::traits::ImageClassifier;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::backend::{Device, InferBackend};
use crate::ml::model::{SimpleCnn, SimpleCnnConfig};

pub struct Inferencer {
    model:  Mutex<SimpleCnn<InferBackend>>,
    config: SimpleCnnConfig,
    device: Device,
}

impl Inferencer {
    /// Restore the checkpoint managed by `ckpt`, which must have been
    /// trained for `config`.
    pub fn from_checkpoint(
        ckpt:   &CheckpointManager,
        config: &SimpleCnnConfig,
        device: Device,
    ) -> crate::error::Result<Self> {
        config.validate()?;
        let model = ckpt.load::<InferBackend>(config, &device)?;
        tracing::info!(
            "Model loaded from '{}' (image_size={})",
            ckpt.path().display(),
            config.image_size
        );
        Ok(Self::from_model(model, config.clone(), device))
    }

    /// Wrap an in-memory model, e.g. straight out of training.
    pub fn from_model(model: SimpleCnn<InferBackend>, config: SimpleCnnConfig, device: Device) -> Self {
        Self { model: Mutex::new(model), config, device }
    }

    /// A handle on the weights for one forward pass.
    fn snapshot(&self) -> Result<SimpleCnn<InferBackend>> {
        self.model
            .lock()
            .map(|model| model.clone())
            .map_err(|_| anyhow!("model lock poisoned"))
    }
}

impl ImageClassifier for Inferencer {
    fn image_size(&self) -> u32 {
        self.config.image_size as u32
    }

    fn classify(&self, image: &ImageTensor) -> Result<Prediction> {
        if image.size() != self.config.image_size {
            return Err(anyhow!(
                "input is {}×{}, model expects {}×{}",
                image.size(), image.size(),
                self.config.image_size, self.config.image_size
            ));
        }

        let model  = self.snapshot()?;
        let input  = stack_images::<InferBackend>(&[image], &self.device);
        let logits = model.forward(input);
        let probs: Vec<f32> = softmax(logits, 1)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| anyhow!("cannot read probabilities: {e:?}"))?;

        let prediction = Prediction::from_probabilities(&probs)?;
        tracing::debug!(
            "Classified as {} (confidence={:.4})",
            prediction.label(),
            prediction.confidence()
        );
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::label::ClassLabel;
    use crate::ml::trainer::lock_backend_rng;

    fn small_inferencer() -> Inferencer {
        let device = Device::default();
        let config = SimpleCnnConfig::new().with_image_size(16);
        Inferencer::from_model(config.init(&device), config, device)
    }

    #[test]
    fn test_probabilities_form_a_distribution() {
        let _rng = lock_backend_rng();
        let inf   = small_inferencer();
        let image = ImageTensor::from_chw(vec![0.5; 3 * 16 * 16], 16).unwrap();
        let pred  = inf.classify(&image).unwrap();

        let sum: f32 = ClassLabel::ALL.iter().map(|&l| pred.probability(l)).sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert_eq!(pred.confidence(), pred.probability(pred.label()));
    }

    #[test]
    fn test_wrong_size_is_rejected() {
        let _rng = lock_backend_rng();
        let inf   = small_inferencer();
        let image = ImageTensor::from_chw(vec![0.0; 3 * 8 * 8], 8).unwrap();
        assert!(inf.classify(&image).is_err());
    }

    #[test]
    fn test_concurrent_classification_agrees() {
        let _rng = lock_backend_rng();
        let inf   = std::sync::Arc::new(small_inferencer());
        let image = ImageTensor::from_chw(vec![0.25; 3 * 16 * 16], 16).unwrap();
        let expected = inf.classify(&image).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let inf   = inf.clone();
                let image = image.clone();
                std::thread::spawn(move || inf.classify(&image).unwrap())
            })
            .collect();

        for handle in handles {
            let pred = handle.join().unwrap();
            assert_eq!(pred.label(), expected.label());
            assert!((pred.confidence() - expected.confidence()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_image_size_reports_config() {
        assert_eq!(small_inferencer().image_size(), 16);
    }
}
