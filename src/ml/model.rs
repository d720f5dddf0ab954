use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::domain::image_tensor::CHANNELS;
use crate::domain::label::ClassLabel;
use crate::error::Error;

/// Channels produced by each of the three conv stages.
const STAGE_CHANNELS: [usize; 3] = [32, 64, 128];
const HIDDEN: usize = 256;

/// Each stage halves the spatial size, three stages in total.
const DOWNSAMPLE: usize = 8;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SimpleCnnConfig {
    #[config(default = 2)]
    pub num_classes: usize,
    #[config(default = 224)]
    pub image_size:  usize,
}

impl SimpleCnnConfig {
    /// The input side must survive three 2× poolings without remainder.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.image_size < DOWNSAMPLE || self.image_size % DOWNSAMPLE != 0 {
            return Err(Error::invalid_config(format!(
                "image size must be a positive multiple of {DOWNSAMPLE}, got {}",
                self.image_size
            )));
        }
        if self.num_classes != ClassLabel::COUNT {
            return Err(Error::invalid_config(format!(
                "model must have {} outputs, got {}",
                ClassLabel::COUNT,
                self.num_classes
            )));
        }
        Ok(())
    }

    /// Width of the flattened feature map fed to the classifier head.
    pub fn flattened_features(&self) -> usize {
        let side = self.image_size / DOWNSAMPLE;
        STAGE_CHANNELS[2] * side * side
    }

    /// True if a checkpoint written with `other` fits a model built from `self`.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.num_classes == other.num_classes && self.image_size == other.image_size
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SimpleCnn<B> {
        let conv = |input: usize, output: usize| {
            Conv2dConfig::new([input, output], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };
        SimpleCnn {
            conv1: conv(CHANNELS, STAGE_CHANNELS[0]),
            conv2: conv(STAGE_CHANNELS[0], STAGE_CHANNELS[1]),
            conv3: conv(STAGE_CHANNELS[1], STAGE_CHANNELS[2]),
            pool:  MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1:   LinearConfig::new(self.flattened_features(), HIDDEN).init(device),
            fc2:   LinearConfig::new(HIDDEN, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// Three conv → ReLU → max-pool stages followed by a two-layer head.
///
/// ```text
/// [N, 3, S, S]
///   conv 3→32  relu pool   [N, 32,  S/2, S/2]
///   conv 32→64 relu pool   [N, 64,  S/4, S/4]
///   conv 64→128 relu pool  [N, 128, S/8, S/8]
///   flatten → linear 256 → relu → linear num_classes
/// ```
#[derive(Module, Debug)]
pub struct SimpleCnn<B: Backend> {
    pub conv1:      Conv2d<B>,
    pub conv2:      Conv2d<B>,
    pub conv3:      Conv2d<B>,
    pub pool:       MaxPool2d,
    pub fc1:        Linear<B>,
    pub fc2:        Linear<B>,
    pub activation: Relu,
}

impl<B: Backend> SimpleCnn<B> {
    /// images: [batch, 3, S, S] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(self.activation.forward(self.conv1.forward(images)));
        let x = self.pool.forward(self.activation.forward(self.conv2.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv3.forward(x)));

        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.activation.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    /// Mean cross-entropy over the batch, plus the logits for accuracy.
    pub fn forward_loss(
        &self,
        images:  Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(images);
        let loss   = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets);
        (loss, logits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_default_config_geometry() {
        let cfg = SimpleCnnConfig::new();
        assert_eq!(cfg.image_size, 224);
        assert_eq!(cfg.flattened_features(), 128 * 28 * 28);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        assert!(SimpleCnnConfig::new().with_image_size(100).validate().is_err());
        assert!(SimpleCnnConfig::new().with_image_size(0).validate().is_err());
        assert!(SimpleCnnConfig::new().with_num_classes(3).validate().is_err());
    }

    #[test]
    fn test_output_is_one_logit_per_class_at_224() {
        let device = Default::default();
        let _rng = crate::ml::trainer::lock_backend_rng();
        let model: SimpleCnn<TestBackend> = SimpleCnnConfig::new().init(&device);
        let input  = Tensor::<TestBackend, 4>::random([1, 3, 224, 224], burn::tensor::Distribution::Default, &device);
        assert_eq!(model.forward(input).dims(), [1, 2]);
    }

    #[test]
    fn test_small_model_batch_and_loss() {
        let device = Default::default();
        let _rng = crate::ml::trainer::lock_backend_rng();
        let model: SimpleCnn<TestBackend> = SimpleCnnConfig::new().with_image_size(16).init(&device);
        let images  = Tensor::<TestBackend, 4>::zeros([4, 3, 16, 16], &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([0, 1, 0, 1], &device);
        let (loss, logits) = model.forward_loss(images, targets);
        assert_eq!(logits.dims(), [4, 2]);
        let loss: f64 = loss.into_scalar().elem::<f64>();
        assert!(loss.is_finite() && loss > 0.0);
    }
}
