// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to stack ImageSamples into
// device tensors.
//
// How batching works here:
//   Input:  Vec of N ImageSamples, each 3×S×S
//   Output: ImageBatch with
//             images  [N, 3, S, S]  (f32 in [0, 1])
//             targets [N]           (class index)
//
// Every sample is already CHW and the same size, so the pixel
// buffers are concatenated and reshaped in one go.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ImageSample;
use crate::domain::image_tensor::{ImageTensor, CHANNELS};

// ─── ImageBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Shape: [batch_size, 3, S, S]
    pub images: Tensor<B, 4>,

    /// Shape: [batch_size], ClassLabel::index() per sample
    pub targets: Tensor<B, 1, Int>,
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ImageSample, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageSample>) -> ImageBatch<B> {
        let targets: Vec<i32> = items
            .iter()
            .map(|s| s.label.index() as i32)
            .collect();

        let pixels: Vec<&ImageTensor> = items.iter().map(|s| &s.pixels).collect();
        let images = stack_images::<B>(&pixels, &self.device);

        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        ImageBatch { images, targets }
    }
}

/// Stack same-sized image tensors into one `[N, 3, S, S]` tensor.
///
/// Shared by the batcher and the inferencer so training and serving
/// lay pixels out the same way.
pub fn stack_images<B: Backend>(images: &[&ImageTensor], device: &B::Device) -> Tensor<B, 4> {
    let n    = images.len();
    let size = images.first().map_or(0, |t| t.size());

    let flat: Vec<f32> = images
        .iter()
        .flat_map(|t| t.as_slice().iter().copied())
        .collect();

    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([n, CHANNELS, size, size])
}
